use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::engine::State as EngineState;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    entities: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    version: &'static str,
    states: watch::Receiver<Arc<EngineState>>,
}

impl AppState {
    pub fn new(states: watch::Receiver<Arc<EngineState>>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            states,
        }
    }

    fn snapshot(&self) -> Arc<EngineState> {
        self.states.borrow().clone()
    }
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            entities: state.snapshot().entities.len(),
        }),
    )
}

/// Handler for GET /v1/entities
#[tracing::instrument(skip(state))]
async fn entities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/entities request");
    (StatusCode::OK, Json(state.snapshot().entities.clone()))
}

/// Handler for GET /v1/entities/:entity_id
#[tracing::instrument(skip(state))]
async fn entity(State(state): State<Arc<AppState>>, Path(entity_id): Path<String>) -> Response {
    match state.snapshot().entities.get(&entity_id) {
        Some(entity) => (StatusCode::OK, Json(entity.clone())).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("unknown entity {}", entity_id),
            }),
        )
            .into_response(),
    }
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/entities", get(entities))
        .route("/v1/entities/:entity_id", get(entity))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves the rendered entity states published on
/// `states` until `shutdown_rx` fires.
pub async fn serve(
    listen: String,
    port: u16,
    states: watch::Receiver<Arc<EngineState>>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(Arc::new(AppState::new(states)));

    let addr: SocketAddr = format!("{}:{}", listen, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", listen, port))?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::engine::EntityState;
    use crate::engine::Platform;

    fn state() -> Arc<AppState> {
        let entity = EntityState {
            entity_id: "sensor.omada_router1_upload".to_string(),
            name: "Omada Router1 Upload".to_string(),
            platform: Platform::Sensor,
            state: serde_json::json!(1024.0),
            unit_of_measurement: Some("B".to_string()),
            attributes: Default::default(),
        };
        let snapshot = EngineState {
            entities: BTreeMap::from([(entity.entity_id.clone(), entity)]),
        };
        let (_, rx) = watch::channel(Arc::new(snapshot));
        Arc::new(AppState::new(rx))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let response = ping().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_info_counts_entities() {
        let response = info(State(state())).await.into_response();
        let body = body_json(response).await;
        assert_eq!(body["entities"], 1);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_entities() {
        let response = entities(State(state())).await.into_response();
        let body = body_json(response).await;
        let upload = &body["sensor.omada_router1_upload"];
        assert_eq!(upload["platform"], "sensor");
        assert_eq!(upload["unit_of_measurement"], "B");
        assert_eq!(upload["state"], 1024.0);
    }

    #[tokio::test]
    async fn test_entity_not_found() {
        let response = entity(State(state()), Path("sensor.nope".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = entity(State(state()), Path("sensor.omada_router1_upload".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
