use async_trait::async_trait;
use linkme::distributed_slice;

use super::engine::Engine;
use crate::config::Config;

/// Result type for integration factory functions
pub type IntegrationFactoryResult = anyhow::Result<Option<Box<dyn Integration>>>;

pub struct IntegrationContext<'a> {
    pub config: &'a Config,
}

#[distributed_slice]
pub static REGISTRY: [fn(&IntegrationContext) -> IntegrationFactoryResult];

/// Integration trait that all integrations must implement
#[async_trait]
pub trait Integration: Send {
    /// Get the name/identifier of this integration
    fn name(&self) -> &str;

    /// Set up the integration - create its config entries, hand their
    /// platform adapters to the engine, start background refreshes.
    async fn setup(&mut self, engine: &mut Engine) -> anyhow::Result<()>;

    /// Shut down the integration gracefully, unloading its config entries
    async fn shutdown(&mut self, engine: &mut Engine) -> anyhow::Result<()>;
}
