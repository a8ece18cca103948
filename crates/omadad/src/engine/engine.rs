use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::dispatcher::Signal;
use super::dispatcher::SignalReceiver;
use super::dispatcher::SignalSender;
use super::dispatcher::Subscriber;
use super::entity::Platform;
use super::host::Host;
use super::integration::Integration;
use super::integration::IntegrationContext;
use super::integration::REGISTRY;
use super::platform::PlatformAdapter;
use super::registry::EntityRegistry;
use super::state::State;
use crate::config::Config;

type AdapterMap = BTreeMap<(String, Platform), Box<dyn PlatformAdapter>>;

/// omadad engine
///
/// This structure receives signals from integrations, routes them to the
/// platform adapters and entities subscribed to them, polls the entities that
/// ask for it, and publishes a snapshot of every rendered state.
pub struct Engine {
    host: Host,

    /// Platform adapters keyed by (config entry id, platform)
    adapters: AdapterMap,

    integrations: Vec<Box<dyn Integration>>,

    /// Sender handed to integrations so their controllers can emit signals
    signal_tx: SignalSender,

    signal_rx: SignalReceiver,

    /// Latest state snapshot (readers clone the Arc)
    state_tx: watch::Sender<Arc<State>>,
}

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        Self::with_registry(EntityRegistry::new())
    }

    /// Create an engine whose entity registry holds entries from a prior run.
    pub fn with_registry(registry: EntityRegistry) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(Arc::new(State::default()));
        Self {
            host: Host::with_registry(registry),
            adapters: BTreeMap::new(),
            integrations: Vec::new(),
            signal_tx,
            signal_rx,
            state_tx,
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn signal_sender(&self) -> SignalSender {
        self.signal_tx.clone()
    }

    /// Watch the state snapshot published after every change.
    pub fn subscribe_state(&self) -> watch::Receiver<Arc<State>> {
        self.state_tx.subscribe()
    }

    /// Register integrations from configuration
    ///
    /// Every factory in the integration registry gets a look at the config;
    /// the ones that return an integration are set up right away.
    pub async fn register_integrations_from_config(&mut self, cfg: &Config) -> anyhow::Result<()> {
        let ctx = IntegrationContext { config: cfg };
        for constr in REGISTRY.iter() {
            let mut integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to create integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };

            if let Err(e) = integration.setup(self).await {
                warn!("Integration '{}' setup failed: {:#}", integration.name(), e);
                continue;
            }

            info!("Integration '{}' is set up", integration.name());
            self.integrations.push(integration);
        }

        self.publish_state();
        Ok(())
    }

    /// Set up the platform adapters of one config entry.
    pub fn setup_entry(&mut self, adapters: Vec<Box<dyn PlatformAdapter>>) {
        for mut adapter in adapters {
            let key = (adapter.entry().entry_id.clone(), adapter.platform());
            adapter.setup(&mut self.host);
            info!("[{}] Set up {} platform", key.0, key.1);
            self.adapters.insert(key, adapter);
        }
        self.publish_state();
    }

    /// Unload a config entry: drop its adapters, subscriptions and entities.
    pub fn unload_entry(&mut self, entry_id: &str) -> usize {
        self.adapters.retain(|(id, _), _| id != entry_id);
        let unloaded = self.host.unload_entry(entry_id);
        self.publish_state();
        unloaded
    }

    /// Route a signal to everything subscribed to it.
    pub fn dispatch(&mut self, signal: &Signal) {
        Self::dispatch_to(&mut self.host, &mut self.adapters, signal);
        self.publish_state();
    }

    /// Dispatch every signal already queued on the channel.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(signal) = self.signal_rx.try_recv() {
            self.dispatch(&signal);
            processed += 1;
        }
        processed
    }

    pub fn poll_entities(&mut self) {
        self.host.poll();
        self.publish_state();
    }

    /// Run the engine's main event loop until `shutdown` resolves.
    ///
    /// Signals and polls are handled one at a time on this task.
    pub async fn run(&mut self, poll_interval: Duration, shutdown: impl Future<Output = ()>) {
        info!("Engine starting");

        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Engine received shutdown signal");
                    break;
                }
                signal = self.signal_rx.recv() => match signal {
                    Some(signal) => Self::dispatch_to(&mut self.host, &mut self.adapters, &signal),
                    None => break,
                },
                _ = ticker.tick() => self.host.poll(),
            }
            self.publish_state();
        }

        info!("Engine shutting down");
    }

    /// Shut down every registered integration.
    pub async fn shutdown(&mut self) {
        let mut integrations = std::mem::take(&mut self.integrations);
        for integration in integrations.iter_mut() {
            if let Err(e) = integration.shutdown(self).await {
                warn!("Integration '{}' shutdown failed: {:#}", integration.name(), e);
            }
        }
        self.publish_state();
    }

    fn dispatch_to(host: &mut Host, adapters: &mut AdapterMap, signal: &Signal) {
        let subscribers = host.dispatcher.subscribers(signal);
        if subscribers.is_empty() {
            debug!("No subscribers for {}", signal);
            return;
        }

        debug!("Dispatching {} to {} subscribers", signal, subscribers.len());
        for subscriber in subscribers {
            match subscriber {
                Subscriber::Platform { entry_id, platform } => {
                    match adapters.get_mut(&(entry_id, platform)) {
                        Some(adapter) => adapter.items_added(host),
                        None => debug!("No {} adapter left for {}", platform, signal),
                    }
                }
                Subscriber::Entity { entity_id } => host.notify_entity(&entity_id, signal),
            }
        }
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(Arc::new(self.host.snapshot()));
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
