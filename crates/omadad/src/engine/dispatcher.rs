//! Typed publish/subscribe registry.
//!
//! Integrations emit [`Signal`]s over a channel; the engine looks up the
//! subscribers connected here and routes the signal to each of them. Every
//! signal is scoped to a config entry so that unloading the entry drops all
//! of its subscriptions at once.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;

use super::entity::Platform;

/// Notification emitted by an integration's controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Signal {
    /// Fresh data was fetched for the entry.
    DataUpdated(String),
    /// The entry's options (e.g. the SSID filter) changed.
    OptionsUpdated(String),
}

impl Signal {
    pub fn entry_id(&self) -> &str {
        match self {
            Signal::DataUpdated(entry_id) | Signal::OptionsUpdated(entry_id) => entry_id,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::DataUpdated(entry_id) => write!(f, "data_updated[{}]", entry_id),
            Signal::OptionsUpdated(entry_id) => write!(f, "options_updated[{}]", entry_id),
        }
    }
}

/// Channel types for signals FROM integrations TO the engine (unbounded - emitters must not block)
pub type SignalSender = mpsc::UnboundedSender<Signal>;
pub type SignalReceiver = mpsc::UnboundedReceiver<Signal>;

/// Target a signal is routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscriber {
    /// A platform adapter's reconciliation callback.
    Platform { entry_id: String, platform: Platform },
    /// A live entity, addressed by entity id.
    Entity { entity_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Debug, Default)]
pub struct Dispatcher {
    next_id: u64,
    subscriptions: HashMap<Signal, Vec<(SubscriptionId, Subscriber)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, signal: Signal, subscriber: Subscriber) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscriptions
            .entry(signal)
            .or_default()
            .push((id, subscriber));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn disconnect(&mut self, id: SubscriptionId) -> bool {
        let mut found = false;
        for subscribers in self.subscriptions.values_mut() {
            let before = subscribers.len();
            subscribers.retain(|(sid, _)| *sid != id);
            found |= subscribers.len() != before;
        }
        self.subscriptions.retain(|_, subscribers| !subscribers.is_empty());
        found
    }

    /// Drop every subscription scoped to `entry_id`. Returns how many were removed.
    pub fn disconnect_entry(&mut self, entry_id: &str) -> usize {
        let mut removed = 0;
        self.subscriptions.retain(|signal, subscribers| {
            if signal.entry_id() == entry_id {
                removed += subscribers.len();
                false
            } else {
                true
            }
        });
        removed
    }

    /// Subscribers of `signal` in connection order.
    pub fn subscribers(&self, signal: &Signal) -> Vec<Subscriber> {
        self.subscriptions
            .get(signal)
            .map(|subs| subs.iter().map(|(_, s)| s.clone()).collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, signal: &Signal) -> usize {
        self.subscriptions.get(signal).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str) -> Subscriber {
        Subscriber::Entity {
            entity_id: id.to_string(),
        }
    }

    #[test]
    fn test_subscribers_in_connection_order() {
        let mut dispatcher = Dispatcher::new();
        let signal = Signal::DataUpdated("home".to_string());
        dispatcher.connect(
            signal.clone(),
            Subscriber::Platform {
                entry_id: "home".to_string(),
                platform: Platform::DeviceTracker,
            },
        );
        dispatcher.connect(signal.clone(), entity("device_tracker.a"));

        let subs = dispatcher.subscribers(&signal);
        assert_eq!(subs.len(), 2);
        assert!(matches!(subs[0], Subscriber::Platform { .. }));
        assert_eq!(subs[1], entity("device_tracker.a"));
    }

    #[test]
    fn test_disconnect() {
        let mut dispatcher = Dispatcher::new();
        let signal = Signal::OptionsUpdated("home".to_string());
        let id = dispatcher.connect(signal.clone(), entity("device_tracker.a"));

        assert!(dispatcher.disconnect(id));
        assert!(!dispatcher.disconnect(id));
        assert_eq!(dispatcher.subscriber_count(&signal), 0);
    }

    #[test]
    fn test_disconnect_entry_is_scoped() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.connect(Signal::DataUpdated("home".to_string()), entity("a"));
        dispatcher.connect(Signal::OptionsUpdated("home".to_string()), entity("a"));
        dispatcher.connect(Signal::DataUpdated("office".to_string()), entity("b"));

        assert_eq!(dispatcher.disconnect_entry("home"), 2);
        assert_eq!(
            dispatcher.subscriber_count(&Signal::DataUpdated("office".to_string())),
            1
        );
    }

    #[test]
    fn test_signal_display() {
        let signal = Signal::DataUpdated("home".to_string());
        assert_eq!(signal.to_string(), "data_updated[home]");
        assert_eq!(signal.entry_id(), "home");
    }
}
