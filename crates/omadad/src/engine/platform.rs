use super::entity::Platform;
use super::host::ConfigEntry;
use super::host::Host;

/// Per-entry adapter that keeps one platform's entities in sync with an
/// integration's data.
///
/// The engine owns the adapter for the lifetime of its config entry and
/// calls [`PlatformAdapter::items_added`] whenever a
/// [`Subscriber::Platform`](super::Subscriber::Platform) subscription the
/// adapter connected during setup fires.
pub trait PlatformAdapter: Send {
    fn platform(&self) -> Platform;

    fn entry(&self) -> &ConfigEntry;

    /// Connect signal subscriptions and add the initial entities.
    fn setup(&mut self, host: &mut Host);

    /// Create entities for eligible objects that have none yet.
    fn items_added(&mut self, host: &mut Host);
}
