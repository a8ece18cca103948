mod device;
mod dispatcher;
#[allow(clippy::module_inception)]
mod engine;
mod entity;
mod host;
mod integration;
mod ownership;
mod platform;
mod registry;
pub mod state;

pub use device::format_mac;
pub use device::Device;
pub use device::DeviceInfo;
pub use device::DeviceRegistry;
pub use dispatcher::Dispatcher;
pub use dispatcher::Signal;
pub use dispatcher::SignalReceiver;
pub use dispatcher::SignalSender;
pub use dispatcher::Subscriber;
pub use dispatcher::SubscriptionId;
pub use engine::Engine;
pub use entity::attributes_from;
pub use entity::Attributes;
pub use entity::Entity;
pub use entity::Platform;
pub use entity::SignalOutcome;
pub use host::ConfigEntry;
pub use host::Host;
pub use integration::Integration;
pub use integration::IntegrationContext;
pub use integration::IntegrationFactoryResult;
pub use integration::REGISTRY as INTEGRATION_REGISTRY;
pub use ownership::OwnershipTable;
pub use platform::PlatformAdapter;
pub use registry::EntityRegistry;
pub use registry::RegistryEntry;
pub use state::EntityState;
pub use state::State;
