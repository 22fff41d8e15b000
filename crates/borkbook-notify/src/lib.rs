pub mod dispatcher;
pub mod provider;
pub mod registry;

pub use dispatcher::Dispatcher;
pub use provider::{FcmConfig, FcmProvider, ProviderError, PushProvider, UnconfiguredProvider};
pub use registry::DeviceRegistry;
