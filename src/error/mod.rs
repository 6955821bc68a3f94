pub mod bus;
pub mod config;
pub mod publish;
pub mod transport;

pub use bus::RecvError;
pub use config::ConfigError;
pub use publish::{PublishError, PublishResult};
pub use transport::TransportError;
