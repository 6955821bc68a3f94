/// Event bus: channel subscriptions and inbound dispatch.
pub mod bus;
/// Connection settings supplied by the hosting application.
pub mod config;
/// Delivery engine: durable log append + broadcast with fallback.
pub mod delivery;
/// Common error types: configuration, transport, publishing, receiving.
pub mod error;
/// Flexible logging bootstrap (console and file sinks).
pub mod logging;
/// Message model: envelope, lifecycle state, timestamp, kind registry.
pub mod message;
/// Typed per-kind publishers and the registry container.
pub mod publisher;
/// Transport seam: trait, in-process hub, connection pool, retry policy.
pub mod transport;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Event bus API.
pub use bus::{EventBus, InboundMessage, Subscription};
/// Connection parameters and pool keying.
pub use config::{ConnectionSettings, EndpointKey};
/// Delivery engine.
pub use delivery::DeliveryEngine;
/// Operation errors and result types.
pub use error::{ConfigError, PublishError, PublishResult, RecvError, TransportError};
/// Logging bootstrap.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Message envelope and taxonomy.
pub use message::{
    Correlation, ConversationState, EnvelopeBuilder, KindTag, MessageEnvelope, MessageKind,
    NodeEvent, NodeStatus, NoticeLevel, Timestamp,
};
/// Publisher layer.
pub use publisher::{Publisher, PublisherRegistry};
/// Transport seam and implementations.
pub use transport::{
    ConnectionMode, ConnectionPool, Connector, MemoryConnector, MemoryHub, MemoryTransport,
    RetryPolicy, Transport, TransportCommand, TransportMessage,
};
