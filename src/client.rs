//! MQTT 5 broker connection
//!
//! This module provides the live connection engine, its configuration, the
//! transport boundary it drives, and the handles it returns to callers.

/// Connection engine: queuing, dispatch and acknowledgement tracking
pub mod async_client;
/// Publish completion handles
pub mod completion;
pub mod config;
/// Connection error types
pub mod error;
pub mod online_presence;
pub mod rumqtt_transport;
pub mod transport;

// Re-export commonly used types for convenience
pub use async_client::{ConnectionState, Mqtt5Connection};
pub use completion::{PublishError, PublishHandle, PublishResult};
pub use config::{
	ConnectionSettings, MqttConnectionConfig, MqttTransport, OverflowPolicy,
	QueuePolicy, TransportKind,
};
pub use error::MqttConnectionError;
pub use online_presence::OnlinePresence;
pub use rumqtt_transport::RumqttTransport;
pub use transport::{PublishToken, Transport, TransportError, TransportEvent};
