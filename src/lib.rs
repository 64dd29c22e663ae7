//! # Broker Link
//!
//! A client-side MQTT 5 connection that decouples application code from the
//! state of the broker connection.
//!
//! ## Features
//!
//! - **Queue before connect**: publishes and subscriptions issued while the
//!   broker is unreachable are queued and flushed in order on connect
//! - **Completion handles**: every publish returns a handle that resolves
//!   once the broker acknowledged it
//! - **Callback dispatch**: per-subscription callbacks routed by MQTT 5
//!   subscription identifiers, with global callbacks as the fallback
//! - **Online presence**: retained `client/{id}/online` beacons published on
//!   connect and close, with the offline beacon as last will
//! - **Mock connection**: the same contract in memory, for unit tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use broker_link::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MqttConnectionConfig::new(MqttTransport::tcp("localhost", 1883))
//!         .with_client_id("thermostat");
//!     let connection = Mqtt5Connection::connect(config)?;
//!
//!     // Safe to call before the broker answered; both are queued.
//!     connection.subscribe(
//!         "thermostat/setpoint",
//!         Some(callback(|msg| println!("new setpoint: {:?}", msg.payload_str()))),
//!     );
//!     let reading = Message::json("thermostat/temp", &21.5, QoS::AtLeastOnce, false)?;
//!     connection.publish(reading).await?;
//!
//!     connection.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Testing application code
//!
//! ```rust
//! use broker_link::prelude::*;
//!
//! fn announce(conn: &dyn BrokerConnection) {
//!     conn.publish(Message::new("status", "ready").with_retain(true));
//! }
//!
//! let mock = MockConnection::new();
//! announce(&mock);
//! assert_eq!(mock.find_published("status").len(), 1);
//! ```

#![warn(missing_docs)]

// Core modules
pub mod client;
pub mod connection;
pub mod message;
pub mod mock;
pub mod topic;

// === Core Public API ===
pub use client::{
	ConnectionSettings, ConnectionState, Mqtt5Connection, MqttConnectionConfig,
	MqttConnectionError, MqttTransport, OnlinePresence, OverflowPolicy,
	PublishError, PublishHandle, PublishResult, QueuePolicy, TransportKind,
};
pub use connection::{callback, BrokerConnection, MessageCallback, SubscriptionId};
pub use message::{Message, MessageError};
pub use mock::MockConnection;
// Essential external types
pub use rumqttc::v5::mqttbytes::QoS;

/// Result type alias for operations that may fail with MqttConnectionError
pub type Result<T> = std::result::Result<T, MqttConnectionError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use broker_link::prelude::*;
/// ```
pub mod prelude {
	pub use crate::{
		callback, BrokerConnection, ConnectionSettings, Message,
		MessageCallback, MockConnection, Mqtt5Connection, MqttConnectionConfig,
		MqttConnectionError, MqttTransport, OnlinePresence, PublishHandle, QoS,
		SubscriptionId,
	};
}

/// Types for plugging in a custom transport
///
/// ```rust
/// use broker_link::advanced::*;
/// ```
pub mod advanced {
	pub use crate::client::completion::{publish_completion, PublishCompleter};
	pub use crate::client::{
		PublishToken, RumqttTransport, Transport, TransportError,
		TransportEvent,
	};
	pub use crate::topic::matches;
}

/// Error types used throughout the library
pub mod errors {
	pub use crate::client::TransportError;
	pub use crate::{MessageError, MqttConnectionError, PublishError};
}
