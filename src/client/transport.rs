//! Boundary between the connection engine and the MQTT protocol library.
//!
//! A [`Transport`] carries requests to the broker; the task driving it feeds
//! what happens on the wire back into the engine as [`TransportEvent`]s.

use std::fmt;

use rumqttc::v5::mqttbytes::QoS;
use thiserror::Error;

use crate::connection::SubscriptionId;
use crate::message::Message;

/// Opaque per-publish identifier issued by a transport and echoed in the
/// matching [`TransportEvent::PublishAcknowledged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublishToken(pub u64);

impl fmt::Display for PublishToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Errors reported by a transport request
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
	/// The request cannot be taken right now, e.g. the client's request
	/// channel is full; the same request may succeed later
	#[error("Transport cannot take the request: {0}")]
	Unavailable(String),

	/// The topic or filter can never be sent
	#[error("Invalid topic '{0}'")]
	InvalidTopic(String),
}

impl TransportError {
	/// Whether retrying the same request is pointless.
	pub fn is_permanent(&self) -> bool {
		matches!(self, Self::InvalidTopic(_))
	}
}

impl From<rumqttc::v5::ClientError> for TransportError {
	fn from(err: rumqttc::v5::ClientError) -> Self {
		Self::Unavailable(err.to_string())
	}
}

/// Something the transport observed on the wire.
#[derive(Debug, Clone)]
pub enum TransportEvent {
	/// The broker accepted the session
	Connected {
		/// Whether the broker resumed an earlier session, subscriptions
		/// included
		session_present: bool,
	},
	/// A connect attempt was rejected or failed
	ConnectFailed(String),
	/// The session was lost
	Disconnected,
	/// An application message arrived
	Message(Message),
	/// The broker acknowledged the publish issued under this token
	PublishAcknowledged(PublishToken),
}

/// Request side of an MQTT 5 session.
///
/// Every method must return promptly; implementations hand requests off to
/// their I/O task rather than waiting on the network.
pub trait Transport: Send + Sync + 'static {
	/// Sends `message`, returning the token its acknowledgement will carry.
	fn publish(&self, message: &Message) -> Result<PublishToken, TransportError>;

	/// Subscribes to `filter`, tagging the subscription with `id` so that
	/// inbound messages carry it back.
	fn subscribe(
		&self,
		filter: &str,
		qos: QoS,
		id: SubscriptionId,
	) -> Result<(), TransportError>;

	/// Asks the session to disconnect gracefully.
	fn disconnect(&self) -> Result<(), TransportError>;
}
