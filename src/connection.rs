//! Broker connection contract
//!
//! Application code is written against [`BrokerConnection`] so that it runs
//! unchanged on a live [`Mqtt5Connection`](crate::Mqtt5Connection) or on a
//! [`MockConnection`](crate::MockConnection) in unit tests.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use rumqttc::v5::mqttbytes::QoS;

use crate::client::completion::PublishHandle;
use crate::message::Message;
use crate::topic;

/// Identifier of a subscription, unique for the lifetime of a connection.
///
/// On the live connection it is also the MQTT 5 subscription identifier
/// echoed by the broker on every message delivered under the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub usize);

impl fmt::Display for SubscriptionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Handler invoked with every message routed to it.
pub type MessageCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Wraps a closure into a [`MessageCallback`].
pub fn callback<F>(f: F) -> MessageCallback
where F: Fn(&Message) + Send + Sync + 'static {
	Arc::new(f)
}

/// Operations shared by every kind of broker connection.
pub trait BrokerConnection: Send + Sync {
	/// Publishes a message, or queues it until the connection is up.
	///
	/// Never blocks and never fails; the outcome is observed on the returned
	/// handle.
	fn publish(&self, message: Message) -> PublishHandle;

	/// Subscribes to a topic filter, or queues the subscription until the
	/// connection is up.
	///
	/// When `callback` is given, messages delivered under this subscription
	/// go to it instead of the global callbacks.
	fn subscribe(
		&self,
		filter: &str,
		callback: Option<MessageCallback>,
	) -> SubscriptionId;

	/// Registers a callback for messages that have no subscription-specific
	/// callback.
	fn add_message_callback(&self, callback: MessageCallback);

	/// Whether the connection to the broker is currently established.
	fn is_connected(&self) -> bool;

	/// MQTT client identifier.
	fn client_id(&self) -> &str;

	/// Topic carrying this client's online presence beacon, if any.
	fn online_topic(&self) -> Option<&str>;

	/// Whether `topic` matches the subscription `filter`.
	fn is_topic_sub(&self, topic: &str, filter: &str) -> bool {
		topic::matches(topic, filter)
	}

	/// Clears a retained value on the broker by publishing an empty retained
	/// message to `topic`.
	fn unpublish_retained(&self, topic: &str) -> PublishHandle {
		self.publish(
			Message::new(topic, Bytes::new())
				.with_qos(QoS::AtLeastOnce)
				.with_retain(true),
		)
	}
}
