//! Online presence beacon messages

use bytes::Bytes;
use rumqttc::v5::mqttbytes::QoS;

use crate::message::Message;

/// Payload published while the client is online
pub const ONLINE_PAYLOAD: &[u8] = br#"{"online":true}"#;
/// Payload published when the client goes away
pub const OFFLINE_PAYLOAD: &[u8] = br#"{"online":false}"#;

/// Retained online/offline pair announcing a client's liveness.
///
/// The online message is published after every successful (re)connect. The
/// offline message is published on close and registered as the broker-side
/// last will, so other participants see the client go offline even when it
/// disappears without closing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlinePresence {
	topic: String,
	online: Message,
	offline: Message,
}

impl OnlinePresence {
	/// Default beacon for `client_id` on `client/{client_id}/online`.
	pub fn for_client(client_id: &str) -> Self {
		let topic = format!("client/{client_id}/online");
		let online = beacon(&topic, Bytes::from_static(ONLINE_PAYLOAD));
		let offline = beacon(&topic, Bytes::from_static(OFFLINE_PAYLOAD));
		Self {
			topic,
			online,
			offline,
		}
	}

	/// Custom beacon pair; both messages are pinned to `topic`.
	pub fn new(
		topic: impl Into<String>,
		mut online: Message,
		mut offline: Message,
	) -> Self {
		let topic = topic.into();
		online.topic.clone_from(&topic);
		offline.topic.clone_from(&topic);
		Self {
			topic,
			online,
			offline,
		}
	}

	/// Topic both beacons are published to
	pub fn topic(&self) -> &str {
		&self.topic
	}

	/// Message announcing the client is online
	pub fn online(&self) -> &Message {
		&self.online
	}

	/// Message announcing the client is offline
	pub fn offline(&self) -> &Message {
		&self.offline
	}
}

fn beacon(topic: &str, payload: Bytes) -> Message {
	Message::new(topic, payload)
		.with_qos(QoS::AtLeastOnce)
		.with_retain(true)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_presence_is_derived_from_client_id() {
		let presence = OnlinePresence::for_client("dev-42");
		assert_eq!(presence.topic(), "client/dev-42/online");

		let online = presence.online();
		assert_eq!(online.topic, "client/dev-42/online");
		assert_eq!(online.payload_str(), Some(r#"{"online":true}"#));
		assert_eq!(online.qos, QoS::AtLeastOnce);
		assert!(online.retain);

		let offline = presence.offline();
		assert_eq!(offline.topic, "client/dev-42/online");
		assert_eq!(offline.payload_str(), Some(r#"{"online":false}"#));
		assert_eq!(offline.qos, QoS::AtLeastOnce);
		assert!(offline.retain);
	}

	#[test]
	fn custom_presence_pins_messages_to_topic() {
		let presence = OnlinePresence::new(
			"fleet/truck-7/alive",
			Message::new("ignored", "up"),
			Message::new("also/ignored", "down"),
		);
		assert_eq!(presence.online().topic, "fleet/truck-7/alive");
		assert_eq!(presence.offline().topic, "fleet/truck-7/alive");
	}
}
