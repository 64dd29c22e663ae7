//! MQTT application message and its MQTT 5 metadata.
//!
//! A [`Message`] is built by application code (directly or through one of the
//! JSON factory helpers) and handed to
//! [`BrokerConnection::publish`](crate::BrokerConnection::publish), or it is
//! built by the delivery path from an inbound packet and handed to callbacks.

use std::collections::HashMap;

use bytes::Bytes;
use rumqttc::v5::mqttbytes::v5::{Publish, PublishProperties};
use rumqttc::v5::mqttbytes::QoS;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::connection::SubscriptionId;

/// Content type stamped on every message built by the JSON factories.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// User property carrying the state version of a property-state message.
pub const PROPERTY_VERSION_KEY: &str = "PropertyVersion";
/// User property carrying the return code of an error response.
pub const RETURN_CODE_KEY: &str = "ReturnCode";
/// User property carrying the human readable detail of an error response.
pub const DEBUG_INFO_KEY: &str = "DebugInfo";

/// Errors raised while building or decoding messages
#[derive(Debug, Error)]
pub enum MessageError {
	/// QoS outside of 0..=2
	#[error("Invalid QoS value: {0}")]
	InvalidQos(u8),

	/// Payload could not be encoded to or decoded from JSON
	#[error("JSON payload error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Converts a numeric QoS level into the wire enum.
pub fn qos_from_u8(level: u8) -> Result<QoS, MessageError> {
	match level {
		| 0 => Ok(QoS::AtMostOnce),
		| 1 => Ok(QoS::AtLeastOnce),
		| 2 => Ok(QoS::ExactlyOnce),
		| other => Err(MessageError::InvalidQos(other)),
	}
}

/// Converts the wire enum back into its numeric level.
pub fn qos_to_u8(qos: QoS) -> u8 {
	match qos {
		| QoS::AtMostOnce => 0,
		| QoS::AtLeastOnce => 1,
		| QoS::ExactlyOnce => 2,
	}
}

/// An MQTT application message.
///
/// Treated as immutable once handed to a connection. The only field the
/// library ever sets on your behalf is `subscription_id`, and only on the
/// copy given to an inbound callback; it is ignored when publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
	/// Topic the message is published to or was received on
	pub topic: String,
	/// Raw payload, possibly empty
	pub payload: Bytes,
	/// Delivery guarantee
	pub qos: QoS,
	/// Broker-side retain flag
	pub retain: bool,
	/// MQTT 5 content type property
	pub content_type: Option<String>,
	/// MQTT 5 correlation data property
	pub correlation_data: Option<Bytes>,
	/// MQTT 5 response topic property
	pub response_topic: Option<String>,
	/// Subscription the message was delivered under (inbound only)
	pub subscription_id: Option<SubscriptionId>,
	/// MQTT 5 message expiry interval, in seconds
	pub message_expiry_interval: Option<u32>,
	/// MQTT 5 user properties
	pub user_properties: HashMap<String, String>,
}

impl Message {
	/// Creates a QoS 0, non-retained message with no properties.
	pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
		Self {
			topic: topic.into(),
			payload: payload.into(),
			qos: QoS::AtMostOnce,
			retain: false,
			content_type: None,
			correlation_data: None,
			response_topic: None,
			subscription_id: None,
			message_expiry_interval: None,
			user_properties: HashMap::new(),
		}
	}

	/// Sets the QoS level.
	pub fn with_qos(mut self, qos: QoS) -> Self {
		self.qos = qos;
		self
	}

	/// Sets the retain flag.
	pub fn with_retain(mut self, retain: bool) -> Self {
		self.retain = retain;
		self
	}

	/// Sets the content type property.
	pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
		self.content_type = Some(content_type.into());
		self
	}

	/// Sets the correlation data property.
	pub fn with_correlation_data(mut self, data: impl Into<Bytes>) -> Self {
		self.correlation_data = Some(data.into());
		self
	}

	/// Sets the response topic property.
	pub fn with_response_topic(mut self, topic: impl Into<String>) -> Self {
		self.response_topic = Some(topic.into());
		self
	}

	/// Sets the message expiry interval, in seconds.
	pub fn with_expiry_interval(mut self, seconds: u32) -> Self {
		self.message_expiry_interval = Some(seconds);
		self
	}

	/// Adds (or replaces) a user property.
	pub fn with_user_property(
		mut self,
		key: impl Into<String>,
		value: impl Into<String>,
	) -> Self {
		self.user_properties.insert(key.into(), value.into());
		self
	}

	/// Copy of this message stamped with the subscription it was delivered
	/// under.
	pub fn with_subscription_id(&self, id: SubscriptionId) -> Self {
		let mut copy = self.clone();
		copy.subscription_id = Some(id);
		copy
	}

	/// Numeric QoS level (0, 1 or 2).
	pub fn qos_level(&self) -> u8 {
		qos_to_u8(self.qos)
	}

	/// Payload as UTF-8, if it is valid UTF-8.
	pub fn payload_str(&self) -> Option<&str> {
		std::str::from_utf8(&self.payload).ok()
	}

	/// Decodes the payload as JSON.
	pub fn payload_json<T: DeserializeOwned>(&self) -> Result<T, MessageError> {
		Ok(serde_json::from_slice(&self.payload)?)
	}

	/// JSON-encoded message with the `application/json` content type.
	pub fn json<T: Serialize + ?Sized>(
		topic: impl Into<String>,
		payload: &T,
		qos: QoS,
		retain: bool,
	) -> Result<Self, MessageError> {
		let bytes = serde_json::to_vec(payload)?;
		Ok(Self::new(topic, bytes)
			.with_qos(qos)
			.with_retain(retain)
			.with_content_type(JSON_CONTENT_TYPE))
	}

	/// Request half of a request/response exchange.
	///
	/// The responder is expected to publish to `response_topic` and echo
	/// `correlation_data` back.
	pub fn request<T: Serialize + ?Sized>(
		topic: impl Into<String>,
		payload: &T,
		response_topic: impl Into<String>,
		correlation_data: impl Into<Bytes>,
	) -> Result<Self, MessageError> {
		Ok(Self::json(topic, payload, QoS::ExactlyOnce, false)?
			.with_response_topic(response_topic)
			.with_correlation_data(correlation_data))
	}

	/// Successful response to a request.
	pub fn response<T: Serialize + ?Sized>(
		topic: impl Into<String>,
		payload: &T,
		correlation_data: impl Into<Bytes>,
	) -> Result<Self, MessageError> {
		Ok(Self::json(topic, payload, QoS::AtLeastOnce, false)?
			.with_correlation_data(correlation_data))
	}

	/// Failed response to a request.
	///
	/// Carries an empty JSON object as payload; the failure is described by
	/// the `ReturnCode` and `DebugInfo` user properties.
	pub fn error_response(
		topic: impl Into<String>,
		correlation_data: Option<Bytes>,
		return_code: u32,
		debug_info: impl Into<String>,
	) -> Self {
		let mut message = Self::new(topic, Bytes::from_static(b"{}"))
			.with_qos(QoS::AtLeastOnce)
			.with_content_type(JSON_CONTENT_TYPE)
			.with_user_property(RETURN_CODE_KEY, return_code.to_string())
			.with_user_property(DEBUG_INFO_KEY, debug_info);
		message.correlation_data = correlation_data;
		message
	}

	/// Retained snapshot of a property value, tagged with its version.
	pub fn property_state<T: Serialize + ?Sized>(
		topic: impl Into<String>,
		payload: &T,
		version: u32,
	) -> Result<Self, MessageError> {
		Ok(Self::json(topic, payload, QoS::AtLeastOnce, true)?
			.with_user_property(PROPERTY_VERSION_KEY, version.to_string()))
	}

	/// MQTT 5 publish properties for this message.
	///
	/// Only the optional fields that are set are emitted, and the subscription
	/// identifier is never sent.
	pub fn publish_properties(&self) -> PublishProperties {
		PublishProperties {
			message_expiry_interval: self.message_expiry_interval,
			response_topic: self.response_topic.clone(),
			correlation_data: self.correlation_data.clone(),
			user_properties: self
				.user_properties
				.iter()
				.map(|(k, v)| (k.clone(), v.clone()))
				.collect(),
			content_type: self.content_type.clone(),
			..Default::default()
		}
	}

	/// Builds a message from an inbound publish packet.
	pub fn from_publish(publish: &Publish) -> Self {
		let topic = String::from_utf8_lossy(&publish.topic).into_owned();
		let mut message = Self::new(topic, publish.payload.clone())
			.with_qos(publish.qos)
			.with_retain(publish.retain);
		if let Some(props) = &publish.properties {
			message.content_type = props.content_type.clone();
			message.correlation_data = props.correlation_data.clone();
			message.response_topic = props.response_topic.clone();
			message.message_expiry_interval = props.message_expiry_interval;
			message.user_properties =
				props.user_properties.iter().cloned().collect();
			message.subscription_id = props
				.subscription_identifiers
				.first()
				.map(|id| SubscriptionId(*id));
		}
		message
	}
}

#[cfg(test)]
mod tests {
	use serde::Deserialize;

	use super::*;

	#[derive(Serialize, Deserialize, Debug, PartialEq)]
	struct Reading {
		value: i32,
	}

	#[test]
	fn new_message_has_empty_user_properties() {
		let msg = Message::new("a/b", "hi");
		assert!(msg.user_properties.is_empty());
		assert_eq!(msg.qos_level(), 0);
		assert!(!msg.retain);
		assert!(msg.subscription_id.is_none());
	}

	#[test]
	fn qos_conversion_rejects_out_of_range() {
		assert_eq!(qos_from_u8(2).unwrap(), QoS::ExactlyOnce);
		assert!(matches!(qos_from_u8(3), Err(MessageError::InvalidQos(3))));
	}

	#[test]
	fn publish_properties_skip_unset_fields() {
		let props = Message::new("a", "").publish_properties();
		assert!(props.content_type.is_none());
		assert!(props.correlation_data.is_none());
		assert!(props.response_topic.is_none());
		assert!(props.message_expiry_interval.is_none());
		assert!(props.user_properties.is_empty());
		assert!(props.subscription_identifiers.is_empty());
	}

	#[test]
	fn publish_properties_never_carry_subscription_id() {
		let msg = Message::new("a", "")
			.with_content_type("text/plain")
			.with_expiry_interval(60)
			.with_user_property("k", "v")
			.with_subscription_id(SubscriptionId(12));
		let props = msg.publish_properties();
		assert_eq!(props.content_type.as_deref(), Some("text/plain"));
		assert_eq!(props.message_expiry_interval, Some(60));
		assert_eq!(
			props.user_properties,
			vec![("k".to_string(), "v".to_string())]
		);
		assert!(props.subscription_identifiers.is_empty());
	}

	#[test]
	fn inbound_publish_populates_properties_and_subscription_id() {
		let mut publish =
			Publish::new("sensors/t1", QoS::AtLeastOnce, "21", None);
		publish.retain = true;
		publish.properties = Some(PublishProperties {
			response_topic: Some("reply/here".into()),
			correlation_data: Some(Bytes::from_static(b"c1")),
			user_properties: vec![("unit".into(), "C".into())],
			subscription_identifiers: vec![11, 12],
			content_type: Some("text/plain".into()),
			..Default::default()
		});

		let msg = Message::from_publish(&publish);
		assert_eq!(msg.topic, "sensors/t1");
		assert_eq!(msg.payload_str(), Some("21"));
		assert_eq!(msg.qos, QoS::AtLeastOnce);
		assert!(msg.retain);
		assert_eq!(msg.response_topic.as_deref(), Some("reply/here"));
		assert_eq!(msg.correlation_data.as_deref(), Some(&b"c1"[..]));
		assert_eq!(msg.user_properties.get("unit").map(String::as_str), Some("C"));
		assert_eq!(msg.subscription_id, Some(SubscriptionId(11)));
	}

	#[test]
	fn request_and_response_carry_correlation() {
		let req = Message::request(
			"svc/add",
			&Reading { value: 1 },
			"client/x/reply",
			"corr-1",
		)
		.unwrap();
		assert_eq!(req.qos, QoS::ExactlyOnce);
		assert_eq!(req.content_type.as_deref(), Some(JSON_CONTENT_TYPE));
		assert_eq!(req.response_topic.as_deref(), Some("client/x/reply"));

		let resp = Message::response(
			"client/x/reply",
			&Reading { value: 2 },
			req.correlation_data.clone().unwrap(),
		)
		.unwrap();
		assert_eq!(resp.correlation_data.as_deref(), Some(&b"corr-1"[..]));
		assert_eq!(resp.payload_json::<Reading>().unwrap(), Reading { value: 2 });
	}

	#[test]
	fn error_response_describes_failure_in_user_properties() {
		let msg = Message::error_response(
			"client/x/reply",
			Some(Bytes::from_static(b"c")),
			7,
			"division by zero",
		);
		assert_eq!(msg.payload_str(), Some("{}"));
		assert_eq!(msg.user_properties[RETURN_CODE_KEY], "7");
		assert_eq!(msg.user_properties[DEBUG_INFO_KEY], "division by zero");
	}

	#[test]
	fn property_state_is_retained_and_versioned() {
		let msg =
			Message::property_state("dev/1/prop/speed", &Reading { value: 5 }, 3)
				.unwrap();
		assert!(msg.retain);
		assert_eq!(msg.qos, QoS::AtLeastOnce);
		assert_eq!(msg.user_properties[PROPERTY_VERSION_KEY], "3");
	}
}
