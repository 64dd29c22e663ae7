//! Configuration for broker connections

use std::time::Duration;

use rumqttc::v5::mqttbytes::QoS;

use super::error::MqttConnectionError;
use super::online_presence::OnlinePresence;

/// Default MQTT port
pub const DEFAULT_PORT: u16 = 1883;
/// Host used when none is given
pub const DEFAULT_HOST: &str = "localhost";

/// How the client reaches the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
	/// Plain TCP
	Tcp,
	/// MQTT over WebSocket
	#[cfg(feature = "websocket")]
	WebSocket,
	/// Unix domain socket
	Unix,
}

/// Where the broker lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttTransport {
	/// Transport used to reach the broker
	pub kind: TransportKind,
	/// Host name, or socket path for [`TransportKind::Unix`]
	pub host_or_path: String,
	/// Broker port; always 0 for [`TransportKind::Unix`]
	pub port: u16,
}

impl MqttTransport {
	/// TCP transport; an empty host means `localhost`.
	pub fn tcp(host: impl Into<String>, port: u16) -> Self {
		Self {
			kind: TransportKind::Tcp,
			host_or_path: host_or_default(host.into()),
			port,
		}
	}

	/// WebSocket transport.
	#[cfg(feature = "websocket")]
	pub fn websocket(host: impl Into<String>, port: u16) -> Self {
		Self {
			kind: TransportKind::WebSocket,
			host_or_path: host_or_default(host.into()),
			port,
		}
	}

	/// Unix domain socket transport.
	pub fn unix(path: impl Into<String>) -> Self {
		Self {
			kind: TransportKind::Unix,
			host_or_path: path.into(),
			port: 0,
		}
	}

	/// `localhost:1883` over TCP
	pub fn localhost() -> Self {
		Self::tcp(DEFAULT_HOST, DEFAULT_PORT)
	}
}

fn host_or_default(host: String) -> String {
	if host.is_empty() {
		DEFAULT_HOST.to_string()
	} else {
		host
	}
}

/// What to do with a publish issued while the pending queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
	/// Evict the oldest queued publish to make room
	#[default]
	DropOldest,
	/// Drop the new publish
	DropNewest,
	/// Refuse the new publish and log a warning
	Reject,
}

/// Bound on the publish queue kept while disconnected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueuePolicy {
	/// Maximum number of queued publishes; `None` means unbounded
	pub max_depth: Option<usize>,
	/// Applied once `max_depth` is reached
	pub overflow: OverflowPolicy,
}

impl QueuePolicy {
	/// No bound at all
	pub fn unbounded() -> Self {
		Self::default()
	}

	/// At most `max_depth` queued publishes, handled with `overflow` beyond
	/// that.
	pub fn bounded(max_depth: usize, overflow: OverflowPolicy) -> Self {
		Self {
			max_depth: Some(max_depth),
			overflow,
		}
	}
}

/// Connection-level behavior settings
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
	/// MQTT keep-alive interval
	pub keep_alive: Duration,
	/// Capacity of the request channel between the client and its event loop
	pub event_loop_capacity: usize,
	/// QoS used for every wire-level subscribe
	pub subscribe_qos: QoS,
	/// Upper bound on each wait performed by `close()`
	pub close_timeout: Duration,
	/// First delay after a transport error
	pub reconnect_initial_delay: Duration,
	/// Cap on the exponential reconnect delay
	pub reconnect_max_delay: Duration,
	/// Bound on publishes queued while disconnected
	pub publish_queue: QueuePolicy,
}

impl Default for ConnectionSettings {
	fn default() -> Self {
		Self {
			keep_alive: Duration::from_secs(30),
			event_loop_capacity: 100,
			subscribe_qos: QoS::AtLeastOnce,
			close_timeout: Duration::from_secs(5),
			reconnect_initial_delay: Duration::from_millis(100),
			reconnect_max_delay: Duration::from_secs(30),
			publish_queue: QueuePolicy::unbounded(),
		}
	}
}

impl ConnectionSettings {
	/// Rejects values the connection cannot work with.
	pub fn validate(&self) -> Result<(), MqttConnectionError> {
		if self.event_loop_capacity == 0 {
			return Err(MqttConnectionError::ConfigurationValue(
				"event_loop_capacity must be greater than 0".to_string(),
			));
		}
		if self.publish_queue.max_depth == Some(0) {
			return Err(MqttConnectionError::ConfigurationValue(
				"publish_queue.max_depth must be greater than 0".to_string(),
			));
		}
		if self.reconnect_initial_delay > self.reconnect_max_delay {
			return Err(MqttConnectionError::ConfigurationValue(
				"reconnect_initial_delay must not exceed reconnect_max_delay"
					.to_string(),
			));
		}
		Ok(())
	}
}

/// Configuration for [`Mqtt5Connection::connect`](super::Mqtt5Connection::connect)
#[derive(Debug, Clone)]
pub struct MqttConnectionConfig {
	/// Where the broker lives
	pub transport: MqttTransport,
	/// MQTT client id; a random UUID when `None`
	pub client_id: Option<String>,
	/// Presence beacons; derived from the client id when `None`
	pub presence: Option<OnlinePresence>,
	/// Connection-level behavior settings
	pub settings: ConnectionSettings,
}

impl MqttConnectionConfig {
	/// Config with default settings and a generated client id
	pub fn new(transport: MqttTransport) -> Self {
		Self {
			transport,
			client_id: None,
			presence: None,
			settings: ConnectionSettings::default(),
		}
	}

	/// Config for localhost:1883
	pub fn localhost() -> Self {
		Self::new(MqttTransport::localhost())
	}

	/// Sets the MQTT client id.
	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());
		self
	}

	/// Replaces the default presence beacons.
	pub fn with_presence(mut self, presence: OnlinePresence) -> Self {
		self.presence = Some(presence);
		self
	}

	/// Replaces the connection settings.
	pub fn with_settings(mut self, settings: ConnectionSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Checks the transport and settings.
	pub fn validate(&self) -> Result<(), MqttConnectionError> {
		if self.transport.host_or_path.is_empty() {
			return Err(MqttConnectionError::ConfigurationValue(
				"socket path must not be empty".to_string(),
			));
		}
		if matches!(&self.client_id, Some(id) if id.is_empty()) {
			return Err(MqttConnectionError::ConfigurationValue(
				"client_id must not be empty".to_string(),
			));
		}
		self.settings.validate()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tcp_defaults_empty_host_to_localhost() {
		let transport = MqttTransport::tcp("", 1884);
		assert_eq!(transport.host_or_path, "localhost");
		assert_eq!(transport.port, 1884);
	}

	#[test]
	fn unix_transport_has_no_port() {
		let transport = MqttTransport::unix("/run/mosquitto.sock");
		assert_eq!(transport.kind, TransportKind::Unix);
		assert_eq!(transport.port, 0);
	}

	#[test]
	fn default_config_is_valid_and_unbounded() {
		let config = MqttConnectionConfig::localhost();
		assert!(config.validate().is_ok());
		assert_eq!(config.settings.publish_queue.max_depth, None);
	}

	#[test]
	fn zero_sized_values_are_rejected() {
		let mut settings = ConnectionSettings::default();
		settings.publish_queue = QueuePolicy::bounded(0, OverflowPolicy::Reject);
		assert!(matches!(
			settings.validate(),
			Err(MqttConnectionError::ConfigurationValue(_))
		));

		let mut settings = ConnectionSettings::default();
		settings.event_loop_capacity = 0;
		assert!(settings.validate().is_err());

		let config = MqttConnectionConfig::new(MqttTransport::unix(""));
		assert!(config.validate().is_err());

		let config = MqttConnectionConfig::localhost().with_client_id("");
		assert!(config.validate().is_err());
	}
}
