//! [`Transport`] over the `rumqttc` MQTT 5 client, and the task driving it.
//!
//! rumqttc assigns packet ids inside its event loop, after `publish` has
//! returned, so this transport hands out its own [`PublishToken`]s and pairs
//! each with the packet id reported by the matching `Outgoing::Publish`
//! event. Requests leave rumqttc's channel in the order they were queued,
//! which keeps that pairing FIFO.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rumqttc::v5::mqttbytes::v5::{
	ConnAck, ConnectReturnCode, LastWill, Packet, SubscribeProperties,
};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use rumqttc::Outgoing;
use tokio::time;
use tracing::{debug, info, trace, warn};

use super::async_client::ConnectionCore;
use super::config::{MqttConnectionConfig, TransportKind};
use super::error::MqttConnectionError;
use super::online_presence::OnlinePresence;
use super::transport::{PublishToken, Transport, TransportError, TransportEvent};
use crate::connection::SubscriptionId;
use crate::message::Message;
use crate::topic;

/// Pairs publish tokens with the packet ids rumqttc assigns to them.
#[derive(Debug, Default)]
pub(crate) struct PublishTracker {
	next_token: u64,
	awaiting_pkid: VecDeque<(PublishToken, QoS)>,
	in_flight: HashMap<u16, PublishToken>,
}

impl PublishTracker {
	/// Issues the token for a publish about to enter rumqttc's channel.
	pub(crate) fn issue(&mut self, qos: QoS) -> PublishToken {
		let token = PublishToken(self.next_token);
		self.next_token += 1;
		self.awaiting_pkid.push_back((token, qos));
		token
	}

	/// Takes back the most recently issued token after rumqttc refused it.
	pub(crate) fn revoke(&mut self, token: PublishToken) {
		if self.awaiting_pkid.back().map(|(t, _)| *t) == Some(token) {
			self.awaiting_pkid.pop_back();
		}
	}

	/// Records that a publish went out with `pkid`.
	///
	/// Returns the token of a QoS 0 publish, which is complete once sent.
	pub(crate) fn on_outgoing(&mut self, pkid: u16) -> Option<PublishToken> {
		if pkid != 0 && self.in_flight.contains_key(&pkid) {
			trace!(pkid, "Retransmission of an in-flight publish");
			return None;
		}
		let Some((token, qos)) = self.awaiting_pkid.pop_front() else {
			debug!(pkid, "Outgoing publish without a pending token");
			return None;
		};
		if qos == QoS::AtMostOnce {
			Some(token)
		} else {
			self.in_flight.insert(pkid, token);
			None
		}
	}

	/// Token of the publish the broker acknowledged under `pkid`.
	pub(crate) fn on_acknowledged(&mut self, pkid: u16) -> Option<PublishToken> {
		self.in_flight.remove(&pkid)
	}
}

/// Production transport backed by [`rumqttc::v5::AsyncClient`].
pub struct RumqttTransport {
	client: AsyncClient,
	tracker: Mutex<PublishTracker>,
}

impl RumqttTransport {
	/// Builds the rumqttc client and the event loop that has to be polled to
	/// drive it.
	///
	/// The offline beacon of `presence` becomes the session's last will.
	pub fn new(
		config: &MqttConnectionConfig,
		client_id: &str,
		presence: &OnlinePresence,
	) -> Result<(Self, EventLoop), MqttConnectionError> {
		let mut options = mqtt_options(config, client_id)?;
		options.set_keep_alive(config.settings.keep_alive);
		options.set_clean_start(true);
		let will = presence.offline();
		options.set_last_will(LastWill::new(
			will.topic.clone(),
			will.payload.clone(),
			will.qos,
			will.retain,
			None,
		));

		let (client, event_loop) =
			AsyncClient::new(options, config.settings.event_loop_capacity);
		let transport = Self {
			client,
			tracker: Mutex::new(PublishTracker::default()),
		};
		Ok((transport, event_loop))
	}

	/// The underlying rumqttc client
	pub fn client(&self) -> &AsyncClient {
		&self.client
	}

	fn tracker(&self) -> MutexGuard<'_, PublishTracker> {
		self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

fn mqtt_options(
	config: &MqttConnectionConfig,
	client_id: &str,
) -> Result<MqttOptions, MqttConnectionError> {
	let target = &config.transport;
	let options = match target.kind {
		| TransportKind::Tcp => {
			MqttOptions::new(client_id, target.host_or_path.as_str(), target.port)
		}
		#[cfg(feature = "websocket")]
		| TransportKind::WebSocket => {
			let url =
				format!("ws://{}:{}/mqtt", target.host_or_path, target.port);
			let mut options = MqttOptions::new(client_id, url, target.port);
			options.set_transport(rumqttc::Transport::Ws);
			options
		}
		#[cfg(unix)]
		| TransportKind::Unix => {
			let mut options =
				MqttOptions::new(client_id, target.host_or_path.as_str(), 0);
			options.set_transport(rumqttc::Transport::Unix);
			options
		}
		#[cfg(not(unix))]
		| TransportKind::Unix => {
			return Err(MqttConnectionError::ConfigurationValue(
				"unix domain sockets are not supported on this platform"
					.to_string(),
			));
		}
	};
	Ok(options)
}

impl Transport for RumqttTransport {
	fn publish(&self, message: &Message) -> Result<PublishToken, TransportError> {
		if !topic::is_valid_topic_name(&message.topic) {
			return Err(TransportError::InvalidTopic(message.topic.clone()));
		}
		let mut tracker = self.tracker();
		let token = tracker.issue(message.qos);
		let sent = self.client.try_publish_with_properties(
			message.topic.clone(),
			message.qos,
			message.retain,
			message.payload.clone(),
			message.publish_properties(),
		);
		if let Err(err) = sent {
			tracker.revoke(token);
			return Err(err.into());
		}
		Ok(token)
	}

	fn subscribe(
		&self,
		filter: &str,
		qos: QoS,
		id: SubscriptionId,
	) -> Result<(), TransportError> {
		if !topic::is_valid_topic_filter(filter) {
			return Err(TransportError::InvalidTopic(filter.to_string()));
		}
		let properties = SubscribeProperties {
			id: Some(id.0),
			user_properties: Vec::new(),
		};
		self.client
			.try_subscribe_with_properties(filter, qos, properties)?;
		Ok(())
	}

	fn disconnect(&self) -> Result<(), TransportError> {
		self.client.try_disconnect()?;
		Ok(())
	}
}

/// Drives the rumqttc event loop and reports what happens to `core`.
///
/// rumqttc reconnects on the next poll after an error, so errors only back
/// off and keep polling. Every outgoing packet frees a slot in the request
/// channel, so the connection retries its queues after each one. The loop
/// ends once the client-initiated `Disconnect` has gone out.
pub(crate) async fn run(
	mut event_loop: EventLoop,
	core: Arc<ConnectionCore<RumqttTransport>>,
) {
	let initial_delay = core.settings().reconnect_initial_delay;
	let max_delay = core.settings().reconnect_max_delay;
	let mut error_count: u32 = 0;

	loop {
		match event_loop.poll().await {
			| Ok(Event::Incoming(Packet::ConnAck(ConnAck {
				code,
				session_present,
				..
			}))) => {
				error_count = 0;
				if code == ConnectReturnCode::Success {
					debug!(session_present, "CONNACK received");
					core.handle_event(TransportEvent::Connected { session_present });
				} else {
					core.handle_event(TransportEvent::ConnectFailed(format!(
						"{code:?}"
					)));
				}
			}
			| Ok(Event::Incoming(Packet::Publish(publish))) => {
				let message = Message::from_publish(&publish);
				core.handle_event(TransportEvent::Message(message));
			}
			| Ok(Event::Incoming(Packet::PubAck(ack))) => {
				acknowledge(&core, ack.pkid);
			}
			| Ok(Event::Incoming(Packet::PubComp(comp))) => {
				acknowledge(&core, comp.pkid);
			}
			| Ok(Event::Incoming(Packet::Disconnect(_))) => {
				info!("Received MQTT Disconnect packet from server");
				core.handle_event(TransportEvent::Disconnected);
			}
			| Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
				let sent = core.transport().tracker().on_outgoing(pkid);
				match sent {
					| Some(token) => core.handle_event(
						TransportEvent::PublishAcknowledged(token),
					),
					| None => core.flush(),
				}
			}
			| Ok(Event::Outgoing(Outgoing::Disconnect)) => {
				info!("Sent MQTT Disconnect packet to server");
				break;
			}
			| Ok(notification) => {
				trace!(notification = ?notification, "MQTT notification");
				core.flush();
			}
			| Err(err) => {
				error_count = error_count.saturating_add(1);
				if core.is_connected() {
					core.handle_event(TransportEvent::Disconnected);
				} else {
					core.handle_event(TransportEvent::ConnectFailed(
						err.to_string(),
					));
				}

				let delay = backoff_delay(initial_delay, max_delay, error_count);
				warn!(delay = ?delay, error_count, error = %err, "Retrying MQTT connection");
				time::sleep(delay).await;
			}
		}
	}
	info!("MQTT event loop terminated");
}

fn acknowledge(core: &ConnectionCore<RumqttTransport>, pkid: u16) {
	let token = core.transport().tracker().on_acknowledged(pkid);
	match token {
		| Some(token) => {
			core.handle_event(TransportEvent::PublishAcknowledged(token))
		}
		| None => debug!(pkid, "Acknowledgement for an untracked packet id"),
	}
}

/// Exponential backoff: `initial * 2^(attempt - 1)`, capped at `max`.
fn backoff_delay(initial: Duration, max: Duration, attempt: u32) -> Duration {
	let exponent = attempt.saturating_sub(1).min(10);
	initial.saturating_mul(2_u32.pow(exponent)).min(max)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tokens_pair_with_packet_ids_in_order() {
		let mut tracker = PublishTracker::default();
		let first = tracker.issue(QoS::AtLeastOnce);
		let second = tracker.issue(QoS::ExactlyOnce);

		assert_eq!(tracker.on_outgoing(7), None);
		assert_eq!(tracker.on_outgoing(8), None);
		assert_eq!(tracker.on_acknowledged(8), Some(second));
		assert_eq!(tracker.on_acknowledged(7), Some(first));
		assert_eq!(tracker.on_acknowledged(7), None);
	}

	#[test]
	fn qos0_publish_completes_when_sent() {
		let mut tracker = PublishTracker::default();
		let token = tracker.issue(QoS::AtMostOnce);
		assert_eq!(tracker.on_outgoing(0), Some(token));
	}

	#[test]
	fn retransmission_does_not_consume_a_token() {
		let mut tracker = PublishTracker::default();
		let first = tracker.issue(QoS::AtLeastOnce);
		let second = tracker.issue(QoS::AtLeastOnce);
		tracker.on_outgoing(1);
		// Resent after a reconnect with the same packet id
		tracker.on_outgoing(1);
		tracker.on_outgoing(2);
		assert_eq!(tracker.on_acknowledged(1), Some(first));
		assert_eq!(tracker.on_acknowledged(2), Some(second));
	}

	#[test]
	fn revoked_token_is_not_paired() {
		let mut tracker = PublishTracker::default();
		let kept = tracker.issue(QoS::AtLeastOnce);
		let refused = tracker.issue(QoS::AtLeastOnce);
		tracker.revoke(refused);
		tracker.on_outgoing(3);
		assert_eq!(tracker.on_acknowledged(3), Some(kept));
		assert!(tracker.awaiting_pkid.is_empty());
	}

	#[test]
	fn backoff_grows_and_caps() {
		let initial = Duration::from_millis(100);
		let max = Duration::from_secs(1);
		assert_eq!(backoff_delay(initial, max, 1), initial);
		assert_eq!(backoff_delay(initial, max, 3), Duration::from_millis(400));
		assert_eq!(backoff_delay(initial, max, 30), max);
	}

	fn transport_with_capacity(capacity: usize) -> (RumqttTransport, EventLoop) {
		let mut config = MqttConnectionConfig::localhost().with_client_id("t-1");
		config.settings.event_loop_capacity = capacity;
		let presence = OnlinePresence::for_client("t-1");
		RumqttTransport::new(&config, "t-1", &presence).unwrap()
	}

	#[tokio::test]
	async fn transport_builds_from_config() {
		let config = MqttConnectionConfig::localhost().with_client_id("t-1");
		let presence = OnlinePresence::for_client("t-1");
		let built = RumqttTransport::new(&config, "t-1", &presence);
		assert!(built.is_ok());
	}

	#[test]
	fn malformed_topics_are_rejected_for_good() {
		let (transport, _event_loop) = transport_with_capacity(4);

		let err = transport.publish(&Message::new("bad/+", "")).unwrap_err();
		assert_eq!(err, TransportError::InvalidTopic("bad/+".to_string()));
		assert!(err.is_permanent());

		let err = transport
			.subscribe("a/#/b", QoS::AtLeastOnce, SubscriptionId(10))
			.unwrap_err();
		assert!(err.is_permanent());
		assert!(transport.tracker().awaiting_pkid.is_empty());
	}

	#[test]
	fn full_request_channel_is_a_transient_refusal() {
		let (transport, _event_loop) = transport_with_capacity(2);
		transport.publish(&Message::new("a", "1")).unwrap();
		transport.publish(&Message::new("a", "2")).unwrap();

		let err = transport.publish(&Message::new("a", "3")).unwrap_err();
		assert!(matches!(err, TransportError::Unavailable(_)));
		assert!(!err.is_permanent());
		// The refused request left no token behind
		assert_eq!(transport.tracker().awaiting_pkid.len(), 2);
	}
}
