use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::completion::{
	publish_completion, PublishCompleter, PublishError, PublishHandle,
};
use super::config::{ConnectionSettings, MqttConnectionConfig, OverflowPolicy};
use super::error::MqttConnectionError;
use super::online_presence::OnlinePresence;
use super::rumqtt_transport::{self, RumqttTransport};
use super::transport::{PublishToken, Transport, TransportEvent};
use crate::connection::{BrokerConnection, MessageCallback, SubscriptionId};
use crate::message::Message;
use crate::topic;

/// First identifier handed out by a live connection; lower values are left
/// for application-defined use.
pub const FIRST_SUBSCRIPTION_ID: usize = 10;

/// Lifecycle of a [`Mqtt5Connection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	/// Session requested, broker has not answered yet
	Connecting,
	/// Session established; requests go straight to the broker
	Connected,
	/// Session lost or refused; requests are queued
	Disconnected,
	/// `close()` ran; nothing is sent any more
	Closed,
}

/// Subscribe request waiting for the transport
#[derive(Debug)]
struct PendingSubscription {
	filter: String,
	id: SubscriptionId,
}

/// Publish request waiting for the transport
#[derive(Debug)]
struct PendingPublish {
	message: Message,
	completer: PublishCompleter,
	// Online beacon queued by the connect handler
	presence: bool,
}

/// Subscription callbacks and the subscribe queue.
///
/// Guarded by its own lock; the inbound dispatch path looks callbacks up
/// under the same lock that registers them. `live` is set once the queue
/// has been handed to the transport and cleared whenever requests have to
/// wait, so a new subscribe never overtakes a queued one.
#[derive(Default)]
struct Registry {
	live: bool,
	pending: VecDeque<PendingSubscription>,
	// Every subscription of the connection, in registration order
	active: BTreeMap<SubscriptionId, String>,
	callbacks: HashMap<SubscriptionId, MessageCallback>,
	global: Vec<MessageCallback>,
}

impl Registry {
	fn forget(&mut self, id: SubscriptionId) {
		self.active.remove(&id);
		self.callbacks.remove(&id);
	}
}

/// Publish queue and acknowledgement table, with the same `live` rule as
/// [`Registry`].
#[derive(Default)]
struct Outbound {
	live: bool,
	closed: bool,
	pending: VecDeque<PendingPublish>,
	in_flight: HashMap<PublishToken, PublishCompleter>,
}

/// State shared between the connection handle and the task driving the
/// transport.
///
/// Lock order: `registry`, then `outbound`, then `state`. `state` is never
/// held while taking another lock.
pub(crate) struct ConnectionCore<T> {
	transport: T,
	client_id: String,
	presence: OnlinePresence,
	settings: ConnectionSettings,
	state: Mutex<ConnectionState>,
	next_subscription_id: AtomicUsize,
	registry: Mutex<Registry>,
	outbound: Mutex<Outbound>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Transport> ConnectionCore<T> {
	fn new(
		transport: T,
		client_id: String,
		presence: OnlinePresence,
		settings: ConnectionSettings,
	) -> Self {
		Self {
			transport,
			client_id,
			presence,
			settings,
			state: Mutex::new(ConnectionState::Connecting),
			next_subscription_id: AtomicUsize::new(FIRST_SUBSCRIPTION_ID),
			registry: Mutex::new(Registry::default()),
			outbound: Mutex::new(Outbound::default()),
		}
	}

	pub(crate) fn transport(&self) -> &T {
		&self.transport
	}

	pub(crate) fn settings(&self) -> &ConnectionSettings {
		&self.settings
	}

	pub(crate) fn state(&self) -> ConnectionState {
		*lock(&self.state)
	}

	pub(crate) fn is_connected(&self) -> bool {
		self.state() == ConnectionState::Connected
	}

	/// Moves to `to` unless the connection is closed; returns the previous
	/// state on success.
	fn transition(&self, to: ConnectionState) -> Option<ConnectionState> {
		let mut state = lock(&self.state);
		if *state == ConnectionState::Closed {
			return None;
		}
		Some(std::mem::replace(&mut *state, to))
	}

	pub(crate) fn handle_event(&self, event: TransportEvent) {
		match event {
			| TransportEvent::Connected { session_present } => {
				if self.transition(ConnectionState::Connected).is_none() {
					debug!("Ignoring connect after close");
					return;
				}
				info!(client_id = %self.client_id, session_present, "Connected to MQTT broker");
				self.on_connected(session_present);
			}
			| TransportEvent::ConnectFailed(reason) => {
				if self.transition(ConnectionState::Disconnected).is_none() {
					return;
				}
				error!(client_id = %self.client_id, reason = %reason, "MQTT connection failed");
				self.go_offline();
			}
			| TransportEvent::Disconnected => {
				let Some(previous) =
					self.transition(ConnectionState::Disconnected)
				else {
					return;
				};
				if previous == ConnectionState::Connected {
					warn!(client_id = %self.client_id, "MQTT connection lost");
				}
				self.go_offline();
			}
			| TransportEvent::Message(message) => {
				if self.state() == ConnectionState::Closed {
					debug!(topic = %message.topic, "Ignoring message after close");
					return;
				}
				self.dispatch(message);
			}
			| TransportEvent::PublishAcknowledged(token) => {
				self.on_publish_acknowledged(token)
			}
		}
		self.flush();
	}

	/// Queues the subscriptions the broker has to hear about and the online
	/// beacon. The queues are handed over by [`flush`](Self::flush).
	fn on_connected(&self, session_present: bool) {
		{
			let mut registry = lock(&self.registry);
			if self.state() == ConnectionState::Closed {
				return;
			}
			registry.live = false;
			if !session_present {
				// Nothing survived on the broker side, so every subscription
				// goes out again under its original id.
				let resubscribe: VecDeque<_> = registry
					.active
					.iter()
					.map(|(id, filter)| PendingSubscription {
						filter: filter.clone(),
						id: *id,
					})
					.collect();
				if !resubscribe.is_empty() {
					info!(count = resubscribe.len(), "Resubscribing to all topic filters");
				}
				registry.pending = resubscribe;
			}
		}

		let mut outbound = lock(&self.outbound);
		if outbound.closed {
			return;
		}
		outbound.live = false;
		outbound.pending.retain(|pending| !pending.presence);
		// Nobody waits for the beacon; the broker holds it as retained.
		let (completer, _) = publish_completion();
		outbound.pending.push_back(PendingPublish {
			message: self.presence.online().clone(),
			completer,
			presence: true,
		});
	}

	fn go_offline(&self) {
		lock(&self.registry).live = false;
		lock(&self.outbound).live = false;
	}

	/// Hands queued subscriptions, then queued publishes, to the transport in
	/// enqueue order.
	///
	/// Stops at the first request the transport cannot take yet and leaves it
	/// at the head of its queue; the next event or request retries. Requests
	/// the transport rejects for good are dropped, failing their handles.
	pub(crate) fn flush(&self) {
		if self.flush_subscriptions() {
			self.flush_publishes();
		}
	}

	fn flush_subscriptions(&self) -> bool {
		let mut registry = lock(&self.registry);
		if registry.live {
			return true;
		}
		if !self.is_connected() {
			return false;
		}
		while let Some(pending) = registry.pending.pop_front() {
			let sent = self.transport.subscribe(
				&pending.filter,
				self.settings.subscribe_qos,
				pending.id,
			);
			match sent {
				| Ok(()) => {
					debug!(topic = %pending.filter, subscription_id = %pending.id, "Subscribed to queued topic filter");
				}
				| Err(err) if err.is_permanent() => {
					error!(topic = %pending.filter, error = %err, "Subscription rejected, dropping it");
					registry.forget(pending.id);
				}
				| Err(err) => {
					debug!(topic = %pending.filter, error = %err, "Transport busy, subscription stays queued");
					registry.pending.push_front(pending);
					return false;
				}
			}
		}
		registry.live = true;
		true
	}

	fn flush_publishes(&self) {
		let mut outbound = lock(&self.outbound);
		if outbound.live || outbound.closed || !self.is_connected() {
			return;
		}
		while let Some(pending) = outbound.pending.pop_front() {
			match self.transport.publish(&pending.message) {
				| Ok(token) => {
					debug!(topic = %pending.message.topic, token = %token, "Published queued message");
					outbound.in_flight.insert(token, pending.completer);
				}
				| Err(err) if err.is_permanent() => {
					error!(topic = %pending.message.topic, error = %err, "Queued publish rejected, dropping it");
					pending.completer.fail(PublishError::Rejected(err.to_string()));
				}
				| Err(err) => {
					debug!(topic = %pending.message.topic, error = %err, "Transport busy, publish stays queued");
					outbound.pending.push_front(pending);
					return;
				}
			}
		}
		outbound.live = true;
	}

	fn on_publish_acknowledged(&self, token: PublishToken) {
		let completer = lock(&self.outbound).in_flight.remove(&token);
		match completer {
			| Some(completer) => {
				debug!(token = %token, "Publish acknowledged");
				completer.succeed();
			}
			| None => {
				debug!(token = %token, "Ignoring acknowledgement for unknown publish");
			}
		}
	}

	fn dispatch(&self, message: Message) {
		debug!(topic = %message.topic, subscription_id = ?message.subscription_id, payload_size = message.payload.len(), "Received MQTT message");
		let targets = {
			let registry = lock(&self.registry);
			let specific = message
				.subscription_id
				.and_then(|id| registry.callbacks.get(&id));
			match specific {
				| Some(callback) => vec![Arc::clone(callback)],
				| None => registry.global.clone(),
			}
		};
		for callback in targets {
			callback(&message);
		}
	}

	fn publish(&self, message: Message) -> PublishHandle {
		if !topic::is_valid_topic_name(&message.topic) {
			warn!(topic = %message.topic, "Refusing to publish to an invalid topic");
			return PublishHandle::failed(PublishError::Rejected(format!(
				"invalid topic name '{}'",
				message.topic
			)));
		}
		let (completer, handle) = publish_completion();
		let queued = {
			let mut outbound = lock(&self.outbound);
			if outbound.closed {
				debug!(topic = %message.topic, "Publish after close");
				completer.fail(PublishError::ConnectionClosed);
				return handle;
			}
			let pending = PendingPublish {
				message,
				completer,
				presence: false,
			};
			if outbound.live {
				self.send_now(&mut outbound, pending)
			} else {
				debug!(topic = %pending.message.topic, "Queueing message for publishing later");
				self.enqueue(&mut outbound, pending);
				true
			}
		};
		if queued {
			self.flush();
		}
		handle
	}

	/// Publishes directly; returns whether the message ended up queued.
	fn send_now(&self, outbound: &mut Outbound, pending: PendingPublish) -> bool {
		match self.transport.publish(&pending.message) {
			| Ok(token) => {
				debug!(topic = %pending.message.topic, token = %token, "Publishing message");
				outbound.in_flight.insert(token, pending.completer);
				false
			}
			| Err(err) if err.is_permanent() => {
				warn!(topic = %pending.message.topic, error = %err, "Publish rejected by transport");
				pending.completer.fail(PublishError::Rejected(err.to_string()));
				false
			}
			| Err(err) => {
				debug!(topic = %pending.message.topic, error = %err, "Transport busy, queueing publish");
				outbound.live = false;
				self.enqueue(outbound, pending);
				true
			}
		}
	}

	fn enqueue(&self, outbound: &mut Outbound, pending: PendingPublish) {
		let policy = self.settings.publish_queue;
		if let Some(max_depth) = policy.max_depth {
			if outbound.pending.len() >= max_depth {
				match policy.overflow {
					| OverflowPolicy::DropOldest => {
						if let Some(evicted) = outbound.pending.pop_front() {
							warn!(topic = %evicted.message.topic, max_depth, "Publish queue full, dropping oldest message");
							evicted.completer.fail(PublishError::QueueOverflow);
						}
					}
					| OverflowPolicy::DropNewest => {
						debug!(topic = %pending.message.topic, max_depth, "Publish queue full, dropping new message");
						pending.completer.fail(PublishError::QueueOverflow);
						return;
					}
					| OverflowPolicy::Reject => {
						warn!(topic = %pending.message.topic, max_depth, "Publish queue full, rejecting message");
						pending.completer.fail(PublishError::QueueOverflow);
						return;
					}
				}
			}
		}
		outbound.pending.push_back(pending);
	}

	fn subscribe(
		&self,
		filter: &str,
		callback: Option<MessageCallback>,
	) -> SubscriptionId {
		let id =
			SubscriptionId(self.next_subscription_id.fetch_add(1, Ordering::Relaxed));
		if !topic::is_valid_topic_filter(filter) {
			error!(topic = %filter, subscription_id = %id, "Refusing to subscribe to an invalid topic filter");
			return id;
		}
		let queued = {
			let mut registry = lock(&self.registry);
			if let Some(callback) = callback {
				registry.callbacks.insert(id, callback);
			}
			if self.state() == ConnectionState::Closed {
				debug!(topic = %filter, subscription_id = %id, "Subscribe after close");
				return id;
			}
			registry.active.insert(id, filter.to_string());
			let pending = PendingSubscription {
				filter: filter.to_string(),
				id,
			};
			if !registry.live {
				debug!(topic = %filter, subscription_id = %id, "Pending subscription");
				registry.pending.push_back(pending);
				true
			} else {
				debug!(topic = %filter, subscription_id = %id, "Subscribing");
				let sent =
					self.transport
						.subscribe(filter, self.settings.subscribe_qos, id);
				match sent {
					| Ok(()) => false,
					| Err(err) if err.is_permanent() => {
						error!(topic = %filter, error = %err, "Subscription rejected by transport");
						registry.forget(id);
						false
					}
					| Err(err) => {
						debug!(topic = %filter, error = %err, "Transport busy, queueing subscription");
						registry.live = false;
						registry.pending.push_back(pending);
						true
					}
				}
			}
		};
		if queued {
			self.flush();
		}
		id
	}

	fn add_message_callback(&self, callback: MessageCallback) {
		lock(&self.registry).global.push(callback);
	}

	/// Stops all traffic and fails every publish still waiting for the broker.
	fn shut_down(&self) {
		*lock(&self.state) = ConnectionState::Closed;
		{
			let mut registry = lock(&self.registry);
			registry.live = false;
			registry.pending.clear();
		}
		let abandoned = {
			let mut outbound = lock(&self.outbound);
			outbound.live = false;
			outbound.closed = true;
			let queued = outbound.pending.drain(..).map(|p| p.completer);
			let mut abandoned: Vec<_> = queued.collect();
			abandoned.extend(outbound.in_flight.drain().map(|(_, c)| c));
			abandoned
		};
		if !abandoned.is_empty() {
			info!(count = abandoned.len(), "Failing publishes left unacknowledged at close");
		}
		for completer in abandoned {
			completer.fail(PublishError::ConnectionClosed);
		}
	}
}

/// MQTT 5 broker connection that hides connectivity from application code.
///
/// Publishes and subscriptions issued before the broker accepted the session
/// (or while it is reconnecting) are queued and flushed in order once it
/// does; after every successful connect the online presence beacon is
/// published. Call [`close`](Self::close) when done: it publishes the
/// offline beacon and releases the session.
///
/// # Example
///
/// ```rust,no_run
/// use broker_link::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), MqttConnectionError> {
///     let config = MqttConnectionConfig::localhost().with_client_id("sensor-1");
///     let connection = Mqtt5Connection::connect(config)?;
///
///     connection.subscribe(
///         "commands/sensor-1/#",
///         Some(callback(|msg| println!("command on {}", msg.topic))),
///     );
///     let handle = connection.publish(Message::new("sensors/sensor-1", "21.5"));
///     let _ = handle.await;
///
///     connection.close().await
/// }
/// ```
pub struct Mqtt5Connection<T: Transport = RumqttTransport> {
	core: Arc<ConnectionCore<T>>,
	event_loop_handle: Option<JoinHandle<()>>,
	closed: bool,
}

impl Mqtt5Connection<RumqttTransport> {
	/// Opens a connection to the broker described by `config`.
	///
	/// Returns immediately; the session is established in the background by
	/// a task spawned on the current Tokio runtime.
	pub fn connect(
		config: MqttConnectionConfig,
	) -> Result<Self, MqttConnectionError> {
		config.validate()?;
		let runtime = tokio::runtime::Handle::try_current()
			.map_err(|_| MqttConnectionError::NoRuntime)?;

		let client_id = config
			.client_id
			.clone()
			.unwrap_or_else(|| Uuid::new_v4().to_string());
		let presence = config
			.presence
			.clone()
			.unwrap_or_else(|| OnlinePresence::for_client(&client_id));

		let (transport, event_loop) =
			RumqttTransport::new(&config, &client_id, &presence)?;
		let core = Arc::new(ConnectionCore::new(
			transport,
			client_id,
			presence,
			config.settings,
		));

		info!(
			client_id = %core.client_id,
			host = %config.transport.host_or_path,
			port = config.transport.port,
			"Connecting to MQTT broker"
		);
		let loop_core = Arc::clone(&core);
		let event_loop_handle = runtime.spawn(async move {
			rumqtt_transport::run(event_loop, loop_core).await;
		});

		Ok(Self {
			core,
			event_loop_handle: Some(event_loop_handle),
			closed: false,
		})
	}
}

impl<T: Transport> Mqtt5Connection<T> {
	/// Builds a connection around an already constructed transport.
	///
	/// The caller drives the transport and reports what happens on the wire
	/// through [`handle_event`](Self::handle_event).
	pub fn with_transport(
		transport: T,
		client_id: impl Into<String>,
		presence: Option<OnlinePresence>,
		settings: ConnectionSettings,
	) -> Result<Self, MqttConnectionError> {
		settings.validate()?;
		let client_id = client_id.into();
		let presence =
			presence.unwrap_or_else(|| OnlinePresence::for_client(&client_id));
		Ok(Self {
			core: Arc::new(ConnectionCore::new(
				transport, client_id, presence, settings,
			)),
			event_loop_handle: None,
			closed: false,
		})
	}

	/// Feeds a transport event into the connection.
	pub fn handle_event(&self, event: TransportEvent) {
		self.core.handle_event(event);
	}

	/// Current lifecycle state
	pub fn state(&self) -> ConnectionState {
		self.core.state()
	}

	/// The transport carrying this connection's requests
	pub fn transport(&self) -> &T {
		self.core.transport()
	}

	/// Online/offline beacons of this client
	pub fn presence(&self) -> &OnlinePresence {
		&self.core.presence
	}

	/// Number of publishes waiting for a connection
	pub fn pending_publish_count(&self) -> usize {
		lock(&self.core.outbound).pending.len()
	}

	/// Number of subscriptions waiting for a connection
	pub fn pending_subscription_count(&self) -> usize {
		lock(&self.core.registry).pending.len()
	}

	/// Number of publishes sent but not yet acknowledged
	pub fn in_flight_count(&self) -> usize {
		lock(&self.core.outbound).in_flight.len()
	}

	/// Gracefully closes the connection by:
	/// 1. Publishing the offline beacon and waiting (bounded) for its
	///    acknowledgement, when connected
	/// 2. Failing every publish still unacknowledged with
	///    [`PublishError::ConnectionClosed`]
	/// 3. Asking the transport to disconnect and waiting (bounded) for the
	///    event loop to finish
	pub async fn close(mut self) -> Result<(), MqttConnectionError> {
		self.closed = true;
		let timeout = self.core.settings.close_timeout;
		let was_connected = self.core.is_connected();

		if was_connected {
			let offline = self.core.publish(self.core.presence.offline().clone());
			match tokio::time::timeout(timeout, offline).await {
				| Ok(Ok(())) => debug!("Offline presence acknowledged"),
				| Ok(Err(err)) => {
					warn!(error = %err, "Offline presence was not delivered")
				}
				| Err(_) => {
					warn!(timeout = ?timeout, "Timed out waiting for offline presence acknowledgement")
				}
			}
		} else {
			info!(client_id = %self.core.client_id, "Not connected, skipping offline presence");
		}

		self.core.shut_down();
		let disconnect = self.core.transport.disconnect();
		if let Err(err) = &disconnect {
			warn!(error = %err, "Failed to disconnect MQTT transport");
		}

		if let Some(mut handle) = self.event_loop_handle.take() {
			if was_connected && disconnect.is_ok() {
				match tokio::time::timeout(timeout, &mut handle).await {
					| Ok(Ok(())) => {}
					| Ok(Err(err)) => warn!(error = %err, "Event loop task failed"),
					| Err(_) => {
						warn!(timeout = ?timeout, "Event loop did not stop in time, aborting it");
						handle.abort();
					}
				}
			} else {
				handle.abort();
			}
		}

		info!(client_id = %self.core.client_id, "MQTT connection closed");
		disconnect.map_err(MqttConnectionError::from)
	}
}

impl<T: Transport> BrokerConnection for Mqtt5Connection<T> {
	fn publish(&self, message: Message) -> PublishHandle {
		self.core.publish(message)
	}

	fn subscribe(
		&self,
		filter: &str,
		callback: Option<MessageCallback>,
	) -> SubscriptionId {
		self.core.subscribe(filter, callback)
	}

	fn add_message_callback(&self, callback: MessageCallback) {
		self.core.add_message_callback(callback);
	}

	fn is_connected(&self) -> bool {
		self.core.is_connected()
	}

	fn client_id(&self) -> &str {
		&self.core.client_id
	}

	fn online_topic(&self) -> Option<&str> {
		Some(self.core.presence.topic())
	}
}

impl<T: Transport> fmt::Debug for Mqtt5Connection<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Mqtt5Connection")
			.field("client_id", &self.core.client_id)
			.field("state", &self.core.state())
			.finish_non_exhaustive()
	}
}

impl<T: Transport> Drop for Mqtt5Connection<T> {
	fn drop(&mut self) {
		if self.closed {
			return;
		}
		error!(
			client_id = %self.core.client_id,
			"Mqtt5Connection dropped without calling close(). Please call \
			 close() and await its completion before dropping."
		);
		self.core.shut_down();
		if let Some(handle) = self.event_loop_handle.take() {
			handle.abort();
		}
	}
}

#[cfg(test)]
mod tests {
	use rumqttc::v5::mqttbytes::QoS;

	use super::*;
	use crate::client::transport::TransportError;

	struct NullTransport;

	impl Transport for NullTransport {
		fn publish(&self, _: &Message) -> Result<PublishToken, TransportError> {
			Ok(PublishToken(0))
		}

		fn subscribe(
			&self,
			_: &str,
			_: QoS,
			_: SubscriptionId,
		) -> Result<(), TransportError> {
			Ok(())
		}

		fn disconnect(&self) -> Result<(), TransportError> {
			Ok(())
		}
	}

	fn core() -> ConnectionCore<NullTransport> {
		ConnectionCore::new(
			NullTransport,
			"core-1".to_string(),
			OnlinePresence::for_client("core-1"),
			ConnectionSettings::default(),
		)
	}

	#[test]
	fn transition_reports_previous_state() {
		let core = core();
		assert_eq!(
			core.transition(ConnectionState::Connected),
			Some(ConnectionState::Connecting)
		);
		assert_eq!(
			core.transition(ConnectionState::Disconnected),
			Some(ConnectionState::Connected)
		);
	}

	#[test]
	fn closed_state_is_final() {
		let core = core();
		core.shut_down();
		for event in [
			TransportEvent::Connected {
				session_present: false,
			},
			TransportEvent::ConnectFailed("refused".to_string()),
			TransportEvent::Disconnected,
		] {
			core.handle_event(event);
			assert_eq!(core.state(), ConnectionState::Closed);
		}
		let mut handle = core.publish(Message::new("a", ""));
		assert_eq!(handle.try_result(), Some(Err(PublishError::ConnectionClosed)));
	}

	#[test]
	fn connect_racing_shut_down_never_reopens() {
		for _ in 0 .. 50 {
			let core = Arc::new(core());
			let events = Arc::clone(&core);
			let driver = std::thread::spawn(move || {
				for _ in 0 .. 100 {
					events.handle_event(TransportEvent::Connected {
						session_present: false,
					});
					events.handle_event(TransportEvent::Disconnected);
				}
			});
			core.shut_down();
			driver.join().unwrap();
			assert_eq!(core.state(), ConnectionState::Closed);
			assert!(!lock(&core.outbound).live);
			assert!(lock(&core.outbound).pending.is_empty());
		}
	}
}
