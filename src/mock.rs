//! In-memory broker connection for unit tests
//!
//! [`MockConnection`] implements [`BrokerConnection`] without a broker:
//! publishes are recorded and complete immediately, and inbound traffic is
//! injected with [`MockConnection::simulate_message`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::client::completion::PublishHandle;
use crate::connection::{BrokerConnection, MessageCallback, SubscriptionId};
use crate::message::Message;
use crate::topic;

/// Client id reported by every mock connection
pub const MOCK_CLIENT_ID: &str = "mock-client";

struct MockSubscription {
	filter: String,
	callback: Option<MessageCallback>,
}

struct MockState {
	connected: bool,
	// Ordered by id, i.e. by registration order.
	subscriptions: BTreeMap<SubscriptionId, MockSubscription>,
	global: Vec<MessageCallback>,
	published: Vec<Message>,
	next_subscription_id: usize,
}

/// Broker connection stand-in for tests.
///
/// Always connected unless told otherwise with
/// [`set_connected`](Self::set_connected). Unlike the live connection, which
/// routes inbound messages by the subscription identifier the broker echoes,
/// [`simulate_message`](Self::simulate_message) re-matches the topic against
/// each subscription filter and hands the message to the first matching
/// subscription (in registration order) that has a callback.
///
/// All state sits behind one mutex. Callbacks run after it is released, so
/// they may publish or subscribe on the same mock.
pub struct MockConnection {
	state: Mutex<MockState>,
}

impl Default for MockConnection {
	fn default() -> Self {
		Self::new()
	}
}

impl MockConnection {
	/// Creates a connected mock with no subscriptions.
	pub fn new() -> Self {
		debug!("Initialized MockConnection");
		Self {
			state: Mutex::new(MockState {
				connected: true,
				subscriptions: BTreeMap::new(),
				global: Vec::new(),
				published: Vec::new(),
				next_subscription_id: 1,
			}),
		}
	}

	fn state(&self) -> MutexGuard<'_, MockState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Every message published so far, oldest first.
	pub fn published_messages(&self) -> Vec<Message> {
		self.state().published.clone()
	}

	/// Published messages whose topic matches `filter` (wildcards allowed).
	pub fn find_published(&self, filter: &str) -> Vec<Message> {
		self.state()
			.published
			.iter()
			.filter(|msg| topic::matches(&msg.topic, filter))
			.cloned()
			.collect()
	}

	/// Forgets every recorded publish.
	pub fn clear_published_messages(&self) {
		self.state().published.clear();
	}

	/// Overrides the reported connection status.
	pub fn set_connected(&self, connected: bool) -> &Self {
		self.state().connected = connected;
		self
	}

	/// Removes a subscription; unknown ids are ignored.
	pub fn unsubscribe(&self, id: SubscriptionId) {
		self.state().subscriptions.remove(&id);
	}

	/// Number of active subscriptions
	pub fn subscription_count(&self) -> usize {
		self.state().subscriptions.len()
	}

	/// Delivers `message` as if it came from the broker.
	///
	/// The first subscription whose filter matches the topic and that has a
	/// callback receives a copy stamped with its id, and nothing else is
	/// called. Otherwise every global callback receives the message
	/// unchanged, in registration order.
	pub fn simulate_message(&self, message: Message) {
		debug!(topic = %message.topic, "Simulating incoming message");
		let specific = {
			let state = self.state();
			state.subscriptions.iter().find_map(|(id, sub)| {
				let callback = sub.callback.as_ref()?;
				topic::matches(&message.topic, &sub.filter)
					.then(|| (*id, Arc::clone(callback)))
			})
		};
		if let Some((id, callback)) = specific {
			callback(&message.with_subscription_id(id));
			return;
		}

		debug!(topic = %message.topic, "No subscription-specific callback matched, calling general callbacks");
		let global = self.state().global.clone();
		for callback in global {
			callback(&message);
		}
	}
}

impl BrokerConnection for MockConnection {
	fn publish(&self, message: Message) -> PublishHandle {
		debug!(topic = %message.topic, "Publishing message");
		self.state().published.push(message);
		PublishHandle::ready(Ok(()))
	}

	fn subscribe(
		&self,
		filter: &str,
		callback: Option<MessageCallback>,
	) -> SubscriptionId {
		debug!(topic = %filter, "Subscribe to topic");
		let mut state = self.state();
		let id = SubscriptionId(state.next_subscription_id);
		state.next_subscription_id += 1;
		state.subscriptions.insert(
			id,
			MockSubscription {
				filter: filter.to_string(),
				callback,
			},
		);
		id
	}

	fn add_message_callback(&self, callback: MessageCallback) {
		self.state().global.push(callback);
	}

	fn is_connected(&self) -> bool {
		self.state().connected
	}

	fn client_id(&self) -> &str {
		MOCK_CLIENT_ID
	}

	fn online_topic(&self) -> Option<&str> {
		None
	}
}
