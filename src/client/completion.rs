//! Publish completion handles
//!
//! Every publish hands the caller a [`PublishHandle`] and keeps the matching
//! [`PublishCompleter`] until the broker acknowledges the message. The
//! completer is consumed when it fires, so a handle can never be fulfilled
//! twice.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::oneshot;

/// Why a publish did not complete successfully
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
	/// Dropped by the pre-connection queue policy
	#[error("Publish dropped: pending queue is full")]
	QueueOverflow,

	/// The connection was closed before the broker acknowledged the message
	#[error("Connection closed before the publish was acknowledged")]
	ConnectionClosed,

	/// The message can never be sent, e.g. its topic is malformed
	#[error("Publish rejected: {0}")]
	Rejected(String),

	/// The completer was dropped without a result
	#[error("Publish abandoned without a result")]
	Abandoned,
}

/// Outcome carried by a [`PublishHandle`]
pub type PublishResult = Result<(), PublishError>;

/// Caller side of a publish: resolves once the broker acknowledged it.
///
/// Can be awaited, polled with [`try_result`](Self::try_result), or waited
/// on from a plain thread with [`blocking_wait`](Self::blocking_wait). A
/// handle whose acknowledgement never arrives stays pending; wrap it in
/// `tokio::time::timeout` if you need an upper bound.
#[derive(Debug)]
pub struct PublishHandle {
	rx: oneshot::Receiver<PublishResult>,
}

/// Connection side of a publish.
#[derive(Debug)]
pub struct PublishCompleter {
	tx: oneshot::Sender<PublishResult>,
}

/// Creates a connected completer/handle pair.
pub fn publish_completion() -> (PublishCompleter, PublishHandle) {
	let (tx, rx) = oneshot::channel();
	(PublishCompleter { tx }, PublishHandle { rx })
}

impl PublishCompleter {
	/// Resolves the handle successfully.
	pub fn succeed(self) {
		self.complete(Ok(()));
	}

	/// Resolves the handle with an error.
	pub fn fail(self, error: PublishError) {
		self.complete(Err(error));
	}

	fn complete(self, result: PublishResult) {
		// The caller may have dropped its handle; nothing to report then.
		let _ = self.tx.send(result);
	}
}

impl PublishHandle {
	/// Handle that is already resolved with `result`.
	pub fn ready(result: PublishResult) -> Self {
		let (completer, handle) = publish_completion();
		completer.complete(result);
		handle
	}

	/// Handle that already failed with `error`.
	pub fn failed(error: PublishError) -> Self {
		Self::ready(Err(error))
	}

	/// Result if the publish has already completed, `None` while pending.
	///
	/// The result is handed out once; later calls report `Abandoned`.
	pub fn try_result(&mut self) -> Option<PublishResult> {
		match self.rx.try_recv() {
			| Ok(result) => Some(result),
			| Err(oneshot::error::TryRecvError::Empty) => None,
			| Err(oneshot::error::TryRecvError::Closed) => {
				Some(Err(PublishError::Abandoned))
			}
		}
	}

	/// Blocks the current thread until the publish completes.
	///
	/// # Panics
	///
	/// Panics when called from within an asynchronous execution context;
	/// `.await` the handle there instead.
	pub fn blocking_wait(self) -> PublishResult {
		self.rx
			.blocking_recv()
			.unwrap_or(Err(PublishError::Abandoned))
	}
}

impl Future for PublishHandle {
	type Output = PublishResult;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx)
			.poll(cx)
			.map(|res| res.unwrap_or(Err(PublishError::Abandoned)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn handle_resolves_when_completer_succeeds() {
		let (completer, handle) = publish_completion();
		completer.succeed();
		assert_eq!(handle.await, Ok(()));
	}

	#[test]
	fn pending_handle_reports_none() {
		let (_completer, mut handle) = publish_completion();
		assert_eq!(handle.try_result(), None);
	}

	#[test]
	fn dropped_completer_abandons_handle() {
		let (completer, mut handle) = publish_completion();
		drop(completer);
		assert_eq!(handle.try_result(), Some(Err(PublishError::Abandoned)));
	}

	#[test]
	fn ready_handle_is_resolved_immediately() {
		let mut handle = PublishHandle::ready(Ok(()));
		assert_eq!(handle.try_result(), Some(Ok(())));
		let handle = PublishHandle::failed(PublishError::QueueOverflow);
		assert_eq!(handle.blocking_wait(), Err(PublishError::QueueOverflow));
	}

	#[test]
	fn blocking_wait_from_another_thread() {
		let (completer, handle) = publish_completion();
		let waiter = std::thread::spawn(move || handle.blocking_wait());
		completer.fail(PublishError::ConnectionClosed);
		assert_eq!(waiter.join().unwrap(), Err(PublishError::ConnectionClosed));
	}
}
