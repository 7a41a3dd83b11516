use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Counts the live contexts handed out by one [`Handler`].
#[derive(Debug, Default)]
struct Tracker {
	active: AtomicUsize,
	notify: Notify,
}

impl Tracker {
	async fn wait(&self) {
		let notified = self.notify.notified();
		tokio::pin!(notified);
		notified.as_mut().enable();

		if self.active.load(Ordering::Acquire) == 0 {
			return;
		}

		notified.await;
	}
}

#[derive(Debug)]
struct TrackerGuard(Arc<Tracker>);

impl TrackerGuard {
	fn new(tracker: &Arc<Tracker>) -> Self {
		tracker.active.fetch_add(1, Ordering::AcqRel);
		Self(tracker.clone())
	}
}

impl Clone for TrackerGuard {
	fn clone(&self) -> Self {
		Self::new(&self.0)
	}
}

impl Drop for TrackerGuard {
	fn drop(&mut self) {
		if self.0.active.fetch_sub(1, Ordering::AcqRel) == 1 {
			self.0.notify.notify_waiters();
		}
	}
}

/// A cancellation scope passed into long running tasks.
///
/// A context is done once its [`Handler`] (or any ancestor handler) is
/// cancelled or dropped. Holding a context keeps the owning handler's
/// [`Handler::shutdown`] waiting, so tasks should drop theirs when they
/// finish.
#[derive(Debug, Clone)]
pub struct Context {
	token: CancellationToken,
	_guards: Vec<TrackerGuard>,
}

impl Context {
	#[must_use]
	pub fn new() -> (Self, Handler) {
		let handler = Handler::new();
		(handler.context(), handler)
	}

	/// Creates a nested scope. Cancelling the parent cancels the child, the
	/// child's handler only cancels the child.
	#[must_use]
	pub fn child(&self) -> (Self, Handler) {
		let token = self.token.child_token();
		let tracker = Arc::new(Tracker::default());

		let mut guards = self._guards.clone();
		guards.push(TrackerGuard::new(&tracker));

		(
			Self {
				token: token.clone(),
				_guards: guards,
			},
			Handler { token, tracker },
		)
	}

	pub async fn done(&self) {
		self.token.cancelled().await;
	}

	#[must_use]
	pub fn is_done(&self) -> bool {
		self.token.is_cancelled()
	}
}

#[derive(Debug)]
pub struct Handler {
	token: CancellationToken,
	tracker: Arc<Tracker>,
}

impl Default for Handler {
	fn default() -> Self {
		Self::new()
	}
}

impl Handler {
	#[must_use]
	pub fn new() -> Self {
		Self {
			token: CancellationToken::new(),
			tracker: Arc::new(Tracker::default()),
		}
	}

	#[must_use]
	pub fn context(&self) -> Context {
		Context {
			token: self.token.child_token(),
			_guards: vec![TrackerGuard::new(&self.tracker)],
		}
	}

	pub fn cancel(&self) {
		self.token.cancel();
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Cancels every context of this handler and waits until all of them
	/// have been dropped.
	pub async fn shutdown(&self) {
		self.cancel();
		self.tracker.wait().await;
	}
}

impl Drop for Handler {
	fn drop(&mut self) {
		self.token.cancel();
	}
}
