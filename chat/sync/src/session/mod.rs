use std::future::Future;

use crate::feed::{FeedItem, Subscription};

mod lobby;
mod room;

pub use lobby::{DirectoryView, LobbySession};
pub(crate) use lobby::{create_room, LobbyWorker, WeakLobbySession};
pub use room::{RoomSession, RoomView};
pub(crate) use room::{RoomWorker, WeakRoomSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	Unbound,
	Binding,
	Hydrating,
	Live,
	Closed,
	Expired,
}

impl SessionState {
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Closed | Self::Expired)
	}
}

/// Next live item, or never if there is no subscription.
async fn next_item(subscription: &mut Option<Subscription>) -> Option<FeedItem> {
	match subscription {
		Some(subscription) => subscription.recv().await,
		None => std::future::pending().await,
	}
}

/// Polls a pending future, or never if there is none.
async fn poll_pending<F: Future + Unpin>(pending: &mut Option<F>) -> F::Output {
	match pending {
		Some(future) => future.await,
		None => std::future::pending().await,
	}
}
