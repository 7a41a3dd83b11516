use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::binding::{room_history_key, RoomName};
use crate::error::SyncError;
use crate::payload::{ClientId, Envelope, Message, MessageId, Post};
use crate::substrate::Cache;

/// Per room list of past messages, newest first.
pub struct HistoryStore<C> {
	cache: Arc<C>,
	retention: Duration,
}

impl<C> Clone for HistoryStore<C> {
	fn clone(&self) -> Self {
		Self {
			cache: self.cache.clone(),
			retention: self.retention,
		}
	}
}

impl<C: Cache> HistoryStore<C> {
	pub fn new(cache: Arc<C>, retention: Duration) -> Self {
		Self { cache, retention }
	}

	/// Never fails: a miss or an unreachable cache both hydrate as empty.
	pub async fn load_history(&self, room: &RoomName) -> Vec<Message> {
		self.load_posts(room).await.into_iter().map(|post| post.message).collect()
	}

	#[tracing::instrument(skip_all, fields(room = %room))]
	pub(crate) async fn load_posts(&self, room: &RoomName) -> Vec<Post> {
		let entries = match self.cache.list_fetch_all(&room_history_key(room)).await {
			Ok(Some(entries)) => entries,
			Ok(None) => {
				debug!("no history");
				return Vec::new();
			}
			Err(err) => {
				warn!(error = %err, "history unavailable, starting empty");
				return Vec::new();
			}
		};

		entries
			.iter()
			.filter_map(|raw| match Envelope::decode(raw).map(Envelope::into_post) {
				Ok(Some(post)) => Some(post),
				Ok(None) => {
					warn!("skipping non-message history entry");
					None
				}
				Err(err) => {
					warn!(error = %err, "skipping undecodable history entry");
					None
				}
			})
			.collect()
	}

	/// Stores a message under a fresh id and returns the id.
	pub async fn append_message(&self, room: &RoomName, message: &Message, origin: ClientId) -> Result<MessageId, SyncError> {
		let id = MessageId::new();
		let post = Post {
			id: Some(id),
			origin: Some(origin),
			message: message.clone(),
		};

		self.append_post(room, &post).await?;

		Ok(id)
	}

	#[tracing::instrument(skip_all, fields(room = %room))]
	pub(crate) async fn append_post(&self, room: &RoomName, post: &Post) -> Result<(), SyncError> {
		let payload = Envelope::post(post).encode()?;

		self.cache
			.list_append_front(&room_history_key(room), payload, self.retention)
			.await?;

		Ok(())
	}
}
