use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::binding::{directory_key, RoomName, Subject};
use crate::error::SyncError;
use crate::feed::LiveFeed;
use crate::payload::{ClientId, Envelope};
use crate::substrate::{Bus, Cache};

/// The set of known rooms, kept in the cache and announced on the control
/// topic.
pub struct RoomDirectory<B, C> {
	feed: Arc<LiveFeed<B>>,
	cache: Arc<C>,
	retention: Duration,
}

impl<B, C> Clone for RoomDirectory<B, C> {
	fn clone(&self) -> Self {
		Self {
			feed: self.feed.clone(),
			cache: self.cache.clone(),
			retention: self.retention,
		}
	}
}

impl<B: Bus, C: Cache> RoomDirectory<B, C> {
	pub fn new(feed: Arc<LiveFeed<B>>, cache: Arc<C>, retention: Duration) -> Self {
		Self { feed, cache, retention }
	}

	/// Sorted and deduplicated. A miss is an empty directory.
	#[tracing::instrument(skip(self))]
	pub async fn list_rooms(&self) -> Result<Vec<RoomName>, SyncError> {
		let Some(members) = self.cache.set_fetch(&directory_key()).await? else {
			debug!("directory is empty");
			return Ok(Vec::new());
		};

		let rooms = members
			.into_iter()
			.filter_map(|member| match RoomName::new(&member) {
				Ok(room) => Some(room),
				Err(err) => {
					warn!(error = %err, "skipping invalid directory entry");
					None
				}
			})
			.collect::<BTreeSet<_>>();

		Ok(rooms.into_iter().collect())
	}

	/// Writes the room to the directory, then tells everyone to re-read it.
	#[tracing::instrument(skip_all, fields(room = %room))]
	pub async fn announce_room_created(&self, room: &RoomName, origin: ClientId) -> Result<(), SyncError> {
		if let Err(err) = self.cache.set_add(&directory_key(), room.to_string(), self.retention).await {
			warn!(error = %err, "failed to record room in directory");
		}

		let payload = Envelope::room_created(room, origin).encode()?;
		self.feed.publish(&Subject::Control, payload).await?;

		Ok(())
	}
}
