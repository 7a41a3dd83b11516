use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::context::Context;
use tokio::sync::Mutex;
use tracing::{debug, info_span, Instrument};

use crate::binding::RoomName;
use crate::credential::{require_credential, CredentialProvider};
use crate::directory::RoomDirectory;
use crate::error::SyncError;
use crate::feed::LiveFeed;
use crate::history::HistoryStore;
use crate::payload::{ClientId, Message};
use crate::session::{create_room, LobbySession, LobbyWorker, RoomSession, RoomWorker, WeakLobbySession, WeakRoomSession};
use crate::substrate::{Bus, Cache};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SyncOptions {
	/// How long a room's history survives without new messages
	#[serde(with = "humantime_serde")]
	pub history_retention: Duration,
	/// How long the directory survives without new rooms
	#[serde(with = "humantime_serde")]
	pub directory_retention: Duration,
	/// Payloads buffered per topic before a slow session starts losing them
	pub feed_capacity: usize,
}

impl Default for SyncOptions {
	fn default() -> Self {
		Self {
			history_retention: Duration::from_secs(3600),
			directory_retention: Duration::from_secs(3600),
			feed_capacity: 256,
		}
	}
}

/// Entry point of the engine. Owns the live feed and hands out room and
/// lobby sessions, at most one of each per room.
pub struct Synchronizer<B, C> {
	feed: Arc<LiveFeed<B>>,
	history: HistoryStore<C>,
	directory: RoomDirectory<B, C>,
	credentials: Arc<dyn CredentialProvider>,
	origin: ClientId,
	ctx: Context,
	rooms: Mutex<HashMap<RoomName, WeakRoomSession>>,
	lobby: Mutex<Option<WeakLobbySession>>,
}

impl<B: Bus, C: Cache> Synchronizer<B, C> {
	/// Spawns the live feed onto the current runtime. Everything stops once
	/// `ctx` is done.
	pub fn new(ctx: Context, bus: B, cache: C, credentials: Arc<dyn CredentialProvider>, options: SyncOptions) -> Self {
		let feed = Arc::new(LiveFeed::new(Arc::new(bus), options.feed_capacity));
		let cache = Arc::new(cache);

		tokio::spawn({
			let feed = feed.clone();
			let ctx = ctx.clone();
			async move { feed.run(ctx).await }.instrument(info_span!("live_feed"))
		});

		Self {
			history: HistoryStore::new(cache.clone(), options.history_retention),
			directory: RoomDirectory::new(feed.clone(), cache, options.directory_retention),
			feed,
			credentials,
			origin: ClientId::new(),
			ctx,
			rooms: Mutex::default(),
			lobby: Mutex::default(),
		}
	}

	pub fn origin(&self) -> ClientId {
		self.origin
	}

	pub fn feed(&self) -> &Arc<LiveFeed<B>> {
		&self.feed
	}

	pub fn history(&self) -> &HistoryStore<C> {
		&self.history
	}

	pub fn directory(&self) -> &RoomDirectory<B, C> {
		&self.directory
	}

	/// Enters a room, or returns the session already running for it.
	pub async fn enter_room(&self, room: &str) -> Result<RoomSession, SyncError> {
		let room = RoomName::new(room)?;
		require_credential(&*self.credentials)?;

		let mut rooms = self.rooms.lock().await;
		rooms.retain(|_, session| session.is_alive());

		if let Some(session) = rooms.get(&room).and_then(WeakRoomSession::upgrade) {
			debug!(%room, "room session already running");
			return Ok(session);
		}

		let (worker, session) = RoomWorker::new(
			room.clone(),
			self.feed.clone(),
			self.history.clone(),
			self.credentials.clone(),
			self.origin,
		);

		tokio::spawn(worker.run(self.ctx.clone()).instrument(info_span!("room_session", %room)));

		rooms.insert(room, session.downgrade());

		Ok(session)
	}

	/// Enters the landing screen, or returns the lobby already running.
	pub async fn enter_lobby(&self) -> Result<LobbySession, SyncError> {
		require_credential(&*self.credentials)?;

		let mut lobby = self.lobby.lock().await;

		if let Some(session) = lobby.as_ref().and_then(WeakLobbySession::upgrade) {
			debug!("lobby session already running");
			return Ok(session);
		}

		let (worker, session) = LobbyWorker::new(
			self.directory.clone(),
			self.feed.clone(),
			self.credentials.clone(),
			self.origin,
		);

		tokio::spawn(worker.run(self.ctx.clone()).instrument(info_span!("lobby_session")));

		*lobby = Some(session.downgrade());

		Ok(session)
	}

	/// One-shot directory read, outside of any lobby session.
	pub async fn list_rooms(&self) -> Result<Vec<RoomName>, SyncError> {
		require_credential(&*self.credentials)?;
		self.directory.list_rooms().await
	}

	/// One-shot room creation, outside of any lobby session.
	pub async fn create_room(&self, name: Option<&str>) -> Result<RoomName, SyncError> {
		create_room(&self.directory, &*self.credentials, name, self.origin).await
	}

	/// One-shot history read. An unreachable cache reads as empty.
	pub async fn load_history(&self, room: &str) -> Result<Vec<Message>, SyncError> {
		let room = RoomName::new(room)?;
		require_credential(&*self.credentials)?;
		Ok(self.history.load_history(&room).await)
	}
}
