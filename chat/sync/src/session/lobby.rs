use std::sync::Arc;

use common::context::Context;
use futures::future::BoxFuture;
use tokio::select;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::{next_item, poll_pending, SessionState};
use crate::binding::{RoomName, Subject};
use crate::credential::{require_credential, CredentialProvider};
use crate::directory::RoomDirectory;
use crate::error::SyncError;
use crate::feed::{FeedItem, LiveFeed};
use crate::payload::{ClientId, Envelope};
use crate::substrate::{Bus, Cache};

/// The landing screen's view of the directory, sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DirectoryView {
	pub state: SessionState,
	pub rooms: Vec<RoomName>,
}

#[derive(Debug)]
pub(crate) enum LobbyCommand {
	Create {
		name: Option<String>,
		reply: oneshot::Sender<Result<RoomName, SyncError>>,
	},
	Refresh,
	Leave,
}

#[derive(Debug, Clone)]
pub struct LobbySession {
	commands: mpsc::UnboundedSender<LobbyCommand>,
	view: watch::Receiver<DirectoryView>,
}

impl LobbySession {
	pub fn view(&self) -> watch::Receiver<DirectoryView> {
		self.view.clone()
	}

	pub fn snapshot(&self) -> DirectoryView {
		self.view.borrow().clone()
	}

	pub fn state(&self) -> SessionState {
		self.view.borrow().state
	}

	/// Creates a room, named after a random element when `name` is `None`.
	pub async fn create_room(&self, name: Option<&str>) -> Result<RoomName, SyncError> {
		let (reply, rx) = oneshot::channel();

		self.commands
			.send(LobbyCommand::Create {
				name: name.map(str::to_owned),
				reply,
			})
			.map_err(|_| SyncError::SessionClosed)?;

		rx.await.map_err(|_| SyncError::SessionClosed)?
	}

	/// Re-reads the directory without waiting for a creation event.
	pub fn refresh(&self) {
		self.commands.send(LobbyCommand::Refresh).ok();
	}

	pub fn leave(&self) {
		self.commands.send(LobbyCommand::Leave).ok();
	}

	pub async fn closed(&self) -> SessionState {
		let mut view = self.view.clone();
		let state = match view.wait_for(|view| view.state.is_terminal()).await {
			Ok(view) => view.state,
			Err(_) => SessionState::Closed,
		};
		state
	}

	pub(crate) fn downgrade(&self) -> WeakLobbySession {
		WeakLobbySession {
			commands: self.commands.downgrade(),
			view: self.view.clone(),
		}
	}
}

#[derive(Debug)]
pub(crate) struct WeakLobbySession {
	commands: mpsc::WeakUnboundedSender<LobbyCommand>,
	view: watch::Receiver<DirectoryView>,
}

impl WeakLobbySession {
	pub(crate) fn upgrade(&self) -> Option<LobbySession> {
		if self.view.borrow().state.is_terminal() {
			return None;
		}

		Some(LobbySession {
			commands: self.commands.upgrade()?,
			view: self.view.clone(),
		})
	}
}

type Reconcile = BoxFuture<'static, Result<Vec<RoomName>, SyncError>>;

pub(crate) struct LobbyWorker<B, C> {
	directory: RoomDirectory<B, C>,
	feed: Arc<LiveFeed<B>>,
	credentials: Arc<dyn CredentialProvider>,
	origin: ClientId,
	view: watch::Sender<DirectoryView>,
	commands: mpsc::UnboundedReceiver<LobbyCommand>,
}

impl<B: Bus, C: Cache> LobbyWorker<B, C> {
	pub(crate) fn new(
		directory: RoomDirectory<B, C>,
		feed: Arc<LiveFeed<B>>,
		credentials: Arc<dyn CredentialProvider>,
		origin: ClientId,
	) -> (Self, LobbySession) {
		let (commands_tx, commands) = mpsc::unbounded_channel();
		let (view, view_rx) = watch::channel(DirectoryView {
			state: SessionState::Unbound,
			rooms: Vec::new(),
		});

		let worker = Self {
			directory,
			feed,
			credentials,
			origin,
			view,
			commands,
		};

		let session = LobbySession {
			commands: commands_tx,
			view: view_rx,
		};

		(worker, session)
	}

	pub(crate) async fn run(mut self, ctx: Context) -> SessionState {
		info!("entering lobby");

		if let Err(err) = require_credential(&*self.credentials) {
			warn!(error = %err, "cannot enter lobby");
			return self.finish(SessionState::Expired);
		}

		self.set_state(SessionState::Binding);

		let mut subscription = match self.feed.subscribe(&Subject::Control).await {
			Ok(subscription) => Some(subscription),
			Err(err) => {
				warn!(error = %err, "control feed unavailable, directory will not update live");
				None
			}
		};

		self.set_state(SessionState::Hydrating);

		let mut reconciling = None;
		// A creation event arrived while a read was already in flight.
		let mut stale = false;

		if let Err(err) = self.schedule(&mut reconciling, &mut stale) {
			warn!(error = %err, "cannot read directory");
			return self.finish(SessionState::Expired);
		}

		let state = loop {
			select! {
				_ = ctx.done() => break SessionState::Closed,
				result = poll_pending(&mut reconciling) => {
					reconciling = None;
					self.apply(result);

					if std::mem::take(&mut stale) && self.schedule(&mut reconciling, &mut stale).is_err() {
						break SessionState::Expired;
					}
				}
				item = next_item(&mut subscription) => match item {
					Some(FeedItem::Payload(raw)) => {
						if let Err(err) = Envelope::decode(&raw) {
							debug!(error = %err, "undecodable control payload, reconciling anyway");
						}

						if self.schedule(&mut reconciling, &mut stale).is_err() {
							break SessionState::Expired;
						}
					}
					Some(FeedItem::Error(err)) => warn!(error = %err, "control feed error"),
					None => {
						warn!("control feed closed, directory will not update live");
						subscription = None;
					}
				},
				command = self.commands.recv() => match command {
					Some(LobbyCommand::Create { name, reply }) => {
						let result = self.create(name).await;
						let expired = matches!(&result, Err(err) if err.requires_reauthentication());
						reply.send(result).ok();

						if expired {
							break SessionState::Expired;
						}
					}
					Some(LobbyCommand::Refresh) => {
						if self.schedule(&mut reconciling, &mut stale).is_err() {
							break SessionState::Expired;
						}
					}
					Some(LobbyCommand::Leave) | None => break SessionState::Closed,
				},
			}
		};

		drop(subscription);
		self.finish(state)
	}

	/// Starts a full read of the directory, or marks the running one stale so
	/// it is repeated once it lands.
	fn schedule(&self, reconciling: &mut Option<Reconcile>, stale: &mut bool) -> Result<(), SyncError> {
		if reconciling.is_some() {
			*stale = true;
			return Ok(());
		}

		require_credential(&*self.credentials)?;

		let directory = self.directory.clone();
		*reconciling = Some(Box::pin(async move { directory.list_rooms().await }));

		Ok(())
	}

	fn apply(&self, result: Result<Vec<RoomName>, SyncError>) {
		match result {
			Ok(rooms) => {
				debug!(rooms = rooms.len(), "directory reconciled");
				self.view.send_modify(|view| {
					view.rooms = rooms;
					view.state = SessionState::Live;
				});
			}
			Err(err) => {
				warn!(error = %err, "directory unavailable, keeping last snapshot");
				self.set_state(SessionState::Live);
			}
		}
	}

	async fn create(&self, name: Option<String>) -> Result<RoomName, SyncError> {
		create_room(&self.directory, &*self.credentials, name.as_deref(), self.origin).await
	}

	fn set_state(&self, state: SessionState) {
		self.view.send_modify(|view| view.state = state);
	}

	fn finish(self, state: SessionState) -> SessionState {
		info!(?state, "left lobby");
		self.set_state(state);
		state
	}
}

pub(crate) async fn create_room<B: Bus, C: Cache>(
	directory: &RoomDirectory<B, C>,
	credentials: &dyn CredentialProvider,
	name: Option<&str>,
	origin: ClientId,
) -> Result<RoomName, SyncError> {
	let room = match name {
		Some(name) => RoomName::new(name)?,
		None => RoomName::new(crate::names::random_element())?,
	};

	require_credential(credentials)?;
	directory.announce_room_created(&room, origin).await?;

	info!(%room, "room created");

	Ok(room)
}
