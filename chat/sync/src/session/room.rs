use std::collections::HashSet;
use std::sync::Arc;

use common::context::Context;
use tokio::select;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn, Instrument};

use super::{next_item, SessionState};
use crate::binding::{RoomName, Subject};
use crate::credential::{require_credential, CredentialProvider};
use crate::error::SyncError;
use crate::feed::{FeedItem, LiveFeed};
use crate::history::HistoryStore;
use crate::payload::{ClientId, Envelope, Message, MessageId, Post};
use crate::substrate::{Bus, Cache};

/// What an observer of a room sees. Messages are newest first.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RoomView {
	pub room: RoomName,
	pub state: SessionState,
	pub messages: Vec<Message>,
}

#[derive(Debug)]
pub(crate) enum RoomCommand {
	Send {
		body: String,
		reply: oneshot::Sender<Result<Message, SyncError>>,
	},
	Leave,
}

/// Handle on a running room session.
///
/// Clones share the session. It ends on [`RoomSession::leave`], on
/// cancellation, or once every handle is dropped.
#[derive(Debug, Clone)]
pub struct RoomSession {
	room: RoomName,
	commands: mpsc::UnboundedSender<RoomCommand>,
	view: watch::Receiver<RoomView>,
}

impl RoomSession {
	pub fn room(&self) -> &RoomName {
		&self.room
	}

	pub fn view(&self) -> watch::Receiver<RoomView> {
		self.view.clone()
	}

	pub fn snapshot(&self) -> RoomView {
		self.view.borrow().clone()
	}

	pub fn state(&self) -> SessionState {
		self.view.borrow().state
	}

	/// Publishes a message as the current credential's display name. The
	/// message is in the view once this returns, even if publishing failed.
	pub async fn send(&self, body: impl Into<String>) -> Result<Message, SyncError> {
		let (reply, rx) = oneshot::channel();

		self.commands
			.send(RoomCommand::Send { body: body.into(), reply })
			.map_err(|_| SyncError::SessionClosed)?;

		rx.await.map_err(|_| SyncError::SessionClosed)?
	}

	pub fn leave(&self) {
		self.commands.send(RoomCommand::Leave).ok();
	}

	/// Waits for the session to end and returns how it ended.
	pub async fn closed(&self) -> SessionState {
		let mut view = self.view.clone();
		let state = match view.wait_for(|view| view.state.is_terminal()).await {
			Ok(view) => view.state,
			Err(_) => SessionState::Closed,
		};
		state
	}

	pub(crate) fn downgrade(&self) -> WeakRoomSession {
		WeakRoomSession {
			room: self.room.clone(),
			commands: self.commands.downgrade(),
			view: self.view.clone(),
		}
	}
}

/// Registry entry that does not keep the session alive.
#[derive(Debug)]
pub(crate) struct WeakRoomSession {
	room: RoomName,
	commands: mpsc::WeakUnboundedSender<RoomCommand>,
	view: watch::Receiver<RoomView>,
}

impl WeakRoomSession {
	pub(crate) fn upgrade(&self) -> Option<RoomSession> {
		if self.view.borrow().state.is_terminal() {
			return None;
		}

		Some(RoomSession {
			room: self.room.clone(),
			commands: self.commands.upgrade()?,
			view: self.view.clone(),
		})
	}

	pub(crate) fn is_alive(&self) -> bool {
		self.upgrade().is_some()
	}
}

pub(crate) struct RoomWorker<B, C> {
	room: RoomName,
	feed: Arc<LiveFeed<B>>,
	history: HistoryStore<C>,
	credentials: Arc<dyn CredentialProvider>,
	origin: ClientId,
	view: watch::Sender<RoomView>,
	commands: mpsc::UnboundedReceiver<RoomCommand>,
}

impl<B: Bus, C: Cache> RoomWorker<B, C> {
	pub(crate) fn new(
		room: RoomName,
		feed: Arc<LiveFeed<B>>,
		history: HistoryStore<C>,
		credentials: Arc<dyn CredentialProvider>,
		origin: ClientId,
	) -> (Self, RoomSession) {
		let (commands_tx, commands) = mpsc::unbounded_channel();
		let (view, view_rx) = watch::channel(RoomView {
			room: room.clone(),
			state: SessionState::Unbound,
			messages: Vec::new(),
		});

		let session = RoomSession {
			room: room.clone(),
			commands: commands_tx,
			view: view_rx,
		};

		let worker = Self {
			room,
			feed,
			history,
			credentials,
			origin,
			view,
			commands,
		};

		(worker, session)
	}

	pub(crate) async fn run(mut self, ctx: Context) -> SessionState {
		info!("entering room");

		if let Err(err) = require_credential(&*self.credentials) {
			warn!(error = %err, "cannot enter room");
			return self.finish(SessionState::Expired);
		}

		self.set_state(SessionState::Binding);

		// Subscribe before reading history so nothing published in between is
		// missed.
		let mut subscription = match self.feed.subscribe(&Subject::Room(self.room.clone())).await {
			Ok(subscription) => Some(subscription),
			Err(err) => {
				warn!(error = %err, "live feed unavailable, continuing with history only");
				None
			}
		};

		self.set_state(SessionState::Hydrating);

		let hydration = {
			let history = self.history.clone();
			let room = self.room.clone();
			async move { history.load_posts(&room).await }
		};
		tokio::pin!(hydration);

		let (outbox, outgoing) = mpsc::unbounded_channel();
		tokio::spawn(deliver(self.room.clone(), self.feed.clone(), self.history.clone(), outgoing).in_current_span());

		let mut hydrated = false;
		// Live arrivals and local sends, oldest first, waiting for history.
		let mut queue = Vec::new();
		// Ids that came from history, so a late live copy is not shown twice.
		let mut seen = HashSet::new();

		let state = loop {
			select! {
				_ = ctx.done() => break SessionState::Closed,
				history = &mut hydration, if !hydrated => {
					hydrated = true;
					seen = self.hydrate(history, &mut queue);
				}
				item = next_item(&mut subscription) => match item {
					Some(FeedItem::Payload(raw)) => self.on_payload(&raw, hydrated, &mut queue, &mut seen),
					Some(FeedItem::Error(err)) => warn!(error = %err, "live feed error"),
					None => {
						warn!("live feed closed, no further live messages");
						subscription = None;
					}
				},
				command = self.commands.recv() => match command {
					Some(RoomCommand::Send { body, reply }) => match self.post(&body) {
						Ok(post) => {
							self.prepend(post.message.clone());
							if !hydrated {
								queue.push(post.clone());
							}

							outbox.send(Outgoing { post, reply }).ok();
						}
						Err(err) => {
							let expired = err.requires_reauthentication();
							reply.send(Err(err)).ok();

							if expired {
								break SessionState::Expired;
							}
						}
					},
					Some(RoomCommand::Leave) | None => break SessionState::Closed,
				},
			}
		};

		drop(subscription);
		self.finish(state)
	}

	/// Puts the queue on top of the history, dropping history entries that
	/// are already queued. Returns the ids shown from history.
	fn hydrate(&self, history: Vec<Post>, queue: &mut Vec<Post>) -> HashSet<MessageId> {
		let queued = queue.iter().filter_map(|post| post.id).collect::<HashSet<_>>();
		let history = history
			.into_iter()
			.filter(|post| post.id.map_or(true, |id| !queued.contains(&id)))
			.collect::<Vec<_>>();

		debug!(history = history.len(), queued = queue.len(), "hydration settled");

		let seen = history.iter().filter_map(|post| post.id).collect();
		let messages = queue
			.drain(..)
			.rev()
			.chain(history)
			.map(|post| post.message)
			.collect();

		self.view.send_modify(|view| {
			view.messages = messages;
			view.state = SessionState::Live;
		});

		seen
	}

	fn on_payload(&self, raw: &str, hydrated: bool, queue: &mut Vec<Post>, seen: &mut HashSet<MessageId>) {
		let post = match Envelope::decode(raw).map(Envelope::into_post) {
			Ok(Some(post)) => post,
			Ok(None) => {
				debug!("ignoring non-message payload");
				return;
			}
			Err(err) => {
				warn!(error = %err, "dropping undecodable payload");
				return;
			}
		};

		if post.origin == Some(self.origin) {
			trace!("dropping echo of own message");
			return;
		}

		if post.id.is_some_and(|id| seen.remove(&id)) {
			trace!("dropping live copy of a hydrated message");
			return;
		}

		if hydrated {
			self.prepend(post.message);
		} else {
			queue.push(post);
		}
	}

	fn post(&self, body: &str) -> Result<Post, SyncError> {
		let credential = require_credential(&*self.credentials)?;
		let message = Message::new(credential.display_name.as_str(), body)?;

		Ok(Post::new(message, self.origin))
	}

	fn prepend(&self, message: Message) {
		self.view.send_modify(|view| view.messages.insert(0, message));
	}

	fn set_state(&self, state: SessionState) {
		self.view.send_modify(|view| view.state = state);
	}

	fn finish(self, state: SessionState) -> SessionState {
		info!(?state, "left room");
		self.set_state(state);
		state
	}
}

struct Outgoing {
	post: Post,
	reply: oneshot::Sender<Result<Message, SyncError>>,
}

/// Publishes, then persists, each local send in the order they were made.
/// Runs beside the session so a slow bus never holds up its loop. Drains
/// what is left once the session ends.
async fn deliver<B: Bus, C: Cache>(
	room: RoomName,
	feed: Arc<LiveFeed<B>>,
	history: HistoryStore<C>,
	mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
) {
	let subject = Subject::Room(room.clone());

	while let Some(Outgoing { post, reply }) = outgoing.recv().await {
		let published = match Envelope::post(&post).encode() {
			Ok(payload) => feed.publish(&subject, payload).await.map_err(SyncError::from),
			Err(err) => Err(err.into()),
		};

		if let Err(err) = &published {
			warn!(error = %err, "failed to publish message");
		}

		reply.send(published.map(|()| post.message.clone())).ok();

		if let Err(err) = history.append_post(&room, &post).await {
			warn!(error = %err, "failed to persist message");
		}
	}
}
