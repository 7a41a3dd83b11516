//! Wire format for everything published on the bus or stored in the cache.
//!
//! Payloads are json objects tagged by `kind`. Untagged objects in the older
//! `{username, message}` and `{name}` shapes are still accepted on decode.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::binding::RoomName;
use crate::error::SyncError;

pub const MAX_MESSAGE_LENGTH: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
	#[error("json: {0}")]
	Json(#[from] serde_json::Error),
	#[error("payload has no kind")]
	MissingKind,
	#[error("invalid payload: {0}")]
	Invalid(&'static str),
}

/// Identifies one running client, used to recognise its own echoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Ulid);

impl ClientId {
	pub fn new() -> Self {
		Self(Ulid::new())
	}
}

impl Default for ClientId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for ClientId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

/// Unique per sent message, so a message seen both live and in history is
/// only shown once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Ulid);

impl MessageId {
	pub fn new() -> Self {
		Self(Ulid::new())
	}
}

impl Default for MessageId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for MessageId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	pub author: String,
	pub body: String,
}

impl Message {
	/// Trims the body and checks it against the message limits.
	pub fn new(author: impl Into<String>, body: impl AsRef<str>) -> Result<Self, SyncError> {
		let author = author.into();
		let body = body.as_ref().trim();

		if author.trim().is_empty() {
			return Err(SyncError::InvalidMessage("author is empty"));
		}

		if body.is_empty() {
			return Err(SyncError::InvalidMessage("body is empty"));
		}

		if body.chars().count() > MAX_MESSAGE_LENGTH {
			return Err(SyncError::InvalidMessage("body is too long"));
		}

		Ok(Self {
			author,
			body: body.to_owned(),
		})
	}
}

impl std::fmt::Display for Message {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}: {}", self.author, self.body)
	}
}

/// A message together with where it came from. Both are absent on payloads
/// written by older clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
	pub id: Option<MessageId>,
	pub origin: Option<ClientId>,
	pub message: Message,
}

impl Post {
	pub fn new(message: Message, origin: ClientId) -> Self {
		Self {
			id: Some(MessageId::new()),
			origin: Some(origin),
			message,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
	Message {
		author: String,
		body: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		id: Option<MessageId>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		origin: Option<ClientId>,
	},
	RoomCreated {
		name: RoomName,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		origin: Option<ClientId>,
	},
}

#[derive(Deserialize)]
struct LegacyMessage {
	username: String,
	message: String,
}

#[derive(Deserialize)]
struct LegacyRoomCreated {
	name: RoomName,
}

impl Envelope {
	pub fn post(post: &Post) -> Self {
		Self::Message {
			author: post.message.author.clone(),
			body: post.message.body.clone(),
			id: post.id,
			origin: post.origin,
		}
	}

	pub fn room_created(name: &RoomName, origin: ClientId) -> Self {
		Self::RoomCreated {
			name: name.clone(),
			origin: Some(origin),
		}
	}

	pub fn origin(&self) -> Option<ClientId> {
		match self {
			Self::Message { origin, .. } | Self::RoomCreated { origin, .. } => *origin,
		}
	}

	pub fn encode(&self) -> Result<String, CodecError> {
		Ok(serde_json::to_string(self)?)
	}

	pub fn decode(raw: &str) -> Result<Self, CodecError> {
		let value: serde_json::Value = serde_json::from_str(raw)?;

		let envelope = if value.get("kind").is_some() {
			serde_json::from_value(value)?
		} else if let Ok(legacy) = serde_json::from_value::<LegacyMessage>(value.clone()) {
			Self::Message {
				author: legacy.username,
				body: legacy.message,
				id: None,
				origin: None,
			}
		} else if let Ok(legacy) = serde_json::from_value::<LegacyRoomCreated>(value) {
			Self::RoomCreated {
				name: legacy.name,
				origin: None,
			}
		} else {
			return Err(CodecError::MissingKind);
		};

		envelope.validate()?;

		Ok(envelope)
	}

	fn validate(&self) -> Result<(), CodecError> {
		if let Self::Message { author, body, .. } = self {
			if author.trim().is_empty() {
				return Err(CodecError::Invalid("message author is empty"));
			}

			if body.trim().is_empty() {
				return Err(CodecError::Invalid("message body is empty"));
			}
		}

		Ok(())
	}

	pub fn into_post(self) -> Option<Post> {
		match self {
			Self::Message {
				author,
				body,
				id,
				origin,
			} => Some(Post {
				id,
				origin,
				message: Message { author, body },
			}),
			Self::RoomCreated { .. } => None,
		}
	}
}
