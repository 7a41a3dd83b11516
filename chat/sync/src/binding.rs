//! Maps rooms onto bus topics and cache keys.
//!
//! Everything here is a pure function of the room name, so every client
//! derives the same topic and key for a room without coordination.

use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;

/// Namespace shared by every key this crate writes.
pub const CACHE_NAMESPACE: &str = "chat";
/// Topic on which room creation is announced.
pub const CONTROL_TOPIC: &str = "chat-room-created";
/// Key of the set holding every known room name.
pub const DIRECTORY_KEY: &str = "chat-room-list";

pub const MAX_ROOM_NAME_LENGTH: usize = 64;

const ROOM_TOPIC_SUFFIX: &str = "-chat";

/// A validated, normalized room name.
///
/// Names are trimmed and lowercased so "Helium" and "helium " are the same
/// room. Characters that carry meaning in bus subjects are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomName(String);

impl RoomName {
	pub fn new(raw: impl AsRef<str>) -> Result<Self, SyncError> {
		let raw = raw.as_ref();
		let invalid = |reason| SyncError::InvalidRoom {
			name: raw.to_owned(),
			reason,
		};

		let name = raw.trim().to_lowercase();

		if name.is_empty() {
			return Err(invalid("name is empty"));
		}

		if name.chars().count() > MAX_ROOM_NAME_LENGTH {
			return Err(invalid("name is too long"));
		}

		// Its history key would be the directory set.
		if name == DIRECTORY_KEY {
			return Err(invalid("name is reserved"));
		}

		if name
			.chars()
			.any(|c| c.is_whitespace() || c.is_control() || matches!(c, '.' | '*' | '>'))
		{
			return Err(invalid("name contains reserved characters"));
		}

		Ok(Self(name))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for RoomName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for RoomName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl FromStr for RoomName {
	type Err = SyncError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

impl TryFrom<String> for RoomName {
	type Error = SyncError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl From<RoomName> for String {
	fn from(value: RoomName) -> Self {
		value.0
	}
}

/// What a live feed subscription is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
	Room(RoomName),
	Control,
}

impl fmt::Display for Subject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Room(room) => write!(f, "{room}{ROOM_TOPIC_SUFFIX}"),
			Self::Control => f.write_str(CONTROL_TOPIC),
		}
	}
}

/// A key inside a cache namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
	pub namespace: &'static str,
	pub key: String,
}

impl fmt::Display for CacheKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.namespace, self.key)
	}
}

pub fn room_topic(room: &RoomName) -> String {
	Subject::Room(room.clone()).to_string()
}

pub fn room_history_key(room: &RoomName) -> CacheKey {
	CacheKey {
		namespace: CACHE_NAMESPACE,
		key: room.to_string(),
	}
}

pub fn directory_key() -> CacheKey {
	CacheKey {
		namespace: CACHE_NAMESPACE,
		key: DIRECTORY_KEY.to_owned(),
	}
}
