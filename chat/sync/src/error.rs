use crate::feed::SubscriptionError;
use crate::payload::CodecError;
use crate::substrate::{BusError, CacheError};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("invalid room name {name:?}: {reason}")]
	InvalidRoom { name: String, reason: &'static str },
	#[error("invalid message: {0}")]
	InvalidMessage(&'static str),
	#[error("backend unavailable: {0}")]
	TransientBackend(#[from] BackendError),
	#[error(transparent)]
	Subscription(#[from] SubscriptionError),
	#[error("decode: {0}")]
	Decode(#[from] CodecError),
	#[error("credential expired, re-authentication required")]
	ExpiredCredential,
	#[error("no credential available, authentication required")]
	Unauthenticated,
	#[error("session closed")]
	SessionClosed,
}

impl SyncError {
	/// Credential failures are the only ones surfaced to the user, everything
	/// else degrades silently.
	pub fn requires_reauthentication(&self) -> bool {
		matches!(self, Self::ExpiredCredential | Self::Unauthenticated)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
	#[error("bus: {0}")]
	Bus(#[from] BusError),
	#[error("cache: {0}")]
	Cache(#[from] CacheError),
}

impl From<BusError> for SyncError {
	fn from(err: BusError) -> Self {
		Self::TransientBackend(err.into())
	}
}

impl From<CacheError> for SyncError {
	fn from(err: CacheError) -> Self {
		Self::TransientBackend(err.into())
	}
}
