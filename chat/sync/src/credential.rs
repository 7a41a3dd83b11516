use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::error::SyncError;

/// A bearer token and the identity it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Credential {
	pub token: String,
	pub display_name: String,
	pub expires_at: DateTime<Utc>,
}

impl Credential {
	pub fn new(token: impl Into<String>, display_name: impl Into<String>, lifetime: Duration) -> Self {
		let lifetime = chrono::Duration::from_std(lifetime).unwrap_or_else(|_| chrono::Duration::days(36_500));

		Self {
			token: token.into(),
			display_name: display_name.into(),
			expires_at: Utc::now().checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC),
		}
	}

	pub fn is_expired(&self) -> bool {
		self.is_expired_at(Utc::now())
	}

	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		self.expires_at <= now
	}
}

/// Supplies the current credential to sessions.
///
/// Implementations must tolerate concurrent reads while the credential is
/// being replaced.
pub trait CredentialProvider: Send + Sync + 'static {
	fn credential(&self) -> Option<Arc<Credential>>;

	/// Called once an outbound call was refused because the credential
	/// expired.
	fn on_credential_expired(&self) {}
}

/// Holds the credential in a lock free slot and lets the embedding
/// application watch for expiry.
#[derive(Debug)]
pub struct CredentialHolder {
	current: ArcSwapOption<Credential>,
	expired: watch::Sender<bool>,
}

impl Default for CredentialHolder {
	fn default() -> Self {
		Self::new(None)
	}
}

impl CredentialHolder {
	pub fn new(credential: Option<Credential>) -> Self {
		Self {
			current: ArcSwapOption::from(credential.map(Arc::new)),
			expired: watch::channel(false).0,
		}
	}

	/// Installs a fresh credential, for example after re-authentication.
	pub fn set(&self, credential: Credential) {
		self.current.store(Some(Arc::new(credential)));
		self.expired.send_replace(false);
	}

	pub fn clear(&self) {
		self.current.store(None);
	}

	/// Flips to `true` whenever a session reports an expired credential.
	pub fn watch_expired(&self) -> watch::Receiver<bool> {
		self.expired.subscribe()
	}
}

impl CredentialProvider for CredentialHolder {
	fn credential(&self) -> Option<Arc<Credential>> {
		self.current.load_full()
	}

	fn on_credential_expired(&self) {
		tracing::warn!("credential expired, re-authentication required");
		self.expired.send_replace(true);
	}
}

/// Checked before every outbound call.
pub(crate) fn require_credential(provider: &dyn CredentialProvider) -> Result<Arc<Credential>, SyncError> {
	let credential = provider.credential().ok_or(SyncError::Unauthenticated)?;

	if credential.is_expired() {
		provider.on_credential_expired();
		return Err(SyncError::ExpiredCredential);
	}

	Ok(credential)
}
