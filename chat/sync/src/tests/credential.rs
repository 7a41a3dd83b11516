use std::time::Duration;

use chrono::Utc;

use crate::credential::{require_credential, Credential, CredentialHolder, CredentialProvider};
use crate::error::SyncError;

#[test]
fn test_credential_expiry() {
	let credential = Credential::new("token", "fox", Duration::from_secs(60));

	assert!(!credential.is_expired());
	assert!(credential.is_expired_at(Utc::now() + chrono::Duration::seconds(61)));
	assert!(Credential::new("token", "fox", Duration::ZERO).is_expired());
}

#[test]
fn test_missing_credential() {
	let holder = CredentialHolder::default();

	assert!(matches!(require_credential(&holder), Err(SyncError::Unauthenticated)));
	assert!(!*holder.watch_expired().borrow());
}

#[test]
fn test_expired_credential_notifies_holder() {
	let holder = CredentialHolder::new(Some(Credential::new("token", "fox", Duration::ZERO)));
	let expired = holder.watch_expired();

	let err = require_credential(&holder).unwrap_err();
	assert!(matches!(err, SyncError::ExpiredCredential));
	assert!(err.requires_reauthentication());
	assert!(*expired.borrow());

	holder.set(Credential::new("fresh", "fox", Duration::from_secs(60)));
	assert!(!*expired.borrow());
	assert_eq!(require_credential(&holder).unwrap().token, "fresh");

	holder.clear();
	assert!(holder.credential().is_none());
}
