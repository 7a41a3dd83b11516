#![forbid(unsafe_code)]

pub mod binding;
pub mod credential;
pub mod directory;
pub mod error;
pub mod feed;
pub mod history;
pub mod names;
pub mod payload;
pub mod session;
pub mod substrate;
pub mod synchronizer;

pub use binding::{RoomName, Subject};
pub use credential::{Credential, CredentialHolder, CredentialProvider};
pub use error::SyncError;
pub use payload::{ClientId, Envelope, Message, MessageId, Post};
pub use session::{DirectoryView, LobbySession, RoomSession, RoomView, SessionState};
pub use synchronizer::{SyncOptions, Synchronizer};

#[cfg(test)]
mod tests;
