use std::sync::Arc;
use std::time::Duration;

use common::context::Context;

use crate::credential::{Credential, CredentialHolder};
use crate::session::{DirectoryView, LobbySession, RoomSession, RoomView};
use crate::substrate::memory::{MemoryBus, MemoryCache};
use crate::synchronizer::{SyncOptions, Synchronizer};

mod credential;
mod directory;
mod feed;
mod history;
mod memory;

pub const TIMEOUT: Duration = Duration::from_secs(3);

pub type TestSync = Synchronizer<MemoryBus, MemoryCache>;

/// One client of the shared in-memory bus and cache.
pub fn client(ctx: &Context, bus: &MemoryBus, cache: &MemoryCache, name: &str) -> (TestSync, Arc<CredentialHolder>) {
	let credentials = Arc::new(CredentialHolder::new(Some(Credential::new(
		"token",
		name,
		Duration::from_secs(3600),
	))));

	let sync = Synchronizer::new(
		ctx.clone(),
		bus.clone(),
		cache.clone(),
		credentials.clone(),
		SyncOptions::default(),
	);

	(sync, credentials)
}

pub async fn wait_room(session: &RoomSession, mut f: impl FnMut(&RoomView) -> bool) -> RoomView {
	let mut view = session.view();
	let result = tokio::time::timeout(TIMEOUT, view.wait_for(|view| f(view)))
		.await
		.expect("timed out waiting for room view")
		.expect("room session dropped its view")
		.clone();
	result
}

pub async fn wait_lobby(session: &LobbySession, mut f: impl FnMut(&DirectoryView) -> bool) -> DirectoryView {
	let mut view = session.view();
	let result = tokio::time::timeout(TIMEOUT, view.wait_for(|view| f(view)))
		.await
		.expect("timed out waiting for directory view")
		.expect("lobby session dropped its view")
		.clone();
	result
}

pub fn bodies(view: &RoomView) -> Vec<&str> {
	view.messages.iter().map(|message| message.body.as_str()).collect()
}

/// Polls `f` until it holds or the timeout passes.
pub async fn eventually(mut f: impl FnMut() -> bool) {
	tokio::time::timeout(TIMEOUT, async {
		while !f() {
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.expect("condition never held");
}
