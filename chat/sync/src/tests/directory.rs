use std::time::Duration;

use common::context::Context;

use super::{client, TIMEOUT};
use crate::binding::{directory_key, RoomName, Subject};
use crate::feed::FeedItem;
use crate::payload::Envelope;
use crate::substrate::memory::{MemoryBus, MemoryCache};
use crate::substrate::Cache;

#[tokio::test]
async fn test_list_rooms_empty() {
	let (ctx, _handler) = Context::new();
	let (bus, cache) = (MemoryBus::default(), MemoryCache::default());
	let (sync, _) = client(&ctx, &bus, &cache, "fox");

	assert!(sync.directory().list_rooms().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_rooms_is_idempotent() {
	let (ctx, _handler) = Context::new();
	let (bus, cache) = (MemoryBus::default(), MemoryCache::default());
	let (sync, _) = client(&ctx, &bus, &cache, "fox");

	for member in ["b", "a", "a", "not a room"] {
		cache
			.set_add(&directory_key(), member.to_owned(), Duration::from_secs(60))
			.await
			.unwrap();
	}

	let rooms = sync.directory().list_rooms().await.unwrap();
	assert_eq!(rooms, [RoomName::new("a").unwrap(), RoomName::new("b").unwrap()]);
}

#[tokio::test]
async fn test_announce_writes_then_publishes() {
	let (ctx, _handler) = Context::new();
	let (bus, cache) = (MemoryBus::default(), MemoryCache::default());
	let (sync, _) = client(&ctx, &bus, &cache, "fox");

	let mut control = sync.feed().subscribe(&Subject::Control).await.unwrap();
	let room = RoomName::new("helium").unwrap();

	sync.directory().announce_room_created(&room, sync.origin()).await.unwrap();

	let item = tokio::time::timeout(TIMEOUT, control.recv()).await.unwrap().unwrap();
	let FeedItem::Payload(raw) = item else {
		panic!("expected a payload, got {item:?}");
	};

	assert_eq!(Envelope::decode(&raw).unwrap(), Envelope::room_created(&room, sync.origin()));
	assert_eq!(sync.directory().list_rooms().await.unwrap(), [room]);
}

#[tokio::test]
async fn test_announce_survives_failing_cache() {
	let (ctx, _handler) = Context::new();
	let (bus, cache) = (MemoryBus::default(), MemoryCache::default());
	let (sync, _) = client(&ctx, &bus, &cache, "fox");

	let mut control = sync.feed().subscribe(&Subject::Control).await.unwrap();
	cache.set_unavailable(true);

	let room = RoomName::new("helium").unwrap();
	sync.directory().announce_room_created(&room, sync.origin()).await.unwrap();

	let item = tokio::time::timeout(TIMEOUT, control.recv()).await.unwrap().unwrap();
	assert!(matches!(item, FeedItem::Payload(_)));
	assert!(sync.directory().list_rooms().await.is_err());
}
