use std::sync::Arc;
use std::time::Duration;

use crate::binding::{room_history_key, RoomName};
use crate::history::HistoryStore;
use crate::payload::{ClientId, Message};
use crate::substrate::memory::MemoryCache;
use crate::substrate::Cache;

fn store(cache: &MemoryCache) -> HistoryStore<MemoryCache> {
	HistoryStore::new(Arc::new(cache.clone()), Duration::from_secs(3600))
}

#[tokio::test]
async fn test_missing_history_is_empty() {
	let cache = MemoryCache::default();
	let room = RoomName::new("general").unwrap();

	assert!(store(&cache).load_history(&room).await.is_empty());
}

#[tokio::test]
async fn test_append_is_newest_first() {
	let cache = MemoryCache::default();
	let history = store(&cache);
	let room = RoomName::new("general").unwrap();
	let origin = ClientId::new();

	history.append_message(&room, &Message::new("fox", "A").unwrap(), origin).await.unwrap();
	history.append_message(&room, &Message::new("owl", "B").unwrap(), origin).await.unwrap();

	assert_eq!(
		history.load_history(&room).await,
		[Message::new("owl", "B").unwrap(), Message::new("fox", "A").unwrap()]
	);
}

#[tokio::test]
async fn test_stored_messages_keep_their_id() {
	let cache = MemoryCache::default();
	let history = store(&cache);
	let room = RoomName::new("general").unwrap();
	let origin = ClientId::new();

	let first = history.append_message(&room, &Message::new("fox", "A").unwrap(), origin).await.unwrap();
	let second = history.append_message(&room, &Message::new("fox", "A").unwrap(), origin).await.unwrap();
	assert_ne!(first, second);

	let posts = history.load_posts(&room).await;
	assert_eq!(
		posts.iter().map(|post| post.id).collect::<Vec<_>>(),
		[Some(second), Some(first)]
	);
	assert!(posts.iter().all(|post| post.origin == Some(origin)));
}

#[tokio::test]
async fn test_undecodable_entries_are_skipped() {
	let cache = MemoryCache::default();
	let history = store(&cache);
	let room = RoomName::new("general").unwrap();
	let key = room_history_key(&room);
	let ttl = Duration::from_secs(60);

	cache
		.list_append_front(&key, r#"{"username":"fox","message":"legacy"}"#.to_owned(), ttl)
		.await
		.unwrap();
	cache.list_append_front(&key, "garbage".to_owned(), ttl).await.unwrap();
	cache
		.list_append_front(&key, r#"{"kind":"room_created","name":"neon"}"#.to_owned(), ttl)
		.await
		.unwrap();
	history
		.append_message(&room, &Message::new("owl", "tagged").unwrap(), ClientId::new())
		.await
		.unwrap();

	assert_eq!(
		history.load_history(&room).await,
		[Message::new("owl", "tagged").unwrap(), Message::new("fox", "legacy").unwrap()]
	);
}

#[tokio::test]
async fn test_failing_cache_starts_empty() {
	let cache = MemoryCache::default();
	let history = store(&cache);
	let room = RoomName::new("general").unwrap();

	history.append_message(&room, &Message::new("fox", "A").unwrap(), ClientId::new()).await.unwrap();
	cache.set_unavailable(true);

	assert!(history.load_history(&room).await.is_empty());
	assert!(history
		.append_message(&room, &Message::new("fox", "B").unwrap(), ClientId::new())
		.await
		.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_history_expires() {
	let cache = MemoryCache::default();
	let history = HistoryStore::new(Arc::new(cache.clone()), Duration::from_secs(10));
	let room = RoomName::new("general").unwrap();

	history.append_message(&room, &Message::new("fox", "A").unwrap(), ClientId::new()).await.unwrap();
	tokio::time::advance(Duration::from_secs(5)).await;
	history.append_message(&room, &Message::new("fox", "B").unwrap(), ClientId::new()).await.unwrap();

	// Each append refreshes the retention.
	tokio::time::advance(Duration::from_secs(8)).await;
	assert_eq!(history.load_history(&room).await.len(), 2);

	tokio::time::advance(Duration::from_secs(3)).await;
	assert!(history.load_history(&room).await.is_empty());
}
