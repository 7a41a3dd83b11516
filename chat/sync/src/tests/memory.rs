use std::collections::HashSet;
use std::time::Duration;

use futures::StreamExt;

use crate::binding::{directory_key, CacheKey};
use crate::substrate::memory::{MemoryBus, MemoryCache};
use crate::substrate::{Bus, Cache, CacheError};

fn key(name: &str) -> CacheKey {
	CacheKey {
		namespace: "test",
		key: name.to_owned(),
	}
}

#[tokio::test]
async fn test_bus_publish_without_subscribers() {
	let bus = MemoryBus::default();

	bus.publish("nobody", "hello".to_owned()).await.unwrap();
	assert_eq!(bus.subscriber_count("nobody"), 0);
}

#[tokio::test]
async fn test_bus_delivers_to_every_stream() {
	let bus = MemoryBus::default();
	let mut first = bus.subscribe("topic").await.unwrap();
	let mut second = bus.subscribe("topic").await.unwrap();

	bus.publish("topic", "hello".to_owned()).await.unwrap();

	assert_eq!(first.next().await.unwrap().unwrap(), "hello");
	assert_eq!(second.next().await.unwrap().unwrap(), "hello");

	drop(first);
	assert_eq!(bus.subscriber_count("topic"), 1);
}

#[tokio::test]
async fn test_cache_list_and_set() {
	let cache = MemoryCache::default();
	let ttl = Duration::from_secs(60);

	assert_eq!(cache.list_fetch_all(&key("list")).await.unwrap(), None);
	assert_eq!(cache.set_fetch(&directory_key()).await.unwrap(), None);

	cache.list_append_front(&key("list"), "a".to_owned(), ttl).await.unwrap();
	cache.list_append_front(&key("list"), "b".to_owned(), ttl).await.unwrap();
	assert_eq!(
		cache.list_fetch_all(&key("list")).await.unwrap(),
		Some(vec!["b".to_owned(), "a".to_owned()])
	);

	cache.set_add(&directory_key(), "a".to_owned(), ttl).await.unwrap();
	cache.set_add(&directory_key(), "a".to_owned(), ttl).await.unwrap();
	assert_eq!(
		cache.set_fetch(&directory_key()).await.unwrap(),
		Some(HashSet::from(["a".to_owned()]))
	);
}

#[tokio::test]
async fn test_cache_wrong_type() {
	let cache = MemoryCache::default();
	let ttl = Duration::from_secs(60);

	cache.set_add(&key("mixed"), "a".to_owned(), ttl).await.unwrap();

	assert!(matches!(
		cache.list_append_front(&key("mixed"), "b".to_owned(), ttl).await,
		Err(CacheError::Memory(_))
	));
	assert!(cache.list_fetch_all(&key("mixed")).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_cache_expiry() {
	let cache = MemoryCache::default();

	cache
		.set_add(&directory_key(), "a".to_owned(), Duration::from_secs(10))
		.await
		.unwrap();

	tokio::time::advance(Duration::from_secs(11)).await;
	assert_eq!(cache.set_fetch(&directory_key()).await.unwrap(), None);

	// An expired key can be reused for another kind of value.
	cache
		.list_append_front(&directory_key(), "b".to_owned(), Duration::from_secs(10))
		.await
		.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cache_write_after_expiry_starts_fresh() {
	let cache = MemoryCache::default();
	let ttl = Duration::from_secs(10);

	cache.set_add(&directory_key(), "a".to_owned(), ttl).await.unwrap();
	tokio::time::advance(Duration::from_secs(11)).await;
	cache.set_add(&directory_key(), "b".to_owned(), ttl).await.unwrap();

	assert_eq!(
		cache.set_fetch(&directory_key()).await.unwrap(),
		Some(HashSet::from(["b".to_owned()]))
	);
}

#[tokio::test]
async fn test_cache_unavailable() {
	let cache = MemoryCache::default();
	cache.set_unavailable(true);

	assert!(cache.set_fetch(&directory_key()).await.is_err());

	cache.set_unavailable(false);
	assert!(cache.set_fetch(&directory_key()).await.is_ok());
}
