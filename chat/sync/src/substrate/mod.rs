//! The external substrates: a pub/sub bus for live delivery and a key/value
//! cache for history and the room directory.

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::BoxStream;

use self::memory::{MemoryBus, MemoryCache, MemoryError};
use self::nats::{NatsBus, NatsBusError};
use self::redis::{RedisCache, RedisCacheError};
use crate::binding::CacheKey;

pub mod memory;
pub mod nats;
pub mod redis;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
	#[error("nats: {0}")]
	Nats(#[from] NatsBusError),
	#[error("memory: {0}")]
	Memory(#[from] MemoryError),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
	#[error("redis: {0}")]
	Redis(#[from] RedisCacheError),
	#[error("memory: {0}")]
	Memory(#[from] MemoryError),
}

/// Raw payloads delivered on one topic. Dropping the stream ends the
/// subscription on the bus.
pub type BusStream = BoxStream<'static, Result<String, BusError>>;

pub trait Bus: Send + Sync + 'static {
	fn publish(&self, topic: &str, payload: String) -> impl std::future::Future<Output = Result<(), BusError>> + Send;

	fn subscribe(&self, topic: &str) -> impl std::future::Future<Output = Result<BusStream, BusError>> + Send;
}

/// Lists and sets keyed by namespace. Fetches return `None` on a miss.
pub trait Cache: Send + Sync + 'static {
	fn list_append_front(
		&self,
		key: &CacheKey,
		value: String,
		ttl: Duration,
	) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

	fn list_fetch_all(&self, key: &CacheKey) -> impl std::future::Future<Output = Result<Option<Vec<String>>, CacheError>> + Send;

	fn set_add(
		&self,
		key: &CacheKey,
		member: String,
		ttl: Duration,
	) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

	fn set_fetch(&self, key: &CacheKey)
		-> impl std::future::Future<Output = Result<Option<HashSet<String>>, CacheError>> + Send;
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BusConfig {
	Memory,
	Nats(NatsConfig),
}

impl Default for BusConfig {
	fn default() -> Self {
		Self::Nats(NatsConfig::default())
	}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NatsConfig {
	/// Connection name reported to the server
	pub name: String,
	/// For example: localhost:4222
	pub servers: Vec<String>,
	pub username: Option<String>,
	pub password: Option<String>,
	/// Overrides the credential token when set
	pub token: Option<String>,
	#[serde(with = "humantime_serde")]
	pub connect_timeout: Duration,
}

impl Default for NatsConfig {
	fn default() -> Self {
		Self {
			name: "chat-sync".to_owned(),
			servers: vec!["localhost:4222".to_owned()],
			username: None,
			password: None,
			token: None,
			connect_timeout: Duration::from_secs(5),
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CacheConfig {
	Memory,
	Redis(RedisConfig),
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self::Redis(RedisConfig::default())
	}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RedisConfig {
	/// The Redis URL, for example: redis://localhost:6379
	pub url: String,
}

impl Default for RedisConfig {
	fn default() -> Self {
		Self {
			url: "redis://localhost:6379".to_owned(),
		}
	}
}

#[derive(Debug, Clone)]
pub enum AnyBus {
	Nats(NatsBus),
	Memory(MemoryBus),
}

impl Bus for AnyBus {
	async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
		match self {
			AnyBus::Nats(bus) => bus.publish(topic, payload).await,
			AnyBus::Memory(bus) => bus.publish(topic, payload).await,
		}
	}

	async fn subscribe(&self, topic: &str) -> Result<BusStream, BusError> {
		match self {
			AnyBus::Nats(bus) => bus.subscribe(topic).await,
			AnyBus::Memory(bus) => bus.subscribe(topic).await,
		}
	}
}

#[derive(Debug, Clone)]
pub enum AnyCache {
	Redis(RedisCache),
	Memory(MemoryCache),
}

impl Cache for AnyCache {
	async fn list_append_front(&self, key: &CacheKey, value: String, ttl: Duration) -> Result<(), CacheError> {
		match self {
			AnyCache::Redis(cache) => cache.list_append_front(key, value, ttl).await,
			AnyCache::Memory(cache) => cache.list_append_front(key, value, ttl).await,
		}
	}

	async fn list_fetch_all(&self, key: &CacheKey) -> Result<Option<Vec<String>>, CacheError> {
		match self {
			AnyCache::Redis(cache) => cache.list_fetch_all(key).await,
			AnyCache::Memory(cache) => cache.list_fetch_all(key).await,
		}
	}

	async fn set_add(&self, key: &CacheKey, member: String, ttl: Duration) -> Result<(), CacheError> {
		match self {
			AnyCache::Redis(cache) => cache.set_add(key, member, ttl).await,
			AnyCache::Memory(cache) => cache.set_add(key, member, ttl).await,
		}
	}

	async fn set_fetch(&self, key: &CacheKey) -> Result<Option<HashSet<String>>, CacheError> {
		match self {
			AnyCache::Redis(cache) => cache.set_fetch(key).await,
			AnyCache::Memory(cache) => cache.set_fetch(key).await,
		}
	}
}

/// `token` authenticates against the bus unless the config carries its own.
pub async fn build_bus(config: &BusConfig, token: Option<&str>) -> Result<AnyBus, BusError> {
	match config {
		BusConfig::Memory => Ok(AnyBus::Memory(MemoryBus::default())),
		BusConfig::Nats(nats) => Ok(AnyBus::Nats(NatsBus::new(nats, token).await?)),
	}
}

pub async fn build_cache(config: &CacheConfig) -> Result<AnyCache, CacheError> {
	match config {
		CacheConfig::Memory => Ok(AnyCache::Memory(MemoryCache::default())),
		CacheConfig::Redis(redis) => Ok(AnyCache::Redis(RedisCache::new(redis).await?)),
	}
}
