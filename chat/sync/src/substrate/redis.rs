use std::collections::HashSet;
use std::time::Duration;

use fred::interfaces::{ClientLike, KeysInterface, ListInterface, SetsInterface};

use super::{Cache, CacheError, RedisConfig};
use crate::binding::CacheKey;

#[derive(Debug, Clone)]
pub struct RedisCache {
	client: fred::clients::RedisClient,
}

#[derive(Debug, thiserror::Error)]
pub enum RedisCacheError {
	#[error("redis: {0}")]
	Redis(#[from] fred::error::RedisError),
}

impl RedisCache {
	#[tracing::instrument(skip_all, name = "RedisCache::new", err)]
	pub async fn new(config: &RedisConfig) -> Result<Self, CacheError> {
		let client = fred::clients::RedisClient::new(
			fred::types::RedisConfig::from_url(&config.url).map_err(RedisCacheError::from)?,
			None,
			None,
			None,
		);

		client.init().await.map_err(RedisCacheError::from)?;

		Ok(Self { client })
	}

	async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
		self.client
			.expire::<(), _>(key, ttl.as_secs().max(1) as i64)
			.await
			.map_err(RedisCacheError::from)?;

		Ok(())
	}
}

impl Cache for RedisCache {
	#[tracing::instrument(skip(self, value), name = "RedisCache::list_append_front", fields(key = %key), err)]
	async fn list_append_front(&self, key: &CacheKey, value: String, ttl: Duration) -> Result<(), CacheError> {
		let key = key.to_string();

		self.client
			.lpush::<(), _, _>(key.as_str(), value)
			.await
			.map_err(RedisCacheError::from)?;

		self.expire(&key, ttl).await
	}

	#[tracing::instrument(skip(self), name = "RedisCache::list_fetch_all", fields(key = %key), err)]
	async fn list_fetch_all(&self, key: &CacheKey) -> Result<Option<Vec<String>>, CacheError> {
		let values = self
			.client
			.lrange::<Vec<String>, _>(key.to_string(), 0, -1)
			.await
			.map_err(RedisCacheError::from)?;

		// Redis reports a missing list as an empty one.
		Ok(Some(values).filter(|values| !values.is_empty()))
	}

	#[tracing::instrument(skip(self), name = "RedisCache::set_add", fields(key = %key), err)]
	async fn set_add(&self, key: &CacheKey, member: String, ttl: Duration) -> Result<(), CacheError> {
		let key = key.to_string();

		self.client
			.sadd::<(), _, _>(key.as_str(), member)
			.await
			.map_err(RedisCacheError::from)?;

		self.expire(&key, ttl).await
	}

	#[tracing::instrument(skip(self), name = "RedisCache::set_fetch", fields(key = %key), err)]
	async fn set_fetch(&self, key: &CacheKey) -> Result<Option<HashSet<String>>, CacheError> {
		let members = self
			.client
			.smembers::<HashSet<String>, _>(key.to_string())
			.await
			.map_err(RedisCacheError::from)?;

		Ok(Some(members).filter(|members| !members.is_empty()))
	}
}
