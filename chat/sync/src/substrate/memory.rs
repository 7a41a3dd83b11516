//! In-process bus and cache. Clones share state, so several synchronizers in
//! one process see each other the way separate clients would over nats and
//! redis.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use super::{Bus, BusError, BusStream, Cache, CacheError};
use crate::binding::CacheKey;

const TOPIC_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
	#[error("backend unavailable")]
	Unavailable,
	#[error("subscriber lagged, {0} payloads dropped")]
	Lagged(u64),
	#[error("wrong kind of value at {0}")]
	WrongType(String),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct MemoryBusInner {
	topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
	unavailable: AtomicBool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
	inner: Arc<MemoryBusInner>,
}

impl MemoryBus {
	/// While unavailable every call fails.
	pub fn set_unavailable(&self, unavailable: bool) {
		self.inner.unavailable.store(unavailable, Ordering::SeqCst);
	}

	/// Number of live bus subscriptions on `topic`.
	pub fn subscriber_count(&self, topic: &str) -> usize {
		lock(&self.inner.topics)
			.get(topic)
			.map(broadcast::Sender::receiver_count)
			.unwrap_or_default()
	}

	fn check(&self) -> Result<(), BusError> {
		if self.inner.unavailable.load(Ordering::SeqCst) {
			return Err(MemoryError::Unavailable.into());
		}

		Ok(())
	}

	fn sender(&self, topic: &str) -> broadcast::Sender<String> {
		lock(&self.inner.topics)
			.entry(topic.to_owned())
			.or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
			.clone()
	}
}

impl Bus for MemoryBus {
	async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
		self.check()?;

		// Nobody listening is not an error on a bus.
		self.sender(topic).send(payload).ok();

		Ok(())
	}

	async fn subscribe(&self, topic: &str) -> Result<BusStream, BusError> {
		self.check()?;

		let stream = BroadcastStream::new(self.sender(topic).subscribe()).map(|item| match item {
			Ok(payload) => Ok(payload),
			Err(BroadcastStreamRecvError::Lagged(skipped)) => Err(MemoryError::Lagged(skipped).into()),
		});

		Ok(stream.boxed())
	}
}

#[derive(Debug)]
enum Value {
	List(VecDeque<String>),
	Set(HashSet<String>),
}

#[derive(Debug)]
struct Entry {
	value: Value,
	expires_at: Instant,
}

#[derive(Debug, Default)]
struct MemoryCacheInner {
	entries: Mutex<HashMap<String, Entry>>,
	unavailable: AtomicBool,
	request_latency: Mutex<Duration>,
	fetch_latency: Mutex<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
	inner: Arc<MemoryCacheInner>,
}

impl MemoryCache {
	pub fn set_unavailable(&self, unavailable: bool) {
		self.inner.unavailable.store(unavailable, Ordering::SeqCst);
	}

	/// Delays fetch results. The data is read before the delay, like a
	/// response that is slow to come back.
	pub fn set_fetch_latency(&self, latency: Duration) {
		*lock(&self.inner.fetch_latency) = latency;
	}

	/// Delays fetches before the data is read, like a request that is slow
	/// to reach the server. Writes made meanwhile are part of the result.
	pub fn set_request_latency(&self, latency: Duration) {
		*lock(&self.inner.request_latency) = latency;
	}

	fn check(&self) -> Result<(), CacheError> {
		if self.inner.unavailable.load(Ordering::SeqCst) {
			return Err(MemoryError::Unavailable.into());
		}

		Ok(())
	}

	fn with_entry<R>(
		&self,
		key: &CacheKey,
		ttl: Duration,
		empty: impl Fn() -> Value,
		f: impl FnOnce(&mut Value) -> Option<R>,
	) -> Result<R, CacheError> {
		let key = key.to_string();
		let now = Instant::now();
		let mut entries = lock(&self.inner.entries);

		let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
			value: empty(),
			expires_at: now + ttl,
		});

		if entry.expires_at <= now {
			entry.value = empty();
		}

		entry.expires_at = now + ttl;

		f(&mut entry.value).ok_or_else(|| MemoryError::WrongType(key).into())
	}

	fn read<R>(&self, key: &CacheKey, f: impl FnOnce(&Value) -> Option<R>) -> Result<Option<R>, CacheError> {
		let key = key.to_string();
		let mut entries = lock(&self.inner.entries);

		let Some(entry) = entries.get(&key) else {
			return Ok(None);
		};

		if entry.expires_at <= Instant::now() {
			entries.remove(&key);
			return Ok(None);
		}

		f(&entry.value).map(Some).ok_or_else(|| MemoryError::WrongType(key).into())
	}

	async fn delay(latency: &Mutex<Duration>) {
		let latency = *lock(latency);
		if !latency.is_zero() {
			tokio::time::sleep(latency).await;
		}
	}
}

impl Cache for MemoryCache {
	async fn list_append_front(&self, key: &CacheKey, value: String, ttl: Duration) -> Result<(), CacheError> {
		self.check()?;

		self.with_entry(
			key,
			ttl,
			|| Value::List(VecDeque::new()),
			|entry| match entry {
				Value::List(list) => {
					list.push_front(value);
					Some(())
				}
				Value::Set(_) => None,
			},
		)
	}

	async fn list_fetch_all(&self, key: &CacheKey) -> Result<Option<Vec<String>>, CacheError> {
		self.check()?;
		Self::delay(&self.inner.request_latency).await;

		let values = self.read(key, |entry| match entry {
			Value::List(list) => Some(list.iter().cloned().collect::<Vec<_>>()),
			Value::Set(_) => None,
		})?;

		Self::delay(&self.inner.fetch_latency).await;

		Ok(values)
	}

	async fn set_add(&self, key: &CacheKey, member: String, ttl: Duration) -> Result<(), CacheError> {
		self.check()?;

		self.with_entry(
			key,
			ttl,
			|| Value::Set(HashSet::new()),
			|entry| match entry {
				Value::Set(set) => {
					set.insert(member);
					Some(())
				}
				Value::List(_) => None,
			},
		)
	}

	async fn set_fetch(&self, key: &CacheKey) -> Result<Option<HashSet<String>>, CacheError> {
		self.check()?;
		Self::delay(&self.inner.request_latency).await;

		let members = self.read(key, |entry| match entry {
			Value::Set(set) => Some(set.clone()),
			Value::List(_) => None,
		})?;

		Self::delay(&self.inner.fetch_latency).await;

		Ok(members)
	}
}
