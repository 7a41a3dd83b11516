use std::collections::HashMap;
use std::sync::Arc;

use common::context::Context;
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio_stream::{StreamExt, StreamMap, StreamNotifyClose};
use tracing::{debug, trace, warn};

use crate::binding::Subject;
use crate::substrate::{Bus, BusError, BusStream};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
	#[error("subscribe to {topic} failed: {reason}")]
	Subscribe { topic: String, reason: String },
	#[error("delivery on {topic} failed: {reason}")]
	Delivery { topic: String, reason: String },
	#[error("lagged behind on {topic}, {skipped} payloads dropped")]
	Lagged { topic: String, skipped: u64 },
	#[error("feed for {topic} closed")]
	Closed { topic: String },
	#[error("live feed is not running")]
	NotRunning,
}

/// What a subscriber sees: either a raw payload, or a delivery problem that
/// did not end the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedItem {
	Payload(String),
	Error(SubscriptionError),
}

#[derive(Debug)]
enum Event {
	Subscribe {
		topic: String,
		tx: oneshot::Sender<Result<broadcast::Receiver<FeedItem>, SubscriptionError>>,
	},
	Unsubscribe {
		topic: String,
	},
}

/// Multiplexes bus topics onto in-process broadcast channels.
///
/// Each topic is subscribed on the bus once no matter how many local
/// subscribers it has, and released once the last one is dropped.
pub struct LiveFeed<B> {
	bus: Arc<B>,
	capacity: usize,
	events_tx: mpsc::UnboundedSender<Event>,
	events_rx: Mutex<mpsc::UnboundedReceiver<Event>>,
}

impl<B: Bus> LiveFeed<B> {
	pub fn new(bus: Arc<B>, capacity: usize) -> Self {
		// Unbounded so that dropping a subscription never has to wait.
		let (events_tx, events_rx) = mpsc::unbounded_channel();

		Self {
			bus,
			capacity: capacity.max(1),
			events_tx,
			events_rx: Mutex::new(events_rx),
		}
	}

	pub fn bus(&self) -> &Arc<B> {
		&self.bus
	}

	pub async fn publish(&self, subject: &Subject, payload: String) -> Result<(), BusError> {
		self.bus.publish(&subject.to_string(), payload).await
	}

	pub async fn run(&self, ctx: Context) {
		let mut topics = HashMap::<String, broadcast::Sender<FeedItem>>::new();
		let mut subs = StreamMap::<String, StreamNotifyClose<BusStream>>::new();

		let mut events_rx = self.events_rx.lock().await;

		loop {
			select! {
				_ = ctx.done() => {
					debug!("live feed shutting down");
					break;
				}
				event = events_rx.recv() => {
					let Some(event) = event else {
						break;
					};

					trace!(?event, "live feed event");

					match event {
						Event::Subscribe { topic, tx } => {
							if let Some(sender) = topics.get(&topic) {
								let abandoned = tx.send(Ok(sender.subscribe())).is_err();

								if abandoned && sender.receiver_count() == 0 {
									debug!(%topic, "subscriber went away, releasing topic");
									topics.remove(&topic);
									subs.remove(&topic);
								}

								continue;
							}

							debug!(%topic, "subscribing to topic");
							match self.bus.subscribe(&topic).await {
								Ok(stream) => {
									let (sender, rx) = broadcast::channel(self.capacity);
									if tx.send(Ok(rx)).is_err() {
										debug!(%topic, "subscriber went away before the topic was bound");
										continue;
									}

									topics.insert(topic.clone(), sender);
									subs.insert(topic, StreamNotifyClose::new(stream));
								}
								Err(err) => {
									warn!(%topic, error = %err, "failed to subscribe to topic");
									tx.send(Err(SubscriptionError::Subscribe {
										topic,
										reason: err.to_string(),
									}))
									.ok();
								}
							}
						}
						Event::Unsubscribe { topic } => {
							if topics.get(&topic).is_some_and(|sender| sender.receiver_count() == 0) {
								debug!(%topic, "releasing topic");
								topics.remove(&topic);
								// Dropping the stream ends the bus subscription.
								subs.remove(&topic);
							}
						}
					}
				}
				Some((topic, item)) = subs.next(), if !subs.is_empty() => {
					let item = match item {
						Some(Ok(payload)) => FeedItem::Payload(payload),
						Some(Err(err)) => FeedItem::Error(SubscriptionError::Delivery {
							topic: topic.clone(),
							reason: err.to_string(),
						}),
						None => {
							warn!(%topic, "bus closed the subscription");
							if let Some(sender) = topics.remove(&topic) {
								sender.send(FeedItem::Error(SubscriptionError::Closed { topic })).ok();
							}
							continue;
						}
					};

					let Some(sender) = topics.get(&topic) else {
						debug!(%topic, "received payload for released topic");
						continue;
					};

					if sender.send(item).is_err() {
						trace!(%topic, "no subscribers left for payload");
					}
				}
			}
		}

		// Pending and future subscribe requests fail instead of waiting forever.
		events_rx.close();
		while events_rx.try_recv().is_ok() {}
	}

	pub async fn subscribe(&self, subject: &Subject) -> Result<Subscription, SubscriptionError> {
		// Dropped while waiting, this still unsubscribes the receiver the
		// manager may already have handed over.
		let mut subscription = Subscription {
			topic: subject.to_string(),
			rx: None,
			events_tx: self.events_tx.clone(),
		};

		let (tx, rx) = oneshot::channel();

		self.events_tx
			.send(Event::Subscribe {
				topic: subscription.topic.clone(),
				tx,
			})
			.map_err(|_| SubscriptionError::NotRunning)?;

		subscription.rx = Some(rx.await.map_err(|_| SubscriptionError::NotRunning)??);

		Ok(subscription)
	}
}

/// A handle on one topic. Dropping it is the unsubscribe.
#[derive(Debug)]
pub struct Subscription {
	topic: String,
	rx: Option<broadcast::Receiver<FeedItem>>,
	events_tx: mpsc::UnboundedSender<Event>,
}

impl Subscription {
	pub fn topic(&self) -> &str {
		&self.topic
	}

	/// Waits for the next item. `None` once the feed for this topic is gone.
	pub async fn recv(&mut self) -> Option<FeedItem> {
		let rx = self.rx.as_mut()?;

		match rx.recv().await {
			Ok(item) => Some(item),
			Err(RecvError::Lagged(skipped)) => Some(FeedItem::Error(SubscriptionError::Lagged {
				topic: self.topic.clone(),
				skipped,
			})),
			Err(RecvError::Closed) => None,
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		// The receiver has to be gone before the manager counts receivers.
		self.rx.take();

		self.events_tx
			.send(Event::Unsubscribe {
				topic: self.topic.clone(),
			})
			.ok();
	}
}
