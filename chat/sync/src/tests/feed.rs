use std::sync::Arc;
use std::time::Duration;

use common::context::Context;

use super::{eventually, TIMEOUT};
use crate::binding::{RoomName, Subject};
use crate::feed::{FeedItem, LiveFeed, SubscriptionError};
use crate::substrate::memory::MemoryBus;

fn start(ctx: &Context, bus: &MemoryBus, capacity: usize) -> Arc<LiveFeed<MemoryBus>> {
	let feed = Arc::new(LiveFeed::new(Arc::new(bus.clone()), capacity));

	tokio::spawn({
		let feed = feed.clone();
		let ctx = ctx.clone();
		async move { feed.run(ctx).await }
	});

	feed
}

fn general() -> Subject {
	Subject::Room(RoomName::new("general").unwrap())
}

#[tokio::test]
async fn test_topic_is_shared_between_subscribers() {
	let (ctx, _handler) = Context::new();
	let bus = MemoryBus::default();
	let feed = start(&ctx, &bus, 16);

	let mut first = feed.subscribe(&general()).await.unwrap();
	let mut second = feed.subscribe(&general()).await.unwrap();
	assert_eq!(first.topic(), "general-chat");
	assert_eq!(bus.subscriber_count("general-chat"), 1);

	feed.publish(&general(), "one".to_owned()).await.unwrap();
	feed.publish(&general(), "two".to_owned()).await.unwrap();

	for subscription in [&mut first, &mut second] {
		for expected in ["one", "two"] {
			let item = tokio::time::timeout(TIMEOUT, subscription.recv()).await.unwrap();
			assert_eq!(item, Some(FeedItem::Payload(expected.to_owned())));
		}
	}

	drop(first);
	tokio::time::sleep(Duration::from_millis(20)).await;
	assert_eq!(bus.subscriber_count("general-chat"), 1);

	drop(second);
	eventually(|| bus.subscriber_count("general-chat") == 0).await;
}

#[tokio::test]
async fn test_topics_are_isolated() {
	let (ctx, _handler) = Context::new();
	let bus = MemoryBus::default();
	let feed = start(&ctx, &bus, 16);

	let mut room = feed.subscribe(&general()).await.unwrap();
	let mut control = feed.subscribe(&Subject::Control).await.unwrap();

	feed.publish(&Subject::Control, "created".to_owned()).await.unwrap();
	feed.publish(&general(), "hello".to_owned()).await.unwrap();

	let item = tokio::time::timeout(TIMEOUT, room.recv()).await.unwrap();
	assert_eq!(item, Some(FeedItem::Payload("hello".to_owned())));

	let item = tokio::time::timeout(TIMEOUT, control.recv()).await.unwrap();
	assert_eq!(item, Some(FeedItem::Payload("created".to_owned())));
}

#[tokio::test]
async fn test_subscribe_failure_is_reported() {
	let (ctx, _handler) = Context::new();
	let bus = MemoryBus::default();
	let feed = start(&ctx, &bus, 16);

	bus.set_unavailable(true);

	let err = feed.subscribe(&general()).await.unwrap_err();
	assert!(matches!(err, SubscriptionError::Subscribe { ref topic, .. } if topic == "general-chat"));

	bus.set_unavailable(false);
	assert!(feed.subscribe(&general()).await.is_ok());
}

#[tokio::test]
async fn test_lagging_subscriber_is_told() {
	let (ctx, _handler) = Context::new();
	let bus = MemoryBus::default();
	let feed = start(&ctx, &bus, 1);

	let mut subscription = feed.subscribe(&general()).await.unwrap();

	for payload in ["one", "two", "three"] {
		feed.publish(&general(), payload.to_owned()).await.unwrap();
	}

	tokio::time::sleep(Duration::from_millis(50)).await;

	let item = tokio::time::timeout(TIMEOUT, subscription.recv()).await.unwrap();
	assert_eq!(
		item,
		Some(FeedItem::Error(SubscriptionError::Lagged {
			topic: "general-chat".to_owned(),
			skipped: 2,
		}))
	);

	let item = tokio::time::timeout(TIMEOUT, subscription.recv()).await.unwrap();
	assert_eq!(item, Some(FeedItem::Payload("three".to_owned())));
}

#[tokio::test]
async fn test_stopped_feed_refuses_subscriptions() {
	let (ctx, handler) = Context::new();
	let bus = MemoryBus::default();
	let feed = start(&ctx, &bus, 16);

	let mut subscription = feed.subscribe(&general()).await.unwrap();

	handler.cancel();

	let item = tokio::time::timeout(TIMEOUT, subscription.recv()).await.unwrap();
	assert_eq!(item, None);

	let err = tokio::time::timeout(TIMEOUT, feed.subscribe(&general())).await.unwrap().unwrap_err();
	assert_eq!(err, SubscriptionError::NotRunning);
}

#[tokio::test]
async fn test_abandoned_subscribe_releases_topic() {
	let (ctx, _handler) = Context::new();
	let bus = MemoryBus::default();
	let feed = start(&ctx, &bus, 16);

	let first = feed.subscribe(&general()).await.unwrap();

	// The manager hands this request a receiver, but the caller never
	// collects it.
	let topic = general();
	let mut pending = Box::pin(feed.subscribe(&topic));
	assert!(futures::poll!(pending.as_mut()).is_pending());
	tokio::time::sleep(Duration::from_millis(20)).await;

	drop(first);
	tokio::time::sleep(Duration::from_millis(20)).await;
	assert_eq!(bus.subscriber_count("general-chat"), 1);

	drop(pending);
	eventually(|| bus.subscriber_count("general-chat") == 0).await;
}
