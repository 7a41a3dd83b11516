use async_nats::{ConnectOptions, ServerAddr};
use futures::StreamExt;

use super::{Bus, BusError, BusStream, NatsConfig};

#[derive(Debug, Clone)]
pub struct NatsBus {
	client: async_nats::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum NatsBusError {
	#[error("invalid server address {address}: {source}")]
	Address { address: String, source: std::io::Error },
	#[error("connect: {0}")]
	Connect(#[from] async_nats::ConnectError),
	#[error("publish: {0}")]
	Publish(#[from] async_nats::PublishError),
	#[error("subscribe: {0}")]
	Subscribe(#[from] async_nats::SubscribeError),
	#[error("payload is not utf-8: {0}")]
	Utf8(#[from] std::string::FromUtf8Error),
}

impl NatsBus {
	#[tracing::instrument(skip_all, name = "NatsBus::new", fields(name = %config.name), err)]
	pub async fn new(config: &NatsConfig, token: Option<&str>) -> Result<Self, BusError> {
		let mut options = ConnectOptions::new()
			.name(&config.name)
			.connection_timeout(config.connect_timeout);

		if let Some(username) = &config.username {
			options = options.user_and_password(username.clone(), config.password.clone().unwrap_or_default());
		} else if let Some(token) = config.token.as_deref().or(token).filter(|token| !token.is_empty()) {
			options = options.token(token.to_owned());
		}

		let servers = config
			.servers
			.iter()
			.map(|address| {
				address.parse::<ServerAddr>().map_err(|source| NatsBusError::Address {
					address: address.clone(),
					source,
				})
			})
			.collect::<Result<Vec<_>, _>>()?;

		let client = async_nats::connect_with_options(servers, options)
			.await
			.map_err(NatsBusError::from)?;

		Ok(Self { client })
	}
}

impl Bus for NatsBus {
	#[tracing::instrument(skip(self, payload), name = "NatsBus::publish", err)]
	async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
		self.client
			.publish(topic.to_owned(), payload.into())
			.await
			.map_err(NatsBusError::Publish)?;

		Ok(())
	}

	#[tracing::instrument(skip(self), name = "NatsBus::subscribe", err)]
	async fn subscribe(&self, topic: &str) -> Result<BusStream, BusError> {
		let subscriber = self.client.subscribe(topic.to_owned()).await.map_err(NatsBusError::Subscribe)?;

		Ok(subscriber
			.map(|message| {
				String::from_utf8(message.payload.to_vec()).map_err(|err| BusError::from(NatsBusError::from(err)))
			})
			.boxed())
	}
}
