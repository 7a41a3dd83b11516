use std::fmt::Display;
use std::sync::Arc;

use anyhow::Context as _;
use chat_sync::substrate::{build_bus, build_cache, AnyBus, AnyCache};
use chat_sync::{names, Credential, CredentialHolder, Synchronizer};
use common::context::Context;

use crate::cli::Cli;
use crate::config::ChatConfig;

/// Everything a command needs: the engine and how to print.
pub struct Invoker {
	sync: Synchronizer<AnyBus, AnyCache>,
	json_output: bool,
}

impl Invoker {
	pub async fn new(context: Context, args: &Cli, config: &ChatConfig) -> anyhow::Result<Self> {
		let display_name = args
			.name
			.clone()
			.or_else(|| config.auth.display_name.clone())
			.unwrap_or_else(names::random_display_name);

		let token = args.token.clone().or_else(|| config.auth.token.clone()).unwrap_or_default();
		let lifetime = args.token_ttl.unwrap_or(config.auth.token_ttl);

		tracing::debug!(%display_name, "starting client");

		let bus = build_bus(&config.bus, Some(&token))
			.await
			.context("failed to connect to bus")?;
		let cache = build_cache(&config.cache).await.context("failed to connect to cache")?;

		let credentials = Arc::new(CredentialHolder::new(Some(Credential::new(token, display_name, lifetime))));

		Ok(Self {
			sync: Synchronizer::new(context, bus, cache, credentials, config.sync.clone()),
			json_output: args.json,
		})
	}

	pub fn sync(&self) -> &Synchronizer<AnyBus, AnyCache> {
		&self.sync
	}

	/// Structured output: pretty json with `--json`, yaml otherwise.
	pub fn display<T: serde::Serialize>(&self, value: &T) -> anyhow::Result<()> {
		let output = if self.json_output {
			serde_json::to_string_pretty(value).context("failed to display response")?
		} else {
			serde_yaml::to_string(value).context("failed to display response")?
		};

		println!("{}", output.trim());

		Ok(())
	}

	/// Streaming output: one compact json object per line with `--json`,
	/// the plain text form otherwise.
	pub fn line<T: serde::Serialize + Display>(&self, value: &T) -> anyhow::Result<()> {
		if self.json_output {
			println!("{}", serde_json::to_string(value).context("failed to display line")?);
		} else {
			println!("{value}");
		}

		Ok(())
	}
}
