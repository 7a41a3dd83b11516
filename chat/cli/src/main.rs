use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use cli::Invokable;
use common::context::Context;
use common::logging;
use config::ChatConfig;
use invoker::Invoker;

mod cli;
mod config;
mod invoker;

#[cfg(test)]
mod tests;

#[tokio::main]
async fn main() {
	let (context, handler) = Context::new();

	if let Err(err) = start(context).await {
		eprintln!("{err:#}");
		std::process::exit(1);
	}

	if tokio::time::timeout(Duration::from_secs(3), handler.shutdown()).await.is_err() {
		eprintln!("timed out waiting for sessions to close");
	}
}

async fn start(context: Context) -> anyhow::Result<()> {
	let cli = cli::Cli::parse();

	let config = ChatConfig::load(cli.config.as_deref()).context("failed to load config")?;

	logging::init(&config.logging.level, config.logging.mode).context("failed to initialize logging")?;

	let mut invoker = tokio::time::timeout(Duration::from_secs(5), Invoker::new(context, &cli, &config))
		.await
		.context("timed out connecting to the bus and cache")??;

	cli.command
		.invoke(&mut invoker, &cli)
		.await
		.context("failed to invoke command")?;

	Ok(())
}
