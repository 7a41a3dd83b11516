use anyhow::Context;

use super::check_credential;
use crate::cli::{Cli, Invokable};
use crate::invoker::Invoker;

#[derive(Debug, clap::Args)]
pub struct History {
	/// The room to read
	room: String,
}

impl Invokable for History {
	async fn invoke(&self, invoker: &mut Invoker, _: &Cli) -> anyhow::Result<()> {
		let messages = invoker
			.sync()
			.load_history(&self.room)
			.await
			.map_err(check_credential)
			.context("failed to load history")?;

		// Oldest first, the way a conversation reads.
		for message in messages.iter().rev() {
			invoker.line(message)?;
		}

		Ok(())
	}
}
