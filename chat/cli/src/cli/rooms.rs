use anyhow::Context;

use super::check_credential;
use crate::cli::{Cli, Invokable};
use crate::invoker::Invoker;

#[derive(Debug, clap::Args)]
pub struct Rooms {}

impl Invokable for Rooms {
	async fn invoke(&self, invoker: &mut Invoker, _: &Cli) -> anyhow::Result<()> {
		let rooms = invoker
			.sync()
			.list_rooms()
			.await
			.map_err(check_credential)
			.context("failed to list rooms")?;

		invoker.display(&rooms)?;

		Ok(())
	}
}
