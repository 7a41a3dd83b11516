use anyhow::Context;
use chat_sync::RoomName;

use super::check_credential;
use crate::cli::{Cli, Invokable};
use crate::invoker::Invoker;

#[derive(Debug, clap::Args)]
pub struct Create {
	/// The name of the room, a random element when omitted
	name: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct Created {
	room: RoomName,
}

impl Invokable for Create {
	async fn invoke(&self, invoker: &mut Invoker, _: &Cli) -> anyhow::Result<()> {
		let room = invoker
			.sync()
			.create_room(self.name.as_deref())
			.await
			.map_err(check_credential)
			.context("failed to create room")?;

		invoker.display(&Created { room })?;

		Ok(())
	}
}
