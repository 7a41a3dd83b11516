use anyhow::Context;
use chat_sync::{RoomName, SessionState, SyncError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::select;

use super::check_credential;
use crate::cli::{Cli, Invokable};
use crate::invoker::Invoker;

/// Prints the directory whenever it changes. Reads `/create [NAME]`,
/// `/refresh` and `/leave` from stdin.
#[derive(Debug, clap::Args)]
pub struct Lobby {}

impl Invokable for Lobby {
	async fn invoke(&self, invoker: &mut Invoker, _: &Cli) -> anyhow::Result<()> {
		let session = invoker
			.sync()
			.enter_lobby()
			.await
			.map_err(check_credential)
			.context("failed to enter lobby")?;

		let mut view = session.view();
		let mut lines = BufReader::new(tokio::io::stdin()).lines();
		let mut stdin_open = true;
		let mut shown: Option<Vec<RoomName>> = None;

		loop {
			let current = view.borrow_and_update().clone();

			if current.state == SessionState::Live && shown.as_ref() != Some(&current.rooms) {
				invoker.display(&current.rooms)?;
				shown = Some(current.rooms);
			}

			match current.state {
				SessionState::Expired => return Err(check_credential(SyncError::ExpiredCredential)),
				SessionState::Closed => break,
				_ => {}
			}

			select! {
				changed = view.changed() => {
					if changed.is_err() {
						break;
					}
				}
				line = lines.next_line(), if stdin_open => {
					let Some(line) = line.context("failed to read stdin")? else {
						// Keep watching once stdin is exhausted.
						stdin_open = false;
						continue;
					};

					let mut words = line.split_whitespace();
					match (words.next(), words.next()) {
						(Some("/create"), name) => match session.create_room(name).await {
							Ok(room) => tracing::info!(%room, "room created"),
							Err(err) if err.requires_reauthentication() => return Err(check_credential(err)),
							Err(err) => eprintln!("room not created: {err}"),
						},
						(Some("/refresh"), _) => session.refresh(),
						(Some("/leave"), _) => break,
						(None, _) => {}
						(Some(other), _) => eprintln!("unknown command {other}, expected /create, /refresh or /leave"),
					}
				}
				_ = tokio::signal::ctrl_c() => break,
			}
		}

		session.leave();
		session.closed().await;

		Ok(())
	}
}
