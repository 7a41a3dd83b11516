use anyhow::Context;
use chat_sync::{SessionState, SyncError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::select;

use super::check_credential;
use crate::cli::{Cli, Invokable};
use crate::invoker::Invoker;

#[derive(Debug, clap::Args)]
pub struct Join {
	/// The room to enter
	room: String,

	/// Only print messages that arrive after entering
	#[clap(long)]
	no_history: bool,
}

impl Invokable for Join {
	async fn invoke(&self, invoker: &mut Invoker, _: &Cli) -> anyhow::Result<()> {
		let session = invoker
			.sync()
			.enter_room(&self.room)
			.await
			.map_err(check_credential)
			.context("failed to enter room")?;

		let mut view = session.view();
		let mut lines = BufReader::new(tokio::io::stdin()).lines();
		let mut skip_history = self.no_history;
		let mut printed = 0;

		loop {
			let current = view.borrow_and_update().clone();

			// Only prepends happen once live, so the unseen messages are the
			// first ones.
			if current.state == SessionState::Live || current.state.is_terminal() {
				let fresh = current.messages.len().saturating_sub(printed);

				if !std::mem::take(&mut skip_history) {
					for message in current.messages[..fresh].iter().rev() {
						invoker.line(message)?;
					}
				}

				printed = current.messages.len();
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
				line = lines.next_line() => match line.context("failed to read stdin")? {
					Some(line) if line.trim() == "/leave" => break,
					Some(line) if line.trim().is_empty() => {}
					Some(line) => match session.send(line).await {
						Ok(_) => {}
						Err(SyncError::InvalidMessage(reason)) => eprintln!("message not sent: {reason}"),
						Err(err) if err.requires_reauthentication() => return Err(check_credential(err)),
						Err(err) => tracing::warn!(error = %err, "message was not delivered"),
					},
					None => break,
				},
				_ = tokio::signal::ctrl_c() => break,
			}
		}

		session.leave();
		session.closed().await;

		Ok(())
	}
}
