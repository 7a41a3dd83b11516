use std::path::PathBuf;
use std::time::Duration;

use crate::invoker::Invoker;

pub mod create;
pub mod history;
pub mod join;
pub mod lobby;
pub mod rooms;

/// Chat in rooms shared over a pub/sub bus and a cache
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
	/// The configuration file path
	#[clap(long, env = "CHAT_CONFIG_PATH")]
	pub config: Option<PathBuf>,

	/// Json output
	#[clap(long)]
	pub json: bool,

	/// The name shown next to your messages
	#[clap(long, env = "CHAT_DISPLAY_NAME")]
	pub name: Option<String>,

	/// The bearer token presented to the bus
	#[clap(long, env = "CHAT_TOKEN")]
	pub token: Option<String>,

	/// How long the token stays valid, for example `30m`
	#[clap(long, value_parser = humantime::parse_duration)]
	pub token_ttl: Option<Duration>,

	#[clap(subcommand)]
	pub command: Commands,
}

pub trait Invokable {
	async fn invoke(&self, invoker: &mut Invoker, args: &Cli) -> anyhow::Result<()>;
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
	/// List the known rooms
	Rooms(rooms::Rooms),

	/// Create a room
	Create(create::Create),

	/// Print a room's history
	History(history::History),

	/// Enter a room and chat, one message per line
	Join(join::Join),

	/// Watch the room directory live
	Lobby(lobby::Lobby),
}

impl Invokable for Commands {
	async fn invoke(&self, invoker: &mut Invoker, args: &Cli) -> anyhow::Result<()> {
		match self {
			Self::Rooms(cmd) => cmd.invoke(invoker, args).await,
			Self::Create(cmd) => cmd.invoke(invoker, args).await,
			Self::History(cmd) => cmd.invoke(invoker, args).await,
			Self::Join(cmd) => cmd.invoke(invoker, args).await,
			Self::Lobby(cmd) => cmd.invoke(invoker, args).await,
		}
	}
}

/// Turns a credential failure into the one error the user has to act on.
pub fn check_credential(err: chat_sync::SyncError) -> anyhow::Error {
	if err.requires_reauthentication() {
		anyhow::anyhow!("{err}: log in again with a fresh --token")
	} else {
		err.into()
	}
}
