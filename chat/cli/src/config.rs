use std::path::Path;
use std::time::Duration;

use chat_sync::substrate::{BusConfig, CacheConfig};
use chat_sync::SyncOptions;
use common::logging;
use common::settings::{self, SettingsError};

/// Prefix of environment overrides, for example `CHAT_BUS__KIND=memory`.
pub const ENV_PREFIX: &str = "CHAT";

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ChatConfig {
	pub logging: LoggingConfig,
	pub bus: BusConfig,
	pub cache: CacheConfig,
	pub sync: SyncOptions,
	pub auth: AuthConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
	/// An env filter, for example `chat_sync=debug,warn`
	pub level: String,
	pub mode: logging::Mode,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "warn".to_owned(),
			mode: logging::Mode::Compact,
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AuthConfig {
	/// Bearer token presented to the bus
	pub token: Option<String>,
	/// Name shown next to sent messages, random when unset
	pub display_name: Option<String>,
	/// How long the credential stays valid
	#[serde(with = "humantime_serde")]
	pub token_ttl: Duration,
}

impl Default for AuthConfig {
	fn default() -> Self {
		Self {
			token: None,
			display_name: None,
			token_ttl: Duration::from_secs(3600),
		}
	}
}

impl ChatConfig {
	pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
		settings::load(&Self::default(), path, ENV_PREFIX)
	}
}
