use std::io::Write;
use std::time::Duration;

use chat_sync::substrate::{BusConfig, CacheConfig, NatsConfig};
use common::logging::Mode;
use common::settings::SettingsParser;

use crate::config::{ChatConfig, ENV_PREFIX};

fn parse(file: Option<&str>, env: &[(&str, &str)]) -> ChatConfig {
	let mut parser = SettingsParser::new(&ChatConfig::default()).unwrap();

	if let Some(file) = file {
		parser.merge_str(file).unwrap();
	}

	parser
		.merge_env(
			ENV_PREFIX,
			env.iter().map(|(key, value)| (key.to_string(), value.to_string())),
		)
		.unwrap();

	parser.parse().unwrap()
}

#[test]
fn test_defaults() {
	let config = parse(None, &[]);

	assert_eq!(config, ChatConfig::default());
	assert_eq!(config.bus, BusConfig::Nats(NatsConfig::default()));
	assert_eq!(config.sync.history_retention, Duration::from_secs(3600));
	assert_eq!(config.sync.directory_retention, Duration::from_secs(3600));
	assert_eq!(config.auth.token_ttl, Duration::from_secs(3600));
	assert_eq!(config.logging.mode, Mode::Compact);
}

#[test]
fn test_file_selects_memory_backends() {
	let config = parse(
		Some(
			r#"
bus:
  kind: memory
cache:
  kind: memory
sync:
  history_retention: 10m
auth:
  display_name: fox
"#,
		),
		&[],
	);

	assert_eq!(config.bus, BusConfig::Memory);
	assert_eq!(config.cache, CacheConfig::Memory);
	assert_eq!(config.sync.history_retention, Duration::from_secs(600));
	assert_eq!(config.sync.directory_retention, Duration::from_secs(3600));
	assert_eq!(config.auth.display_name.as_deref(), Some("fox"));
}

#[test]
fn test_env_overrides_file() {
	let config = parse(
		Some("logging:\n  level: info\n"),
		&[
			("CHAT_LOGGING__LEVEL", "chat_sync=debug"),
			("CHAT_AUTH__TOKEN", "secret"),
			("CHAT_AUTH__TOKEN_TTL", "30m"),
			("CHAT_SYNC__FEED_CAPACITY", "16"),
			("OTHER_LOGGING__LEVEL", "trace"),
		],
	);

	assert_eq!(config.logging.level, "chat_sync=debug");
	assert_eq!(config.auth.token.as_deref(), Some("secret"));
	assert_eq!(config.auth.token_ttl, Duration::from_secs(1800));
	assert_eq!(config.sync.feed_capacity, 16);
}

#[test]
fn test_load_from_file() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	writeln!(file, "cache:\n  kind: redis\n  url: redis://cache:6379").unwrap();

	let config = ChatConfig::load(Some(file.path())).unwrap();

	let CacheConfig::Redis(redis) = config.cache else {
		panic!("expected a redis cache, got {:?}", config.cache);
	};
	assert_eq!(redis.url, "redis://cache:6379");
}
