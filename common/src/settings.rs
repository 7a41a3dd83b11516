use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("failed to read {path}: {source}")]
	Read {
		path: String,
		source: std::io::Error,
	},
	#[error("yaml: {0}")]
	Yaml(#[from] serde_yaml::Error),
	#[error("invalid override {0}: empty key segment")]
	Override(String),
}

/// Layers settings sources over a serialized default value.
///
/// Sources are applied in call order, later ones win. Mappings are merged key
/// by key, every other value is replaced wholesale.
#[derive(Debug, Clone)]
pub struct SettingsParser<S> {
	root: Value,
	_marker: std::marker::PhantomData<S>,
}

impl<S> SettingsParser<S>
where
	S: Serialize + DeserializeOwned,
{
	pub fn new(default: &S) -> Result<Self, SettingsError> {
		Ok(Self {
			root: serde_yaml::to_value(default)?,
			_marker: std::marker::PhantomData,
		})
	}

	pub fn merge_str(&mut self, source: &str) -> Result<(), SettingsError> {
		let incoming: Value = serde_yaml::from_str(source)?;
		// An empty document parses as null and should not clobber the defaults.
		if !incoming.is_null() {
			self.merge(incoming);
		}
		Ok(())
	}

	pub fn merge_file(&mut self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
			path: path.display().to_string(),
			source,
		})?;

		self.merge_str(&source)
	}

	/// Applies `<PREFIX>_<SECTION>__<FIELD>=<value>` overrides. Values are
	/// parsed as yaml scalars so numbers and booleans keep their type.
	pub fn merge_env<I>(&mut self, prefix: &str, vars: I) -> Result<(), SettingsError>
	where
		I: IntoIterator<Item = (String, String)>,
	{
		let prefix = format!("{}_", prefix.to_uppercase());

		for (key, raw) in vars {
			let Some(path) = key.strip_prefix(&prefix) else {
				continue;
			};

			let segments = path.split("__").map(str::to_lowercase).collect::<Vec<_>>();
			if segments.iter().any(String::is_empty) {
				return Err(SettingsError::Override(key));
			}

			let value = serde_yaml::from_str::<Value>(&raw).unwrap_or(Value::String(raw));

			tracing::debug!(key = %key, "applying settings override");
			self.merge(nest(&segments, value));
		}

		Ok(())
	}

	pub fn parse(self) -> Result<S, SettingsError> {
		Ok(serde_yaml::from_value(self.root)?)
	}

	fn merge(&mut self, incoming: Value) {
		let root = std::mem::take(&mut self.root);
		self.root = merge_values(root, incoming);
	}
}

fn merge_values(root: Value, incoming: Value) -> Value {
	match (root, incoming) {
		(Value::Mapping(mut base), Value::Mapping(incoming)) => {
			for (key, value) in incoming {
				let merged = match base.remove(&key) {
					Some(existing) => merge_values(existing, value),
					None => value,
				};
				base.insert(key, merged);
			}
			Value::Mapping(base)
		}
		(_, incoming) => incoming,
	}
}

fn nest(segments: &[String], value: Value) -> Value {
	segments.iter().rev().fold(value, |inner, segment| {
		let mut map = Mapping::new();
		map.insert(Value::String(segment.clone()), inner);
		Value::Mapping(map)
	})
}

/// Defaults, then the optional file, then the process environment.
pub fn load<S>(default: &S, file: Option<&Path>, env_prefix: &str) -> Result<S, SettingsError>
where
	S: Serialize + DeserializeOwned,
{
	let mut parser = SettingsParser::new(default)?;

	if let Some(file) = file {
		parser.merge_file(file)?;
	}

	parser.merge_env(env_prefix, std::env::vars())?;
	parser.parse()
}
