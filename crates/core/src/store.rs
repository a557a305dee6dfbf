//! Opaque key-value persistence behind the session repository.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;

/// Get/set/synchronize store. Writes may be buffered until [`synchronize`].
///
/// [`synchronize`]: KeyValueStore::synchronize
pub trait KeyValueStore: Send + Sync {
	fn get(&self, key: &str) -> Option<Value>;
	fn set(&self, key: &str, value: Value);
	fn remove(&self, key: &str);
	/// Keys starting with `prefix`, sorted.
	fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
	fn synchronize(&self) -> Result<()>;

	/// Drops buffered state and re-reads the backing medium, if any.
	fn reload(&self) {}

	fn get_string(&self, key: &str) -> Option<String> {
		match self.get(key)? {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	fn get_bool(&self, key: &str) -> Option<bool> {
		self.get(key)?.as_bool()
	}

	fn get_f64(&self, key: &str) -> Option<f64> {
		self.get(key)?.as_f64()
	}
}

/// Volatile store for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
	values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl KeyValueStore for MemoryStore {
	fn get(&self, key: &str) -> Option<Value> {
		self.values.lock().get(key).cloned()
	}

	fn set(&self, key: &str, value: Value) {
		self.values.lock().insert(key.to_string(), value);
	}

	fn remove(&self, key: &str) {
		self.values.lock().remove(key);
	}

	fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
		self.values.lock().keys().filter(|k| k.starts_with(prefix)).cloned().collect()
	}

	fn synchronize(&self) -> Result<()> {
		Ok(())
	}
}

/// Flat JSON object on disk.
///
/// A missing or unreadable file loads as an empty store; the next
/// [`synchronize`](KeyValueStore::synchronize) rewrites it.
#[derive(Debug)]
pub struct JsonFileStore {
	path: PathBuf,
	values: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
	pub fn open(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let values = load_map(&path);
		debug!(target = "doorkey.session", path = %path.display(), keys = values.len(), "opened state store");
		Self {
			path,
			values: Mutex::new(values),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

fn load_map(path: &Path) -> BTreeMap<String, Value> {
	let Ok(content) = fs::read_to_string(path) else {
		return BTreeMap::new();
	};
	match serde_json::from_str(&content) {
		Ok(map) => map,
		Err(err) => {
			warn!(target = "doorkey.session", path = %path.display(), error = %err, "ignoring unreadable state file");
			BTreeMap::new()
		}
	}
}

impl KeyValueStore for JsonFileStore {
	fn get(&self, key: &str) -> Option<Value> {
		self.values.lock().get(key).cloned()
	}

	fn set(&self, key: &str, value: Value) {
		self.values.lock().insert(key.to_string(), value);
	}

	fn remove(&self, key: &str) {
		self.values.lock().remove(key);
	}

	fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
		self.values.lock().keys().filter(|k| k.starts_with(prefix)).cloned().collect()
	}

	fn synchronize(&self) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent)?;
		}
		let json = serde_json::to_string_pretty(&*self.values.lock())?;
		fs::write(&self.path, json)?;
		Ok(())
	}

	fn reload(&self) {
		*self.values.lock() = load_map(&self.path);
	}
}
