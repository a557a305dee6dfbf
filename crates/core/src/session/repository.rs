//! Session persistence facade over the key-value store.

use std::sync::Arc;
use std::time::SystemTime;

use serde_json::Value;

use super::model::{LinkRecord, Session, expiry_from_epoch, expiry_to_epoch};
use crate::cookies::SESSION_COOKIE_NAME;
use crate::error::Result;
use crate::store::KeyValueStore;

/// Namespace of the scalar session fields.
pub const SESSION_PREFIX: &str = "doorkey.session.";
/// Namespace of domain-scoped cookie entries.
pub const COOKIE_PREFIX: &str = "doorkey.cookie.";

const LAST_SYNC_KEY: &str = "doorkey.sync.last_sync";

fn session_key(field: &str) -> String {
	format!("{SESSION_PREFIX}{field}")
}

fn cookie_key(host: &str, field: &str) -> String {
	format!("{COOKIE_PREFIX}{SESSION_COOKIE_NAME}@{host}.{field}")
}

/// Maps [`Session`] and [`LinkRecord`] onto store keys.
///
/// Scalars (`link`, `door_id`, `base_host`, `path_hint`, `configured`) live
/// under [`SESSION_PREFIX`]; the cookie value and expiry live under
/// [`COOKIE_PREFIX`] keyed by cookie name and host.
#[derive(Clone)]
pub struct SessionRepository {
	store: Arc<dyn KeyValueStore>,
}

impl SessionRepository {
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store }
	}

	pub fn store(&self) -> &Arc<dyn KeyValueStore> {
		&self.store
	}

	/// Loads the persisted session; missing keys read as empty.
	pub fn load(&self) -> (Session, LinkRecord) {
		let text = |field: &str| self.store.get_string(&session_key(field)).unwrap_or_default();
		let base_host = text("base_host");
		let (cookie_value, cookie_expiry) = if base_host.is_empty() {
			(String::new(), None)
		} else {
			(
				self.store.get_string(&cookie_key(&base_host, "value")).unwrap_or_default(),
				self.store.get_f64(&cookie_key(&base_host, "expiry")).and_then(expiry_from_epoch),
			)
		};
		let session = Session {
			door_id: text("door_id"),
			base_host,
			cookie_value,
			cookie_expiry,
			configured: self.store.get_bool(&session_key("configured")).unwrap_or(false),
		};
		let link = LinkRecord {
			link: text("link"),
			path_hint: text("path_hint"),
		};
		(session, link)
	}

	/// Writes every field and synchronizes the store.
	pub fn save(&self, session: &Session, link: &LinkRecord) -> Result<()> {
		self.store.set(&session_key("link"), Value::from(link.link.as_str()));
		self.store.set(&session_key("door_id"), Value::from(session.door_id.as_str()));
		self.store.set(&session_key("base_host"), Value::from(session.base_host.as_str()));
		self.store.set(&session_key("path_hint"), Value::from(link.path_hint.as_str()));
		self.store.set(&session_key("configured"), Value::Bool(session.configured));

		for key in self.store.keys_with_prefix(COOKIE_PREFIX) {
			self.store.remove(&key);
		}
		if !session.base_host.is_empty() && !session.cookie_value.is_empty() {
			self.store.set(&cookie_key(&session.base_host, "value"), Value::from(session.cookie_value.as_str()));
			self.store.set(&cookie_key(&session.base_host, "expiry"), Value::from(expiry_to_epoch(session.cookie_expiry)));
		}
		self.store.synchronize()
	}

	/// Removes every session and cookie key.
	pub fn clear(&self) -> Result<()> {
		for prefix in [SESSION_PREFIX, COOKIE_PREFIX] {
			for key in self.store.keys_with_prefix(prefix) {
				self.store.remove(&key);
			}
		}
		self.store.remove(LAST_SYNC_KEY);
		self.store.synchronize()
	}

	/// Re-reads the backing store before the next [`load`](Self::load).
	pub fn reload(&self) {
		self.store.reload();
	}

	pub fn last_sync(&self) -> Option<SystemTime> {
		self.store.get_f64(LAST_SYNC_KEY).and_then(expiry_from_epoch)
	}

	pub fn record_sync(&self, at: SystemTime) -> Result<()> {
		self.store.set(LAST_SYNC_KEY, Value::from(expiry_to_epoch(Some(at))));
		self.store.synchronize()
	}
}

#[cfg(test)]
mod tests {
	use std::time::{Duration, UNIX_EPOCH};

	use super::*;
	use crate::store::MemoryStore;

	fn repository() -> (SessionRepository, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::new());
		(SessionRepository::new(store.clone()), store)
	}

	#[test]
	fn empty_store_loads_default_session() {
		let (repo, _) = repository();
		let (session, link) = repo.load();
		assert_eq!(session, Session::default());
		assert_eq!(link, LinkRecord::default());
	}

	#[test]
	fn save_then_load_returns_same_snapshot() {
		let (repo, store) = repository();
		let session = Session {
			door_id: "ROOM9".into(),
			base_host: "hotel.example".into(),
			cookie_value: "abc".into(),
			cookie_expiry: Some(UNIX_EPOCH + Duration::from_secs(1_900_000_000)),
			configured: true,
		};
		let link = LinkRecord {
			link: "https://k3y.in/xyz".into(),
			path_hint: "/login/mybook/ROOM9/".into(),
		};
		repo.save(&session, &link).unwrap();

		assert_eq!(store.get_string("doorkey.cookie.PHPSESSID@hotel.example.value").as_deref(), Some("abc"));
		assert_eq!(repo.load(), (session, link));
	}

	#[test]
	fn host_change_drops_old_cookie_entries() {
		let (repo, store) = repository();
		let mut session = Session {
			door_id: "ROOM9".into(),
			base_host: "old.example".into(),
			cookie_value: "abc".into(),
			cookie_expiry: None,
			configured: true,
		};
		repo.save(&session, &LinkRecord::default()).unwrap();
		session.base_host = "new.example".into();
		repo.save(&session, &LinkRecord::default()).unwrap();

		let cookie_keys = store.keys_with_prefix(COOKIE_PREFIX);
		assert!(cookie_keys.iter().all(|k| k.contains("@new.example.")), "{cookie_keys:?}");
	}

	#[test]
	fn clear_removes_everything() {
		let (repo, store) = repository();
		let session = Session {
			door_id: "ROOM9".into(),
			base_host: "hotel.example".into(),
			cookie_value: "abc".into(),
			cookie_expiry: None,
			configured: true,
		};
		repo.save(&session, &LinkRecord::default()).unwrap();
		repo.record_sync(SystemTime::now()).unwrap();
		repo.clear().unwrap();

		assert!(store.keys_with_prefix("doorkey.").is_empty());
		assert_eq!(repo.last_sync(), None);
	}
}
