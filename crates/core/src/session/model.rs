use std::time::{Duration, SystemTime, UNIX_EPOCH};

use url::Url;

use crate::error::{Result, SessionError};

/// One authenticated door-access grant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
	pub door_id: String,
	/// Bare hostname, no scheme or slashes.
	pub base_host: String,
	pub cookie_value: String,
	/// `None` means session-scoped: valid until explicitly invalidated.
	pub cookie_expiry: Option<SystemTime>,
	pub configured: bool,
}

impl Session {
	pub fn is_valid_at(&self, now: SystemTime) -> bool {
		!self.cookie_value.is_empty() && self.cookie_expiry.is_none_or(|expiry| now < expiry)
	}

	pub fn is_valid(&self) -> bool {
		self.is_valid_at(SystemTime::now())
	}

	/// `https://{host}/myaccount/key/unlock/`
	pub fn unlock_url(&self) -> Option<Url> {
		self.endpoint("/myaccount/key/unlock/")
	}

	/// `https://{host}/myaccount/`
	pub fn refresh_url(&self) -> Option<Url> {
		self.endpoint("/myaccount/")
	}

	fn endpoint(&self, path: &str) -> Option<Url> {
		if self.base_host.is_empty() {
			return None;
		}
		Url::parse(&format!("https://{}{path}", self.base_host)).ok()
	}

	/// Same grant with cookie and expiry dropped.
	pub fn without_cookie(&self) -> Session {
		Session {
			cookie_value: String::new(),
			cookie_expiry: None,
			..self.clone()
		}
	}

	/// Checks that a configured session names its door and host.
	pub fn validate(&self) -> Result<()> {
		if self.configured && self.door_id.is_empty() {
			return Err(SessionError::InvalidSession("configured session without a door id".into()));
		}
		if self.configured && self.base_host.is_empty() {
			return Err(SessionError::InvalidSession("configured session without a host".into()));
		}
		Ok(())
	}

	/// Host normalized and expiry rounded to what persistence can represent.
	pub(crate) fn normalized(mut self) -> Session {
		self.base_host = normalize_host(&self.base_host);
		self.cookie_expiry = expiry_from_epoch(expiry_to_epoch(self.cookie_expiry));
		self
	}
}

/// Link the session was set up from, plus the final path of its walk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkRecord {
	pub link: String,
	pub path_hint: String,
}

/// Strips scheme, path and slashes from a host-ish string.
pub fn normalize_host(raw: &str) -> String {
	let trimmed = raw.trim();
	let without_scheme = ["https://", "http://"]
		.iter()
		.find_map(|scheme| {
			trimmed
				.get(..scheme.len())
				.filter(|prefix| prefix.eq_ignore_ascii_case(scheme))
				.map(|_| &trimmed[scheme.len()..])
		})
		.unwrap_or(trimmed);
	let host = without_scheme.trim_start_matches('/');
	let host = host.split(['/', '?', '#']).next().unwrap_or_default();
	host.to_ascii_lowercase()
}

/// Expiry as epoch seconds; `0.0` for session-scoped cookies.
pub fn expiry_to_epoch(expiry: Option<SystemTime>) -> f64 {
	expiry
		.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
		.map(|d| (d.as_millis() as f64) / 1000.0)
		.unwrap_or(0.0)
}

/// Inverse of [`expiry_to_epoch`], at millisecond precision.
pub fn expiry_from_epoch(seconds: f64) -> Option<SystemTime> {
	if !seconds.is_finite() || seconds <= 0.0 {
		return None;
	}
	Some(UNIX_EPOCH + Duration::from_millis((seconds * 1000.0).round() as u64))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn session(cookie: &str, expiry: Option<SystemTime>) -> Session {
		Session {
			door_id: "ROOM1".into(),
			base_host: "hotel.example".into(),
			cookie_value: cookie.into(),
			cookie_expiry: expiry,
			configured: true,
		}
	}

	#[test]
	fn empty_cookie_is_never_valid() {
		let far_future = SystemTime::now() + Duration::from_secs(86_400);
		assert!(!session("", None).is_valid());
		assert!(!session("", Some(far_future)).is_valid());
	}

	#[test]
	fn validity_follows_expiry() {
		let now = SystemTime::now();
		assert!(session("abc", None).is_valid_at(now));
		assert!(session("abc", Some(now + Duration::from_secs(1))).is_valid_at(now));
		assert!(!session("abc", Some(now)).is_valid_at(now));
		assert!(!session("abc", Some(now - Duration::from_secs(1))).is_valid_at(now));
	}

	#[test]
	fn endpoints_derive_from_host() {
		let s = session("abc", None);
		assert_eq!(s.unlock_url().unwrap().as_str(), "https://hotel.example/myaccount/key/unlock/");
		assert_eq!(s.refresh_url().unwrap().as_str(), "https://hotel.example/myaccount/");
		assert_eq!(Session::default().unlock_url(), None);
		assert_eq!(Session::default().refresh_url(), None);
	}

	#[test]
	fn configured_requires_door_and_host() {
		assert!(session("abc", None).validate().is_ok());
		assert!(Session::default().validate().is_ok());
		let missing_door = Session {
			door_id: String::new(),
			..session("abc", None)
		};
		assert!(matches!(missing_door.validate(), Err(SessionError::InvalidSession(_))));
	}

	#[test]
	fn hosts_normalize() {
		assert_eq!(normalize_host("https://Hotel.Example/"), "hotel.example");
		assert_eq!(normalize_host("hotel.example"), "hotel.example");
		assert_eq!(normalize_host(" http://hotel.example/myaccount/ "), "hotel.example");
		assert_eq!(normalize_host("//hotel.example"), "hotel.example");
		assert_eq!(normalize_host(""), "");
	}

	#[test]
	fn epoch_conversion_keeps_none_as_zero() {
		assert_eq!(expiry_to_epoch(None), 0.0);
		assert_eq!(expiry_from_epoch(0.0), None);
		assert_eq!(expiry_from_epoch(-5.0), None);
		let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
		assert_eq!(expiry_from_epoch(expiry_to_epoch(Some(t))), Some(t));
	}
}
