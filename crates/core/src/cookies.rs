//! Process-wide cookie jar fed by `Set-Cookie` headers.
//!
//! The jar is shared through `Arc` between the [`BrowserClient`] (which
//! attaches and records cookies on every hop) and the session service (which
//! materializes the persisted vendor cookie back into it at startup).
//!
//! [`BrowserClient`]: crate::client::BrowserClient

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDateTime};
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

/// Name of the vendor session cookie.
pub const SESSION_COOKIE_NAME: &str = "PHPSESSID";

/// A cookie as held by the jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
	pub name: String,
	pub value: String,
	/// Lowercase domain without a leading dot.
	pub domain: String,
	/// Set without a `Domain` attribute: only sent back to the exact host.
	pub host_only: bool,
	pub path: String,
	/// `None` for session-scoped cookies.
	pub expires: Option<SystemTime>,
}

impl StoredCookie {
	pub fn is_expired_at(&self, now: SystemTime) -> bool {
		self.expires.is_some_and(|expires| expires <= now)
	}

	/// Loose ownership check used for the vendor cookie: either side may be
	/// the parent domain of the other.
	pub fn belongs_to(&self, host: &str) -> bool {
		host_within(host, &self.domain) || host_within(&self.domain, host)
	}

	fn matches(&self, url: &Url) -> bool {
		let Some(host) = url.host_str() else {
			return false;
		};
		let domain_ok = if self.host_only {
			host.eq_ignore_ascii_case(&self.domain)
		} else {
			host_within(host, &self.domain)
		};
		domain_ok && path_within(url.path(), &self.path)
	}

	fn same_slot(&self, other: &StoredCookie) -> bool {
		self.name == other.name && self.domain == other.domain && self.path == other.path
	}
}

/// Shared cookie store.
#[derive(Debug, Default)]
pub struct CookieJar {
	cookies: Mutex<Vec<StoredCookie>>,
}

impl CookieJar {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces a cookie. An already-expired cookie only deletes
	/// the slot it names.
	pub fn store(&self, cookie: StoredCookie) {
		let mut cookies = self.cookies.lock();
		cookies.retain(|existing| !existing.same_slot(&cookie));
		if !cookie.is_expired_at(SystemTime::now()) {
			cookies.push(cookie);
		}
	}

	/// Parses and stores every `Set-Cookie` value received for `url`.
	///
	/// Returns how many headers were understood.
	pub fn record_set_cookies<'a>(&self, url: &Url, headers: impl IntoIterator<Item = &'a str>) -> usize {
		let now = SystemTime::now();
		let mut recorded = 0;
		for header in headers {
			match parse_set_cookie(header, url, now) {
				Some(cookie) => {
					debug!(target = "doorkey.net", name = %cookie.name, domain = %cookie.domain, session = cookie.expires.is_none(), "cookie recorded");
					self.store(cookie);
					recorded += 1;
				}
				None => debug!(target = "doorkey.net", url = %url, "ignoring unparseable Set-Cookie"),
			}
		}
		recorded
	}

	/// Builds the `Cookie` header value the jar would send to `url`.
	pub fn cookie_header(&self, url: &Url) -> Option<String> {
		let now = SystemTime::now();
		let mut matching: Vec<StoredCookie> = self
			.cookies
			.lock()
			.iter()
			.filter(|cookie| !cookie.is_expired_at(now) && cookie.matches(url))
			.cloned()
			.collect();
		if matching.is_empty() {
			return None;
		}
		matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
		let pairs: Vec<String> = matching.iter().map(|c| format!("{}={}", c.name, c.value)).collect();
		Some(pairs.join("; "))
	}

	/// Returns the live vendor cookie for `host`, if any.
	pub fn session_cookie(&self, host: &str) -> Option<StoredCookie> {
		let now = SystemTime::now();
		self.cookies
			.lock()
			.iter()
			.filter(|cookie| cookie.name == SESSION_COOKIE_NAME && !cookie.is_expired_at(now) && cookie.belongs_to(host))
			.max_by_key(|cookie| cookie.domain.len())
			.cloned()
	}

	/// Plants the vendor cookie for `host` and its subdomains at path `/`.
	pub fn set_session_cookie(&self, host: &str, value: &str, expires: Option<SystemTime>) {
		self.store(StoredCookie {
			name: SESSION_COOKIE_NAME.to_string(),
			value: value.to_string(),
			domain: host.trim_start_matches('.').to_ascii_lowercase(),
			host_only: false,
			path: "/".to_string(),
			expires,
		});
	}

	/// Deletes vendor cookies belonging to `host`, or every vendor cookie
	/// when no host is configured.
	pub fn remove_session_cookies(&self, host: Option<&str>) -> usize {
		let mut cookies = self.cookies.lock();
		let before = cookies.len();
		cookies.retain(|cookie| {
			if cookie.name != SESSION_COOKIE_NAME {
				return true;
			}
			match host {
				Some(host) if !host.is_empty() => !cookie.belongs_to(host),
				_ => false,
			}
		});
		before - cookies.len()
	}

	pub fn cookies(&self) -> Vec<StoredCookie> {
		self.cookies.lock().clone()
	}

	pub fn len(&self) -> usize {
		self.cookies.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.cookies.lock().is_empty()
	}
}

/// Parses one `Set-Cookie` header received from `url`.
///
/// Returns `None` for malformed pairs and for `Domain` attributes the
/// responding host does not belong to.
pub fn parse_set_cookie(header: &str, url: &Url, now: SystemTime) -> Option<StoredCookie> {
	let mut parts = header.split(';');
	let (name, value) = parts.next()?.trim().split_once('=')?;
	let name = name.trim();
	if name.is_empty() {
		return None;
	}
	let host = url.host_str()?.to_ascii_lowercase();

	let mut domain = None;
	let mut path = None;
	let mut expires = None;
	let mut max_age: Option<i64> = None;
	for attr in parts {
		let attr = attr.trim();
		let (key, val) = attr.split_once('=').map(|(k, v)| (k.trim(), v.trim())).unwrap_or((attr, ""));
		match key.to_ascii_lowercase().as_str() {
			"domain" if !val.is_empty() => domain = Some(val.trim_start_matches('.').to_ascii_lowercase()),
			"path" if val.starts_with('/') => path = Some(val.to_string()),
			"expires" => expires = parse_cookie_date(val),
			"max-age" => max_age = val.parse().ok(),
			_ => {}
		}
	}

	if let Some(domain) = &domain {
		if !host_within(&host, domain) {
			return None;
		}
	}

	// Max-Age wins over Expires.
	let expires = match max_age {
		Some(secs) if secs <= 0 => Some(UNIX_EPOCH),
		Some(secs) => Some(now + Duration::from_secs(secs.unsigned_abs())),
		None => expires,
	};

	Some(StoredCookie {
		name: name.to_string(),
		value: value.trim().trim_matches('"').to_string(),
		host_only: domain.is_none(),
		domain: domain.unwrap_or(host),
		path: path.unwrap_or_else(|| default_path(url)),
		expires,
	})
}

fn parse_cookie_date(value: &str) -> Option<SystemTime> {
	if let Ok(date) = DateTime::parse_from_rfc2822(value) {
		return Some(date.into());
	}
	// PHP emits `Thu, 01-Jan-2026 00:00:00 GMT`.
	NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
		.ok()
		.map(|naive| naive.and_utc().into())
}

fn default_path(url: &Url) -> String {
	let path = url.path();
	match path.rfind('/') {
		Some(0) | None => "/".to_string(),
		Some(idx) => path[..idx].to_string(),
	}
}

fn host_within(host: &str, domain: &str) -> bool {
	let host = host.trim_start_matches('.').to_ascii_lowercase();
	let domain = domain.trim_start_matches('.').to_ascii_lowercase();
	!domain.is_empty() && (host == domain || host.ends_with(&format!(".{domain}")))
}

fn path_within(request_path: &str, cookie_path: &str) -> bool {
	if request_path == cookie_path {
		return true;
	}
	request_path.starts_with(cookie_path) && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn url(s: &str) -> Url {
		Url::parse(s).unwrap()
	}

	#[test]
	fn parses_php_session_cookie_with_attributes() {
		let now = SystemTime::now();
		let cookie = parse_set_cookie(
			"PHPSESSID=abc123; path=/; domain=.pynguest.app; HttpOnly; Max-Age=3600",
			&url("https://hotel.pynguest.app/login/mybook/1858-4537-74a1/"),
			now,
		)
		.unwrap();

		assert_eq!(cookie.name, "PHPSESSID");
		assert_eq!(cookie.value, "abc123");
		assert_eq!(cookie.domain, "pynguest.app");
		assert!(!cookie.host_only);
		assert_eq!(cookie.path, "/");
		assert_eq!(cookie.expires, Some(now + Duration::from_secs(3600)));
	}

	#[test]
	fn parses_dashed_expires_dates() {
		let cookie = parse_set_cookie(
			"PHPSESSID=v; expires=Fri, 01-Jan-2100 00:00:00 GMT; path=/",
			&url("https://hotel.example/"),
			SystemTime::now(),
		)
		.unwrap();
		let expires = cookie.expires.unwrap();
		assert!(expires > SystemTime::now());
	}

	#[test]
	fn parses_rfc_expires_dates() {
		let cookie = parse_set_cookie(
			"id=v; Expires=Wed, 21 Oct 2015 07:28:00 GMT",
			&url("https://hotel.example/a/b"),
			SystemTime::now(),
		)
		.unwrap();
		assert!(cookie.is_expired_at(SystemTime::now()));
		assert_eq!(cookie.path, "/a");
		assert!(cookie.host_only);
	}

	#[test]
	fn rejects_foreign_domain_attribute() {
		assert!(parse_set_cookie("PHPSESSID=v; Domain=evil.example", &url("https://hotel.example/"), SystemTime::now()).is_none());
		assert!(parse_set_cookie("=v", &url("https://hotel.example/"), SystemTime::now()).is_none());
		assert!(parse_set_cookie("novalue", &url("https://hotel.example/"), SystemTime::now()).is_none());
	}

	#[test]
	fn header_includes_parent_domain_cookies_only_on_matching_paths() {
		let jar = CookieJar::new();
		let origin = url("https://hotel.pynguest.app/myaccount/");
		jar.record_set_cookies(&origin, ["PHPSESSID=abc; Domain=pynguest.app; Path=/", "pref=1; Path=/myaccount"]);

		assert_eq!(jar.cookie_header(&url("https://hotel.pynguest.app/myaccount/key/unlock/")).as_deref(), Some("pref=1; PHPSESSID=abc"));
		assert_eq!(jar.cookie_header(&url("https://hotel.pynguest.app/login")).as_deref(), Some("PHPSESSID=abc"));
		assert_eq!(jar.cookie_header(&url("https://other.example/")), None);
	}

	#[test]
	fn expired_set_cookie_deletes_existing_slot() {
		let jar = CookieJar::new();
		let origin = url("https://hotel.example/");
		jar.record_set_cookies(&origin, ["PHPSESSID=abc; Path=/"]);
		assert!(jar.session_cookie("hotel.example").is_some());

		jar.record_set_cookies(&origin, ["PHPSESSID=deleted; Path=/; Max-Age=0"]);
		assert!(jar.session_cookie("hotel.example").is_none());
		assert!(jar.is_empty());
	}

	#[test]
	fn session_cookie_matches_either_direction() {
		let jar = CookieJar::new();
		jar.set_session_cookie(".pynguest.app", "abc", None);

		assert_eq!(jar.session_cookie("hotel.pynguest.app").unwrap().value, "abc");
		assert_eq!(jar.session_cookie("pynguest.app").unwrap().value, "abc");
		assert!(jar.session_cookie("example.com").is_none());
	}

	#[test]
	fn remove_session_cookies_is_scoped_to_host() {
		let jar = CookieJar::new();
		jar.set_session_cookie("a.example", "1", None);
		jar.set_session_cookie("b.example", "2", None);
		jar.store(StoredCookie {
			name: "other".into(),
			value: "x".into(),
			domain: "a.example".into(),
			host_only: true,
			path: "/".into(),
			expires: None,
		});

		assert_eq!(jar.remove_session_cookies(Some("a.example")), 1);
		assert!(jar.session_cookie("b.example").is_some());
		assert_eq!(jar.remove_session_cookies(None), 1);
		assert_eq!(jar.len(), 1);
	}
}
