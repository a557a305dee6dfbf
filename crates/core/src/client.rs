//! Browser-style client: cookie jar plus explicit redirect replay.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::cookies::CookieJar;
use crate::error::TransportError;
use crate::transport::{HttpRequest, Transport, is_redirect};

/// Upper bound on hops replayed in [`RedirectMode::Follow`].
pub const FOLLOW_LIMIT: usize = 10;

/// Mobile Safari identity the vendor pages expect.
pub const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";

const DEFAULT_HEADERS: [(&str, &str); 5] = [
	("User-Agent", USER_AGENT),
	("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
	("Accept-Language", "en-US,en;q=0.9"),
	("Cache-Control", "no-cache"),
	("Pragma", "no-cache"),
];

/// Whether a fetch stops after one hop or replays the redirect chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectMode {
	#[default]
	Manual,
	Follow,
}

/// One hop of a redirect chain. Exists only for the duration of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectStep {
	pub url: Url,
	pub status: u16,
	pub location: Option<String>,
	pub set_cookies: Vec<String>,
}

impl RedirectStep {
	/// Resolves `Location` (absolute or relative) against the hop URL.
	pub fn redirect_target(&self) -> Option<Result<Url, url::ParseError>> {
		self.location.as_deref().map(|location| self.url.join(location))
	}

	pub fn is_redirect(&self) -> bool {
		is_redirect(self.status)
	}
}

/// Every hop a fetch performed, in order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
	pub steps: Vec<RedirectStep>,
}

impl Exchange {
	pub fn last(&self) -> &RedirectStep {
		&self.steps[self.steps.len() - 1]
	}

	pub fn status(&self) -> u16 {
		self.last().status
	}

	pub fn location(&self) -> Option<&str> {
		self.last().location.as_deref()
	}

	pub fn final_url(&self) -> &Url {
		&self.last().url
	}
}

/// Per-fetch options.
#[derive(Debug, Clone)]
pub struct FetchOptions {
	pub redirects: RedirectMode,
	pub headers: Vec<(String, String)>,
	pub attach_jar_cookies: bool,
}

impl Default for FetchOptions {
	fn default() -> Self {
		Self {
			redirects: RedirectMode::Manual,
			headers: Vec::new(),
			attach_jar_cookies: true,
		}
	}
}

impl FetchOptions {
	pub fn manual() -> Self {
		Self::default()
	}

	pub fn follow() -> Self {
		Self {
			redirects: RedirectMode::Follow,
			..Self::default()
		}
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	/// Leaves cookie attachment entirely to explicit headers.
	pub fn without_jar_cookies(mut self) -> Self {
		self.attach_jar_cookies = false;
		self
	}
}

/// Transport plus the shared cookie jar.
///
/// Every hop attaches the jar's cookies (unless the caller supplied its own
/// `Cookie` header) and records any `Set-Cookie` back into the jar, so
/// cookies set on intermediate redirects are never lost.
#[derive(Clone)]
pub struct BrowserClient {
	transport: Arc<dyn Transport>,
	jar: Arc<CookieJar>,
}

impl BrowserClient {
	pub fn new(transport: Arc<dyn Transport>, jar: Arc<CookieJar>) -> Self {
		Self { transport, jar }
	}

	pub fn jar(&self) -> &Arc<CookieJar> {
		&self.jar
	}

	pub fn transport(&self) -> &Arc<dyn Transport> {
		&self.transport
	}

	/// Performs a single GET hop.
	pub async fn step(&self, url: &Url, options: &FetchOptions) -> Result<RedirectStep, TransportError> {
		let mut request = HttpRequest::get(url.clone());
		for (name, value) in DEFAULT_HEADERS {
			if !options.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
				request = request.with_header(name, value);
			}
		}
		for (name, value) in &options.headers {
			request = request.with_header(name.clone(), value.clone());
		}
		if options.attach_jar_cookies && request.header("Cookie").is_none() {
			if let Some(cookie) = self.jar.cookie_header(url) {
				request = request.with_header("Cookie", cookie);
			}
		}

		let response = self.transport.send(&request).await?;
		self.jar.record_set_cookies(url, response.set_cookies.iter().map(String::as_str));
		debug!(
			target = "doorkey.net",
			url = %url,
			status = response.status,
			location = response.location.as_deref().unwrap_or("-"),
			cookies_set = response.set_cookies.len(),
			"hop"
		);

		Ok(RedirectStep {
			url: url.clone(),
			status: response.status,
			location: response.location,
			set_cookies: response.set_cookies,
		})
	}

	/// Fetches `url`, replaying redirects when the options ask for it.
	pub async fn fetch(&self, url: Url, options: &FetchOptions) -> Result<Exchange, TransportError> {
		let mut steps = Vec::new();
		let mut current = url;
		loop {
			let step = self.step(&current, options).await?;
			let next = match (options.redirects, step.is_redirect(), step.redirect_target()) {
				(RedirectMode::Follow, true, Some(target)) => Some(target.map_err(|e| TransportError::InvalidUrl(format!("bad Location on {}: {e}", step.url)))?),
				_ => None,
			};
			steps.push(step);
			match next {
				Some(target) if steps.len() < FOLLOW_LIMIT => current = target,
				_ => break,
			}
		}
		Ok(Exchange { steps })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fake_transport::FakeTransport;
	use crate::transport::RawResponse;

	fn client(transport: FakeTransport) -> (BrowserClient, Arc<FakeTransport>) {
		let transport = Arc::new(transport);
		(BrowserClient::new(transport.clone(), Arc::new(CookieJar::new())), transport)
	}

	#[tokio::test]
	async fn manual_fetch_stops_at_first_redirect() {
		let (client, transport) = client(FakeTransport::new().on_get("https://hotel.example/myaccount/", RawResponse::new(302).with_location("/login")));

		let exchange = client
			.fetch(Url::parse("https://hotel.example/myaccount/").unwrap(), &FetchOptions::manual())
			.await
			.unwrap();

		assert_eq!(exchange.steps.len(), 1);
		assert_eq!(exchange.status(), 302);
		assert_eq!(exchange.location(), Some("/login"));
		assert_eq!(transport.requests().len(), 1);
	}

	#[tokio::test]
	async fn follow_fetch_records_cookies_from_intermediate_hops() {
		let (client, transport) = client(
			FakeTransport::new()
				.on_get(
					"https://hotel.example/myaccount/",
					RawResponse::new(302).with_location("/login/").with_set_cookie("PHPSESSID=fresh; path=/"),
				)
				.on_get("https://hotel.example/login/", RawResponse::new(200)),
		);

		let exchange = client
			.fetch(Url::parse("https://hotel.example/myaccount/").unwrap(), &FetchOptions::follow())
			.await
			.unwrap();

		assert_eq!(exchange.steps.len(), 2);
		assert_eq!(exchange.final_url().as_str(), "https://hotel.example/login/");
		assert_eq!(client.jar().session_cookie("hotel.example").unwrap().value, "fresh");
		let second = &transport.requests()[1];
		assert_eq!(second.header("Cookie"), Some("PHPSESSID=fresh"));
	}

	#[tokio::test]
	async fn follow_fetch_is_bounded() {
		let (client, _) = client(FakeTransport::new().on_get("https://loop.example/", RawResponse::new(302).with_location("https://loop.example/")));

		let exchange = client.fetch(Url::parse("https://loop.example/").unwrap(), &FetchOptions::follow()).await.unwrap();
		assert_eq!(exchange.steps.len(), FOLLOW_LIMIT);
		assert_eq!(exchange.status(), 302);
	}

	#[tokio::test]
	async fn explicit_cookie_header_suppresses_jar_cookies() {
		let (client, transport) = client(FakeTransport::new().on_get("https://hotel.example/", RawResponse::new(200)));
		client.jar().set_session_cookie("hotel.example", "from-jar", None);

		let options = FetchOptions::manual().with_header("Cookie", "PHPSESSID=explicit");
		client.fetch(Url::parse("https://hotel.example/").unwrap(), &options).await.unwrap();

		let sent = &transport.requests()[0];
		assert_eq!(sent.header("cookie"), Some("PHPSESSID=explicit"));
		assert_eq!(sent.headers.iter().filter(|(n, _)| n.eq_ignore_ascii_case("cookie")).count(), 1);
		assert_eq!(sent.header("User-Agent"), Some(USER_AGENT));
	}
}
