//! Single-hop HTTP transport.
//!
//! A [`Transport`] sends exactly one request and reports status and headers.
//! It never follows redirects: the door identifier lives only in an
//! intermediate `Location` header, and the unlock result is read from the
//! redirect itself. Hop replay and cookie handling live one layer up in
//! [`BrowserClient`](crate::client::BrowserClient).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{LOCATION, SET_COOKIE};
use url::Url;

use crate::error::TransportError;

/// Default per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP methods the client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
	Get,
	Head,
}

impl fmt::Display for Method {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Method::Get => write!(f, "GET"),
			Method::Head => write!(f, "HEAD"),
		}
	}
}

/// One outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
	pub method: Method,
	pub url: Url,
	pub headers: Vec<(String, String)>,
	/// Overrides the transport's default timeout.
	pub timeout: Option<Duration>,
}

impl HttpRequest {
	pub fn get(url: Url) -> Self {
		Self {
			method: Method::Get,
			url,
			headers: Vec::new(),
			timeout: None,
		}
	}

	pub fn head(url: Url) -> Self {
		Self {
			method: Method::Head,
			..Self::get(url)
		}
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	/// Case-insensitive header lookup.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}
}

/// Status and the headers the session logic cares about.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResponse {
	pub status: u16,
	pub location: Option<String>,
	pub set_cookies: Vec<String>,
}

impl RawResponse {
	pub fn new(status: u16) -> Self {
		Self {
			status,
			..Default::default()
		}
	}

	pub fn with_location(mut self, location: impl Into<String>) -> Self {
		self.location = Some(location.into());
		self
	}

	pub fn with_set_cookie(mut self, header: impl Into<String>) -> Self {
		self.set_cookies.push(header.into());
		self
	}
}

/// Returns `true` for the redirect statuses the walker and classifier honor.
pub fn is_redirect(status: u16) -> bool {
	matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Sends one request without following redirects.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by `reqwest` with redirects disabled.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
	client: reqwest::Client,
}

impl ReqwestTransport {
	pub fn new() -> Result<Self, TransportError> {
		Self::with_timeout(REQUEST_TIMEOUT)
	}

	pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
		let client = reqwest::Client::builder()
			.redirect(reqwest::redirect::Policy::none())
			.timeout(timeout)
			.build()
			.map_err(|e| TransportError::Request(format!("Failed to create HTTP client: {e}")))?;
		Ok(Self { client })
	}
}

#[async_trait]
impl Transport for ReqwestTransport {
	async fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
		let method = match request.method {
			Method::Get => reqwest::Method::GET,
			Method::Head => reqwest::Method::HEAD,
		};
		let mut builder = self.client.request(method, request.url.clone());
		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}
		if let Some(timeout) = request.timeout {
			builder = builder.timeout(timeout);
		}

		let response = builder.send().await?;
		let headers = response.headers();
		let location = headers.get(LOCATION).and_then(|v| v.to_str().ok()).map(str::to_owned);
		let set_cookies = headers
			.get_all(SET_COOKIE)
			.iter()
			.filter_map(|v| v.to_str().ok())
			.map(str::to_owned)
			.collect();

		Ok(RawResponse {
			status: response.status().as_u16(),
			location,
			set_cookies,
		})
	}
}
