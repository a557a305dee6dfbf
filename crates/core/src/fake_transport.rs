//! Scripted transport for unit testing redirect, refresh and unlock flows.
//!
//! Provides an in-memory [`Transport`] that answers from per-URL scripts and
//! records every request it receives, so tests can assert on the headers a
//! component sent without any network.
//!
//! # Example
//!
//! ```ignore
//! let transport = FakeTransport::new()
//!     .on_get("https://k3y.in/abc", RawResponse::new(302).with_location("https://hotel.example/login/mybook/ROOM1/"))
//!     .on_get("https://hotel.example/login/mybook/ROOM1/", RawResponse::new(200));
//! let client = BrowserClient::new(Arc::new(transport), Arc::new(CookieJar::new()));
//! ```

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::error::TransportError;
use crate::transport::{HttpRequest, Method, RawResponse, Transport};

#[derive(Debug, Clone)]
enum Reply {
	Respond(RawResponse),
	Fail(String),
}

/// In-memory transport answering from scripts.
///
/// Each (method, URL) pair holds a queue of replies. Replies are consumed in
/// order; the last one repeats for every further request.
#[derive(Debug, Default)]
pub struct FakeTransport {
	routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
	requests: Mutex<Vec<HttpRequest>>,
	latency: Option<Duration>,
}

impl FakeTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Scripts a GET reply for `url`.
	pub fn on_get(self, url: &str, response: RawResponse) -> Self {
		self.push(Method::Get, url, response);
		self
	}

	/// Scripts a HEAD reply for `url`.
	pub fn on_head(self, url: &str, response: RawResponse) -> Self {
		self.push(Method::Head, url, response);
		self
	}

	/// Scripts a transport failure for GET `url`.
	pub fn fail_get(self, url: &str, message: &str) -> Self {
		self.enqueue(Method::Get, url, Reply::Fail(message.to_string()));
		self
	}

	/// Delays every reply, keeping the caller suspended inside `send`.
	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = Some(latency);
		self
	}

	/// Appends a reply to the script for (`method`, `url`).
	pub fn push(&self, method: Method, url: &str, response: RawResponse) {
		self.enqueue(method, url, Reply::Respond(response));
	}

	/// All requests received so far, in order.
	pub fn requests(&self) -> Vec<HttpRequest> {
		self.requests.lock().clone()
	}

	/// Number of requests received for `url` with any method.
	pub fn request_count(&self, url: &str) -> usize {
		let key = route_key(url);
		self.requests.lock().iter().filter(|r| r.url.as_str() == key).count()
	}

	fn enqueue(&self, method: Method, url: &str, reply: Reply) {
		self.routes.lock().entry((method, route_key(url))).or_default().push_back(reply);
	}

	fn next_reply(&self, request: &HttpRequest) -> Option<Reply> {
		let mut routes = self.routes.lock();
		let queue = routes.get_mut(&(request.method, request.url.to_string()))?;
		if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() }
	}
}

#[async_trait]
impl Transport for FakeTransport {
	async fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
		self.requests.lock().push(request.clone());
		if let Some(latency) = self.latency {
			tokio::time::sleep(latency).await;
		}
		match self.next_reply(request) {
			Some(Reply::Respond(response)) => Ok(response),
			Some(Reply::Fail(message)) => Err(TransportError::Connect(message)),
			None => Err(TransportError::Connect(format!("no scripted reply for {} {}", request.method, request.url))),
		}
	}
}

fn route_key(url: &str) -> String {
	Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn replays_queue_then_repeats_last() {
		let transport = FakeTransport::new()
			.on_get("https://hotel.example/myaccount/", RawResponse::new(302).with_location("/login"))
			.on_get("https://hotel.example/myaccount/", RawResponse::new(200));
		let request = HttpRequest::get(Url::parse("https://hotel.example/myaccount/").unwrap());

		assert_eq!(transport.send(&request).await.unwrap().status, 302);
		assert_eq!(transport.send(&request).await.unwrap().status, 200);
		assert_eq!(transport.send(&request).await.unwrap().status, 200);
		assert_eq!(transport.request_count("https://hotel.example/myaccount/"), 3);
	}

	#[tokio::test]
	async fn unscripted_urls_fail_like_an_unreachable_host() {
		let transport = FakeTransport::new();
		let request = HttpRequest::get(Url::parse("https://nowhere.example/").unwrap());
		assert!(matches!(transport.send(&request).await, Err(TransportError::Connect(_))));
	}
}
