//! Short-link resolution by manual redirect walking.
//!
//! The door identifier only ever appears in an intermediate `Location`
//! header, so every hop is issued with redirects disabled and inspected
//! before moving on. Cookies set along the way land in the shared jar.

use std::fmt;

use tracing::{debug, info, warn};
use url::Url;

use crate::client::{BrowserClient, FetchOptions, RedirectStep};
use crate::demo::{demo_cookie, demo_door_id, is_demo_link};
use crate::error::{Result, SessionError};
use crate::transport::is_redirect;

/// Hop budget for a single resolve.
pub const MAX_HOPS: usize = 5;

/// Domain of the vendor's SMS short links.
pub const SHORT_LINK_DOMAIN: &str = "k3y.in";

const BOOKING_MARKER: &str = "mybook";
const DOOR_MARKER: &str = "door";

/// Where a resolved door id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorIdSource {
	/// Segment after `mybook` in a redirect target.
	Booking,
	/// Segment after `door` in a redirect target.
	Door,
	/// Last segment of the short link itself. Low confidence.
	ShortLinkFallback,
	Demo,
}

impl fmt::Display for DoorIdSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			DoorIdSource::Booking => "booking",
			DoorIdSource::Door => "door",
			DoorIdSource::ShortLinkFallback => "short-link-fallback",
			DoorIdSource::Demo => "demo",
		};
		f.write_str(s)
	}
}

/// Result of a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
	/// Normalized input link.
	pub link: Url,
	pub final_url: Url,
	pub final_host: String,
	pub door_id: String,
	pub source: DoorIdSource,
	pub steps: Vec<RedirectStep>,
}

/// Trims the raw text and forces an `https` scheme.
pub fn normalize_link(raw: &str) -> Result<Url> {
	let trimmed = raw.trim();
	if trimmed.is_empty() {
		return Err(SessionError::InvalidLink("empty link".into()));
	}
	let candidate = if let Some(rest) = strip_prefix_ignore_case(trimmed, "http://") {
		format!("https://{rest}")
	} else if strip_prefix_ignore_case(trimmed, "https://").is_some() {
		trimmed.to_string()
	} else {
		format!("https://{trimmed}")
	};
	let url = Url::parse(&candidate).map_err(|e| SessionError::InvalidLink(format!("{trimmed}: {e}")))?;
	if url.host_str().is_none_or(str::is_empty) {
		return Err(SessionError::InvalidLink(format!("{trimmed}: missing host")));
	}
	Ok(url)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
	s.get(..prefix.len())
		.filter(|head| head.eq_ignore_ascii_case(prefix))
		.map(|_| &s[prefix.len()..])
}

/// Scans path segments for the booking marker, then the door marker.
pub fn extract_door_id(url: &Url) -> Option<(String, DoorIdSource)> {
	let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
	let after = |marker: &str| {
		let index = segments.iter().position(|segment| *segment == marker)?;
		segments.get(index + 1).filter(|id| !id.is_empty()).map(|id| id.to_string())
	};
	after(BOOKING_MARKER)
		.map(|id| (id, DoorIdSource::Booking))
		.or_else(|| after(DOOR_MARKER).map(|id| (id, DoorIdSource::Door)))
}

fn short_link_fallback(link: &Url) -> Option<String> {
	let host = link.host_str()?;
	if !host.contains(SHORT_LINK_DOMAIN) {
		return None;
	}
	link.path_segments()?.filter(|segment| !segment.is_empty()).last().map(str::to_string)
}

/// Resolves SMS links into a final host and door id.
#[derive(Clone)]
pub struct RedirectWalker {
	client: BrowserClient,
	max_hops: usize,
}

impl RedirectWalker {
	pub fn new(client: BrowserClient) -> Self {
		Self { client, max_hops: MAX_HOPS }
	}

	pub fn with_max_hops(mut self, max_hops: usize) -> Self {
		self.max_hops = max_hops;
		self
	}

	pub fn client(&self) -> &BrowserClient {
		&self.client
	}

	pub async fn resolve(&self, raw_link: &str) -> Result<Resolution> {
		let link = normalize_link(raw_link)?;
		if is_demo_link(&link) {
			return Ok(self.resolve_demo(link));
		}
		info!(target = "doorkey.walker", link = %link, "resolving link");

		let mut current = link.clone();
		let mut found: Option<(String, DoorIdSource)> = None;
		let mut steps = Vec::new();

		for hop in 0..self.max_hops {
			let step = self
				.client
				.step(&current, &FetchOptions::manual())
				.await
				.map_err(|e| SessionError::InvalidResponse(e.to_string()))?;
			let status = step.status;

			if is_redirect(status) {
				let Some(target) = step.redirect_target() else {
					debug!(target = "doorkey.walker", hop, status, "redirect without Location, stopping");
					steps.push(step);
					break;
				};
				let target = target.map_err(|e| SessionError::InvalidResponse(format!("bad redirect target from {current}: {e}")))?;
				if found.is_none() {
					found = extract_door_id(&target);
					if let Some((door_id, source)) = &found {
						debug!(target = "doorkey.walker", hop, door_id = %door_id, %source, "door id found");
					}
				}
				debug!(target = "doorkey.walker", hop, status, to = %target, "redirect");
				steps.push(step);
				current = target;
				continue;
			}

			steps.push(step);
			if status == 200 {
				debug!(target = "doorkey.walker", hop, url = %current, "terminal page reached");
				break;
			}
			return Err(SessionError::InvalidResponse(format!("unexpected status {status} from {current}")));
		}

		if found.is_none() {
			if let Some(short_id) = short_link_fallback(&link) {
				warn!(target = "doorkey.walker", door_id = %short_id, "no door id in redirect chain, using short link id (low confidence)");
				found = Some((short_id, DoorIdSource::ShortLinkFallback));
			}
		}

		let Some((door_id, source)) = found else {
			return Err(SessionError::NoDoorIdFound);
		};
		let final_host = current
			.host_str()
			.map(str::to_ascii_lowercase)
			.ok_or_else(|| SessionError::InvalidResponse(format!("no host in {current}")))?;

		info!(target = "doorkey.walker", door_id = %door_id, host = %final_host, %source, hops = steps.len(), "link resolved");
		Ok(Resolution {
			link,
			final_url: current,
			final_host,
			door_id,
			source,
			steps,
		})
	}

	fn resolve_demo(&self, link: Url) -> Resolution {
		let door_id = demo_door_id(link.as_str());
		let final_host = link.host_str().unwrap_or_default().to_ascii_lowercase();
		self.client.jar().set_session_cookie(&final_host, &demo_cookie(&door_id), None);
		info!(target = "doorkey.walker", door_id = %door_id, host = %final_host, "demo link resolved offline");
		Resolution {
			final_url: link.clone(),
			link,
			final_host,
			door_id,
			source: DoorIdSource::Demo,
			steps: Vec::new(),
		}
	}
}

#[cfg(test)]
mod tests;
