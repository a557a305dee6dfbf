//! One-shot unlock: ensure a usable session, send one request, read the
//! verdict from the status code and `Location` header alone.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::client::{BrowserClient, FetchOptions};
use crate::connectivity::{ConnectivityMonitor, DETERMINATION_WINDOW};
use crate::cookies::SESSION_COOKIE_NAME;
use crate::demo::is_demo_host;
use crate::error::UnlockError;
use crate::session::SessionService;
use crate::transport::is_redirect;

/// How long the success text stays up.
pub const STATUS_DISPLAY_WINDOW: Duration = Duration::from_secs(3);

const SUCCESS_MARKER: &str = "/myaccount/key";
const LOGIN_MARKER: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
	Unlocked,
	Failed(UnlockError),
}

impl UnlockOutcome {
	pub fn is_unlocked(&self) -> bool {
		matches!(self, UnlockOutcome::Unlocked)
	}

	pub fn error(&self) -> Option<&UnlockError> {
		match self {
			UnlockOutcome::Unlocked => None,
			UnlockOutcome::Failed(err) => Some(err),
		}
	}

	pub fn into_result(self) -> Result<(), UnlockError> {
		match self {
			UnlockOutcome::Unlocked => Ok(()),
			UnlockOutcome::Failed(err) => Err(err),
		}
	}
}

/// Maps the unlock response to an outcome.
///
/// Any redirect except one to the login page counts as success, including
/// a redirect without `Location`. A 200 means something followed the
/// redirect and is never trusted.
pub fn classify_unlock_response(status: u16, location: Option<&str>) -> UnlockOutcome {
	if is_redirect(status) {
		return match location {
			Some(location) if location.contains(SUCCESS_MARKER) => UnlockOutcome::Unlocked,
			Some(location) if location.contains(LOGIN_MARKER) => UnlockOutcome::Failed(UnlockError::SessionExpired),
			_ => UnlockOutcome::Unlocked,
		};
	}
	match status {
		200 => UnlockOutcome::Failed(UnlockError::UnexpectedResponse),
		401 | 403 => UnlockOutcome::Failed(UnlockError::SessionExpired),
		_ => UnlockOutcome::Failed(UnlockError::NetworkUnavailable),
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UnlockState {
	#[default]
	Idle,
	CheckingSession,
	Refreshing,
	Unlocking,
	Succeeded,
	Failed(UnlockError),
}

/// What observers of the engine see.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineStatus {
	pub state: UnlockState,
	/// Short human-readable status; empty when nothing is going on.
	pub message: String,
	pub last_unlock: Option<SystemTime>,
	pub last_outcome: Option<UnlockOutcome>,
}

/// How the unlock request carries the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieAttachment {
	/// The client attaches whatever the jar holds for the host.
	#[default]
	Jar,
	/// An explicit `Cookie: PHPSESSID=<value>` header; the jar stays out of it.
	Header,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
	pub cookie_attachment: CookieAttachment,
	pub status_window: Duration,
	pub connectivity_window: Duration,
}

impl Default for EngineOptions {
	fn default() -> Self {
		Self {
			cookie_attachment: CookieAttachment::Jar,
			status_window: STATUS_DISPLAY_WINDOW,
			connectivity_window: DETERMINATION_WINDOW,
		}
	}
}

/// Runs unlock attempts against the shared session, one at a time.
pub struct UnlockEngine {
	client: BrowserClient,
	session: Arc<SessionService>,
	connectivity: Option<Arc<ConnectivityMonitor>>,
	options: EngineOptions,
	busy: Mutex<()>,
	status: Arc<watch::Sender<EngineStatus>>,
	generation: Arc<AtomicU64>,
}

impl UnlockEngine {
	/// `client` must share its cookie jar with `session`.
	pub fn new(client: BrowserClient, session: Arc<SessionService>) -> Self {
		Self {
			client,
			session,
			connectivity: None,
			options: EngineOptions::default(),
			busy: Mutex::new(()),
			status: Arc::new(watch::Sender::new(EngineStatus::default())),
			generation: Arc::new(AtomicU64::new(0)),
		}
	}

	pub fn with_connectivity(mut self, monitor: Arc<ConnectivityMonitor>) -> Self {
		self.connectivity = Some(monitor);
		self
	}

	pub fn with_options(mut self, options: EngineOptions) -> Self {
		self.options = options;
		self
	}

	pub fn status(&self) -> EngineStatus {
		self.status.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
		self.status.subscribe()
	}

	/// Performs one unlock attempt. A concurrent call fails with
	/// [`UnlockError::InProgress`] without touching the first one.
	pub async fn unlock(&self) -> UnlockOutcome {
		let Ok(_guard) = self.busy.try_lock() else {
			debug!(target = "doorkey.unlock", "unlock already in progress");
			return UnlockOutcome::Failed(UnlockError::InProgress);
		};
		let outcome = self.run_unlock().await;
		self.finish(&outcome);
		outcome
	}

	/// Runs only the refresh pass. Returns whether the session is valid afterwards.
	pub async fn refresh(&self) -> Result<bool, UnlockError> {
		let Ok(_guard) = self.busy.try_lock() else {
			return Err(UnlockError::InProgress);
		};
		let session = self.session.snapshot();
		if !session.configured {
			return Err(UnlockError::NotConfigured);
		}
		if is_demo_host(&session.base_host) {
			return Ok(true);
		}
		self.transition(UnlockState::Refreshing, "Refreshing session");
		let valid = self.refresh_pass().await;
		self.transition(UnlockState::Idle, "");
		Ok(valid)
	}

	async fn run_unlock(&self) -> UnlockOutcome {
		let session = self.session.snapshot();
		if !session.configured {
			return UnlockOutcome::Failed(UnlockError::NotConfigured);
		}
		if is_demo_host(&session.base_host) {
			info!(target = "doorkey.unlock", door_id = %session.door_id, "demo door unlocked");
			return UnlockOutcome::Unlocked;
		}

		self.transition(UnlockState::CheckingSession, "Checking session");
		if let Some(monitor) = &self.connectivity {
			if !monitor.ensure_determined(self.options.connectivity_window).await {
				warn!(target = "doorkey.unlock", "no connectivity");
				return UnlockOutcome::Failed(UnlockError::NetworkUnavailable);
			}
		}

		if !self.session.is_valid() {
			self.transition(UnlockState::Refreshing, "Refreshing session");
			let valid = self.refresh_pass().await;
			self.transition(UnlockState::CheckingSession, "Checking session");
			if !valid {
				warn!(target = "doorkey.unlock", "session still invalid after refresh");
				if !self.session.snapshot().cookie_value.is_empty() {
					self.invalidate();
				}
				return UnlockOutcome::Failed(UnlockError::SessionExpired);
			}
		}

		self.transition(UnlockState::Unlocking, "Unlocking");
		let session = self.session.snapshot();
		let Some(url) = session.unlock_url() else {
			return UnlockOutcome::Failed(UnlockError::NotConfigured);
		};
		let options = match self.options.cookie_attachment {
			CookieAttachment::Jar => FetchOptions::manual(),
			CookieAttachment::Header => FetchOptions::manual()
				.without_jar_cookies()
				.with_header("Cookie", format!("{SESSION_COOKIE_NAME}={}", session.cookie_value)),
		};

		let exchange = match self.client.fetch(url, &options).await {
			Ok(exchange) => exchange,
			Err(err) => {
				warn!(target = "doorkey.unlock", error = %err, "unlock request failed");
				return UnlockOutcome::Failed(UnlockError::NetworkUnavailable);
			}
		};
		let outcome = classify_unlock_response(exchange.status(), exchange.location());
		info!(
			target = "doorkey.unlock",
			status = exchange.status(),
			location = exchange.location().unwrap_or("-"),
			unlocked = outcome.is_unlocked(),
			"unlock response"
		);

		match &outcome {
			UnlockOutcome::Failed(UnlockError::SessionExpired) => self.invalidate(),
			UnlockOutcome::Unlocked => self.adopt_rotated_cookie(),
			UnlockOutcome::Failed(_) => {}
		}
		outcome
	}

	/// At most two attempts: follow redirects from the refresh URL, then a
	/// manual request plus exactly one replayed hop.
	async fn refresh_pass(&self) -> bool {
		let Some(url) = self.session.snapshot().refresh_url() else {
			return false;
		};

		match self.client.fetch(url.clone(), &FetchOptions::follow()).await {
			Ok(exchange) => debug!(target = "doorkey.unlock", hops = exchange.steps.len(), status = exchange.status(), "refresh followed"),
			Err(err) => warn!(target = "doorkey.unlock", error = %err, "refresh request failed"),
		}
		self.adopt_rotated_cookie();
		if self.session.is_valid() {
			return true;
		}

		match self.client.fetch(url, &FetchOptions::manual()).await {
			Ok(exchange) => {
				let first = exchange.last();
				if let (true, Some(Ok(target))) = (first.is_redirect(), first.redirect_target()) {
					if let Err(err) = self.client.fetch(target, &FetchOptions::manual()).await {
						warn!(target = "doorkey.unlock", error = %err, "refresh hop failed");
					}
				}
			}
			Err(err) => warn!(target = "doorkey.unlock", error = %err, "manual refresh failed"),
		}
		self.adopt_rotated_cookie();
		self.session.is_valid()
	}

	fn adopt_rotated_cookie(&self) {
		if let Err(err) = self.session.adopt_jar_cookie() {
			warn!(target = "doorkey.unlock", error = %err, "could not store refreshed cookie");
		}
	}

	fn invalidate(&self) {
		if let Err(err) = self.session.invalidate() {
			warn!(target = "doorkey.unlock", error = %err, "could not persist invalidated session");
		}
	}

	fn transition(&self, state: UnlockState, message: &str) {
		self.generation.fetch_add(1, Ordering::SeqCst);
		self.status.send_modify(|status| {
			status.state = state;
			status.message = message.to_string();
		});
	}

	fn finish(&self, outcome: &UnlockOutcome) {
		let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		self.status.send_modify(|status| {
			match outcome {
				UnlockOutcome::Unlocked => {
					status.state = UnlockState::Succeeded;
					status.message = "Unlocked".to_string();
					status.last_unlock = Some(SystemTime::now());
				}
				UnlockOutcome::Failed(err) => {
					status.state = UnlockState::Failed(err.clone());
					status.message = err.to_string();
				}
			}
			status.last_outcome = Some(outcome.clone());
		});

		if !outcome.is_unlocked() {
			return;
		}
		let status = self.status.clone();
		let current = self.generation.clone();
		let window = self.options.status_window;
		tokio::spawn(async move {
			tokio::time::sleep(window).await;
			if current.load(Ordering::SeqCst) == generation {
				status.send_modify(|status| {
					status.state = UnlockState::Idle;
					status.message.clear();
				});
			}
		});
	}
}
