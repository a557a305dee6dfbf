//! Process-wide session state with persistence and change notification.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::model::{LinkRecord, Session};
use super::repository::SessionRepository;
use crate::cookies::CookieJar;
use crate::error::Result;
use crate::walker::Resolution;

const EVENT_CAPACITY: usize = 32;

/// Who produced a session update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrigin {
	/// This device: setup, refresh, cookie rotation, reload. Pushed to the peer.
	Local,
	/// Applied from a peer payload. Never echoed back.
	Peer,
}

/// Notifications for observers of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
	Updated { session: Session, origin: UpdateOrigin },
	/// Cookie dropped after an authentication failure.
	Invalidated { session: Session },
	Cleared,
}

#[derive(Debug, Default)]
struct State {
	session: Session,
	link: LinkRecord,
}

/// The single session of this device.
///
/// Every mutation persists through the [`SessionRepository`], keeps the
/// vendor cookie in the shared [`CookieJar`] in step with the session, and
/// is announced on a broadcast channel.
pub struct SessionService {
	repository: SessionRepository,
	jar: Arc<CookieJar>,
	state: RwLock<State>,
	events: broadcast::Sender<SessionEvent>,
}

impl SessionService {
	/// Loads persisted state and plants its cookie into `jar`.
	pub fn load(repository: SessionRepository, jar: Arc<CookieJar>) -> Self {
		let (session, link) = repository.load();
		debug!(target = "doorkey.session", door_id = %session.door_id, host = %session.base_host, configured = session.configured, has_cookie = !session.cookie_value.is_empty(), "session loaded");
		materialize(&jar, None, &session);
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		Self {
			repository,
			jar,
			state: RwLock::new(State { session, link }),
			events,
		}
	}

	pub fn snapshot(&self) -> Session {
		self.state.read().session.clone()
	}

	pub fn link(&self) -> LinkRecord {
		self.state.read().link.clone()
	}

	pub fn is_valid(&self) -> bool {
		self.state.read().session.is_valid()
	}

	pub fn jar(&self) -> &Arc<CookieJar> {
		&self.jar
	}

	pub fn repository(&self) -> &SessionRepository {
		&self.repository
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.events.subscribe()
	}

	/// Replaces every session field at once.
	///
	/// Returns whether the observable state changed. Persistence and cookie
	/// materialization run either way. Local updates always notify observers
	/// so the peer is pushed again; peer updates notify only on change.
	pub fn update_from(&self, session: Session, origin: UpdateOrigin) -> Result<bool> {
		self.apply(session, None, origin)
	}

	/// Populates the session from a completed walk.
	pub fn apply_resolution(&self, resolution: &Resolution) -> Result<Session> {
		let cookie = self.jar.session_cookie(&resolution.final_host);
		let session = Session {
			door_id: resolution.door_id.clone(),
			base_host: resolution.final_host.clone(),
			cookie_value: cookie.as_ref().map(|c| c.value.clone()).unwrap_or_default(),
			cookie_expiry: cookie.and_then(|c| c.expires),
			configured: true,
		};
		let link = LinkRecord {
			link: resolution.link.to_string(),
			path_hint: resolution.final_url.path().to_string(),
		};
		self.apply(session, Some(link), UpdateOrigin::Local)?;
		Ok(self.snapshot())
	}

	/// Pulls the jar's current vendor cookie for the base host into the session.
	pub fn adopt_jar_cookie(&self) -> Result<bool> {
		let current = self.snapshot();
		if current.base_host.is_empty() {
			return Ok(false);
		}
		let Some(cookie) = self.jar.session_cookie(&current.base_host) else {
			return Ok(false);
		};
		let candidate = Session {
			cookie_value: cookie.value,
			cookie_expiry: cookie.expires,
			..current.clone()
		}
		.normalized();
		if candidate == current {
			return Ok(false);
		}
		debug!(target = "doorkey.session", host = %current.base_host, "adopting rotated cookie");
		self.update_from(candidate, UpdateOrigin::Local)
	}

	/// Drops cookie and expiry, keeping door, host and configured.
	pub fn invalidate(&self) -> Result<()> {
		let session = {
			let mut state = self.state.write();
			state.session = state.session.without_cookie();
			self.repository.save(&state.session, &state.link)?;
			state.session.clone()
		};
		self.jar.remove_session_cookies(Some(&session.base_host));
		info!(target = "doorkey.session", host = %session.base_host, "session cookie invalidated");
		let _ = self.events.send(SessionEvent::Invalidated { session });
		Ok(())
	}

	/// Deletes the stored session entirely.
	pub fn clear(&self) -> Result<()> {
		let host = {
			let mut state = self.state.write();
			self.repository.clear()?;
			let host = state.session.base_host.clone();
			*state = State::default();
			host
		};
		if !host.is_empty() {
			self.jar.remove_session_cookies(Some(&host));
		}
		info!(target = "doorkey.session", "session cleared");
		let _ = self.events.send(SessionEvent::Cleared);
		Ok(())
	}

	/// Re-reads persisted state written by another process.
	pub fn reload(&self) -> Result<bool> {
		self.repository.reload();
		let (session, link) = self.repository.load();
		let previous = {
			let mut state = self.state.write();
			if state.session == session && state.link == link {
				return Ok(false);
			}
			let previous = state.session.clone();
			*state = State {
				session: session.clone(),
				link,
			};
			previous
		};
		materialize(&self.jar, Some(&previous), &session);
		debug!(target = "doorkey.session", door_id = %session.door_id, "session reloaded from disk");
		let _ = self.events.send(if session == Session::default() {
			SessionEvent::Cleared
		} else {
			SessionEvent::Updated {
				session,
				origin: UpdateOrigin::Local,
			}
		});
		Ok(true)
	}

	pub fn last_sync(&self) -> Option<SystemTime> {
		self.repository.last_sync()
	}

	pub fn record_sync(&self, at: SystemTime) -> Result<()> {
		self.repository.record_sync(at)
	}

	fn apply(&self, session: Session, link: Option<LinkRecord>, origin: UpdateOrigin) -> Result<bool> {
		let session = session.normalized();
		session.validate()?;

		let (previous, changed) = {
			let mut state = self.state.write();
			let link = link.unwrap_or_else(|| state.link.clone());
			let changed = state.session != session || state.link != link;
			self.repository.save(&session, &link)?;
			let previous = std::mem::replace(&mut state.session, session.clone());
			state.link = link;
			(previous, changed)
		};
		materialize(&self.jar, Some(&previous), &session);

		if changed {
			info!(target = "doorkey.session", door_id = %session.door_id, host = %session.base_host, has_cookie = !session.cookie_value.is_empty(), ?origin, "session updated");
		}
		if changed || origin == UpdateOrigin::Local {
			let _ = self.events.send(SessionEvent::Updated { session, origin });
		}
		Ok(changed)
	}
}

/// Keeps the jar's vendor cookie in step with `session`.
fn materialize(jar: &CookieJar, previous: Option<&Session>, session: &Session) {
	if let Some(previous) = previous {
		if !previous.base_host.is_empty() && previous.base_host != session.base_host {
			jar.remove_session_cookies(Some(&previous.base_host));
		}
	}
	if session.base_host.is_empty() {
		return;
	}
	if session.cookie_value.is_empty() {
		jar.remove_session_cookies(Some(&session.base_host));
	} else {
		jar.set_session_cookie(&session.base_host, &session.cookie_value, session.cookie_expiry);
	}
}
