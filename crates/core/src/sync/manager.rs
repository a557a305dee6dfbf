//! Session sync between paired devices.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use doorkey_protocol::{SyncAction, SyncMessage};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::channel::{PeerChannel, PeerEvent};
use super::coalesce::{Coalescer, Join};
use super::payload::{session_from_message, session_message};
use crate::error::{SessionError, SyncError};
use crate::locale::{Language, LocaleState};
use crate::session::{SessionEvent, SessionService, UpdateOrigin};

/// How long a requester waits for the peer's `sessionUpdate`.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Pushes local changes to the peer and applies the peer's.
pub struct SyncManager {
	channel: Arc<dyn PeerChannel>,
	session: Arc<SessionService>,
	locale: Arc<LocaleState>,
	coalescer: Arc<Coalescer>,
	request_timeout: Duration,
}

impl SyncManager {
	pub fn new(channel: Arc<dyn PeerChannel>, session: Arc<SessionService>, locale: Arc<LocaleState>) -> Self {
		Self {
			channel,
			session,
			locale,
			coalescer: Arc::new(Coalescer::new()),
			request_timeout: REQUEST_TIMEOUT,
		}
	}

	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn session(&self) -> &Arc<SessionService> {
		&self.session
	}

	pub fn channel(&self) -> &Arc<dyn PeerChannel> {
		&self.channel
	}

	/// `sessionUpdate` snapshot of the current state.
	pub fn current_message(&self) -> SyncMessage {
		session_message(&self.session.snapshot(), self.locale.get())
	}

	/// Publishes the durable context, plus an immediate message when the
	/// peer is reachable. Only a context failure is an error.
	pub async fn push_session(&self) -> Result<(), SyncError> {
		let message = self.current_message();
		self.channel.update_context(message.clone()).await?;
		if self.channel.is_reachable() {
			if let Err(err) = self.channel.send_message(message).await {
				debug!(target = "doorkey.sync", error = %err, "immediate session push failed, context still published");
			}
		}
		debug!(target = "doorkey.sync", "session pushed");
		Ok(())
	}

	/// Sends a `languageUpdate` when reachable and refreshes the context.
	pub async fn push_language(&self) -> Result<(), SyncError> {
		if self.channel.is_reachable() {
			let message = SyncMessage::language_update(self.locale.get().tag());
			if let Err(err) = self.channel.send_message(message).await {
				debug!(target = "doorkey.sync", error = %err, "language push failed");
			}
		}
		self.channel.update_context(self.current_message()).await
	}

	/// Asks the peer for a fresh session; `done` runs exactly once.
	///
	/// Overlapping calls join the request already in flight. An unreachable
	/// peer falls back to the last received context, or fails immediately
	/// when there is none.
	pub async fn request_update_with(self: &Arc<Self>, done: impl FnOnce(bool) + Send + 'static) {
		let round = match self.coalescer.join(Box::new(done)) {
			Join::Started(round) => round,
			Join::Joined(round) => {
				debug!(target = "doorkey.sync", round, "joined in-flight sync request");
				return;
			}
		};

		if !self.channel.is_reachable() {
			let success = match self.channel.received_context() {
				Some(context) => {
					info!(target = "doorkey.sync", "peer unreachable, applying last received context");
					self.apply_snapshot(&context).is_ok()
				}
				None => {
					info!(target = "doorkey.sync", "peer unreachable and no stored context");
					false
				}
			};
			self.coalescer.resolve_round(round, success);
			return;
		}

		let coalescer = self.coalescer.clone();
		let timeout = self.request_timeout;
		let timer = tokio::spawn(async move {
			tokio::time::sleep(timeout).await;
			if coalescer.resolve_round(round, false) > 0 {
				warn!(target = "doorkey.sync", round, ?timeout, "sync request timed out");
			}
		});
		self.coalescer.arm_timer(round, timer.abort_handle());

		debug!(target = "doorkey.sync", round, "requesting session update");
		if let Err(err) = self.channel.send_message(SyncMessage::request_update()).await {
			warn!(target = "doorkey.sync", error = %err, "could not send sync request");
			self.coalescer.resolve_round(round, false);
		}
	}

	/// Awaitable form of [`request_update_with`](Self::request_update_with).
	pub async fn request_update(self: &Arc<Self>) -> bool {
		let (tx, rx) = oneshot::channel();
		self.request_update_with(move |success| {
			let _ = tx.send(success);
		})
		.await;
		rx.await.unwrap_or(false)
	}

	pub async fn handle_event(&self, event: PeerEvent) {
		match event {
			PeerEvent::Message(message) => self.handle_message(message).await,
			PeerEvent::Context(context) => {
				if context.action == SyncAction::SessionUpdate {
					let success = self.apply_snapshot(&context).is_ok();
					self.coalescer.resolve(success);
				}
			}
			PeerEvent::Reachability(reachable) => {
				debug!(target = "doorkey.sync", reachable, "peer reachability changed");
			}
		}
	}

	async fn handle_message(&self, message: SyncMessage) {
		debug!(target = "doorkey.sync", action = %message.action, "peer message");
		match message.action {
			SyncAction::SessionUpdate => {
				let success = self.apply_snapshot(&message).is_ok();
				self.coalescer.resolve(success);
			}
			SyncAction::RequestUpdate => {
				if !self.session.snapshot().configured {
					info!(target = "doorkey.sync", "peer asked for a session, answering unconfigured");
				}
				if let Err(err) = self.channel.send_message(self.current_message()).await {
					warn!(target = "doorkey.sync", error = %err, "could not answer sync request");
				}
			}
			SyncAction::LanguageUpdate => self.apply_language(message.language.as_deref()),
		}
	}

	fn apply_snapshot(&self, message: &SyncMessage) -> Result<(), SessionError> {
		let session = session_from_message(message);
		if let Err(err) = self.session.update_from(session, UpdateOrigin::Peer) {
			warn!(target = "doorkey.sync", error = %err, "rejected peer session");
			return Err(err);
		}
		if let Err(err) = self.session.record_sync(SystemTime::now()) {
			warn!(target = "doorkey.sync", error = %err, "could not record sync time");
		}
		self.apply_language(message.language.as_deref());
		Ok(())
	}

	fn apply_language(&self, tag: Option<&str>) {
		if let Some(tag) = tag.filter(|tag| !tag.is_empty()) {
			self.locale.set(Language::from_tag_or_default(tag));
		}
	}

	/// Applies inbound events until the stream ends.
	pub fn spawn_inbound_loop(self: &Arc<Self>, mut events: mpsc::UnboundedReceiver<PeerEvent>) -> JoinHandle<()> {
		let this = self.clone();
		tokio::spawn(async move {
			while let Some(event) = events.recv().await {
				this.handle_event(event).await;
			}
			debug!(target = "doorkey.sync", "peer event stream closed");
		})
	}

	/// Pushes every local session change to the peer.
	pub fn spawn_session_forwarder(self: &Arc<Self>) -> JoinHandle<()> {
		let this = self.clone();
		let mut events = self.session.subscribe();
		tokio::spawn(async move {
			loop {
				let push = match events.recv().await {
					Ok(SessionEvent::Updated { origin, .. }) => origin == UpdateOrigin::Local,
					Ok(SessionEvent::Cleared) => true,
					Ok(SessionEvent::Invalidated { .. }) => false,
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						debug!(target = "doorkey.sync", skipped, "session events lagged");
						true
					}
					Err(broadcast::error::RecvError::Closed) => break,
				};
				if push {
					if let Err(err) = this.push_session().await {
						warn!(target = "doorkey.sync", error = %err, "session push failed");
					}
				}
			}
		})
	}
}
