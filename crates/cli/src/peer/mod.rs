//! WebSocket peer link between a primary (`serve`) and a secondary (`pull`).
//!
//! Both roles share [`WsPeer`]: every authenticated socket registers an
//! outbox, inbound frames become [`PeerEvent`]s, and the peer counts as
//! reachable while at least one socket is attached.

pub mod client;
pub mod server;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use doorkey::sync::{PeerChannel, PeerEvent};
use doorkey::{KeyValueStore, SyncError};
use doorkey_protocol::{MAX_PAYLOAD_BYTES, PeerFrame, SyncMessage};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Route the primary serves the link on.
pub const SYNC_PATH: &str = "/sync";

/// Store key of the last context received from the peer.
pub const RECEIVED_CONTEXT_KEY: &str = "doorkey.peer.received_context";

/// Frames larger than this are dropped unread.
const MAX_FRAME_BYTES: usize = MAX_PAYLOAD_BYTES + 1024;

type Outbox = mpsc::UnboundedSender<PeerFrame>;

pub struct WsPeer {
	store: Arc<dyn KeyValueStore>,
	connections: Mutex<HashMap<u64, Outbox>>,
	next_id: AtomicU64,
	published: Mutex<Option<SyncMessage>>,
	events: mpsc::UnboundedSender<PeerEvent>,
}

impl WsPeer {
	/// A detached peer and its inbound event stream.
	pub fn new(store: Arc<dyn KeyValueStore>) -> (Arc<Self>, mpsc::UnboundedReceiver<PeerEvent>) {
		let (events, rx) = mpsc::unbounded_channel();
		let peer = Arc::new(Self {
			store,
			connections: Mutex::new(HashMap::new()),
			next_id: AtomicU64::new(1),
			published: Mutex::new(None),
			events,
		});
		(peer, rx)
	}

	/// Context this side publishes, sent to every socket right after `welcome`.
	pub fn published_context(&self) -> Option<SyncMessage> {
		self.published.lock().clone()
	}

	pub fn connection_count(&self) -> usize {
		self.connections.lock().len()
	}

	pub(crate) fn attach(&self, outbox: Outbox) -> u64 {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let first = {
			let mut connections = self.connections.lock();
			connections.insert(id, outbox);
			connections.len() == 1
		};
		debug!(target = "doorkey.sync", id, "peer socket attached");
		if first {
			let _ = self.events.send(PeerEvent::Reachability(true));
		}
		id
	}

	pub(crate) fn detach(&self, id: u64) {
		let last = {
			let mut connections = self.connections.lock();
			connections.remove(&id).is_some() && connections.is_empty()
		};
		debug!(target = "doorkey.sync", id, "peer socket detached");
		if last {
			let _ = self.events.send(PeerEvent::Reachability(false));
		}
	}

	/// Routes one inbound frame after the handshake.
	pub(crate) fn deliver(&self, frame: PeerFrame) {
		match frame {
			PeerFrame::Message { message } => {
				let _ = self.events.send(PeerEvent::Message(message));
			}
			PeerFrame::Context { context } => {
				self.remember_context(&context);
				let _ = self.events.send(PeerEvent::Context(context));
			}
			other => debug!(target = "doorkey.sync", frame = ?other, "ignoring handshake frame after handshake"),
		}
	}

	fn remember_context(&self, context: &SyncMessage) {
		let json = match context.to_json() {
			Ok(json) => json,
			Err(err) => {
				warn!(target = "doorkey.sync", error = %err, "not storing oversized peer context");
				return;
			}
		};
		self.store.set(RECEIVED_CONTEXT_KEY, Value::String(json));
		if let Err(err) = self.store.synchronize() {
			warn!(target = "doorkey.sync", error = %err, "could not persist peer context");
		}
	}

	fn broadcast(&self, frame: &PeerFrame) -> usize {
		let mut connections = self.connections.lock();
		connections.retain(|_, outbox| !outbox.is_closed());
		connections.values().filter(|outbox| outbox.send(frame.clone()).is_ok()).count()
	}
}

#[async_trait]
impl PeerChannel for WsPeer {
	fn is_reachable(&self) -> bool {
		self.connection_count() > 0
	}

	async fn send_message(&self, message: SyncMessage) -> Result<(), SyncError> {
		match self.broadcast(&PeerFrame::Message { message }) {
			0 => Err(SyncError::new("peer not connected")),
			_ => Ok(()),
		}
	}

	async fn update_context(&self, context: SyncMessage) -> Result<(), SyncError> {
		*self.published.lock() = Some(context.clone());
		let sent = self.broadcast(&PeerFrame::Context { context });
		debug!(target = "doorkey.sync", sockets = sent, "context published");
		Ok(())
	}

	fn received_context(&self) -> Option<SyncMessage> {
		let json = self.store.get_string(RECEIVED_CONTEXT_KEY)?;
		match SyncMessage::from_json(&json) {
			Ok(message) => Some(message),
			Err(err) => {
				warn!(target = "doorkey.sync", error = %err, "stored peer context is unreadable");
				None
			}
		}
	}
}

pub(crate) fn encode_frame(frame: &PeerFrame) -> Option<String> {
	match serde_json::to_string(frame) {
		Ok(text) => Some(text),
		Err(err) => {
			warn!(target = "doorkey.sync", error = %err, "could not encode frame");
			None
		}
	}
}

pub(crate) fn decode_frame(text: &str) -> Option<PeerFrame> {
	if text.len() > MAX_FRAME_BYTES {
		warn!(target = "doorkey.sync", bytes = text.len(), "dropping oversized frame");
		return None;
	}
	match serde_json::from_str(text) {
		Ok(frame) => Some(frame),
		Err(err) => {
			warn!(target = "doorkey.sync", error = %err, "dropping malformed frame");
			None
		}
	}
}
