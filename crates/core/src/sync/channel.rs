//! Transport-agnostic link to the paired device.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use doorkey_protocol::SyncMessage;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::SyncError;

/// Inbound traffic from the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
	/// Immediate delivery.
	Message(SyncMessage),
	/// The peer's durable context changed.
	Context(SyncMessage),
	Reachability(bool),
}

/// Two delivery paths to the peer: immediate messages that need the peer to
/// be reachable, and a durable context the peer reads whenever it can.
#[async_trait]
pub trait PeerChannel: Send + Sync {
	fn is_reachable(&self) -> bool;

	async fn send_message(&self, message: SyncMessage) -> Result<(), SyncError>;

	/// Replaces the context published to the peer.
	async fn update_context(&self, context: SyncMessage) -> Result<(), SyncError>;

	/// Last context the peer published to us.
	fn received_context(&self) -> Option<SyncMessage>;
}

struct Link {
	reachable: AtomicBool,
	contexts: [Mutex<Option<SyncMessage>>; 2],
	inboxes: [mpsc::UnboundedSender<PeerEvent>; 2],
}

/// One endpoint of a [`MemoryLink`] with its inbound event stream.
pub type MemoryEndpoint = (MemoryPeer, mpsc::UnboundedReceiver<PeerEvent>);

/// In-process pair of connected peers.
pub struct MemoryLink;

impl MemoryLink {
	/// Two endpoints with their inbound event streams. Starts reachable.
	pub fn pair() -> (MemoryEndpoint, MemoryEndpoint) {
		let (tx_a, rx_a) = mpsc::unbounded_channel();
		let (tx_b, rx_b) = mpsc::unbounded_channel();
		let link = Arc::new(Link {
			reachable: AtomicBool::new(true),
			contexts: [Mutex::new(None), Mutex::new(None)],
			inboxes: [tx_a, tx_b],
		});
		(
			(MemoryPeer { link: link.clone(), side: 0 }, rx_a),
			(MemoryPeer { link, side: 1 }, rx_b),
		)
	}
}

/// One side of a [`MemoryLink`].
#[derive(Clone)]
pub struct MemoryPeer {
	link: Arc<Link>,
	side: usize,
}

impl MemoryPeer {
	fn other(&self) -> usize {
		1 - self.side
	}

	/// Flips reachability for both sides and notifies them.
	pub fn set_reachable(&self, reachable: bool) {
		if self.link.reachable.swap(reachable, Ordering::SeqCst) == reachable {
			return;
		}
		for inbox in &self.link.inboxes {
			let _ = inbox.send(PeerEvent::Reachability(reachable));
		}
	}
}

#[async_trait]
impl PeerChannel for MemoryPeer {
	fn is_reachable(&self) -> bool {
		self.link.reachable.load(Ordering::SeqCst)
	}

	async fn send_message(&self, message: SyncMessage) -> Result<(), SyncError> {
		if !self.is_reachable() {
			return Err(SyncError::new("peer not reachable"));
		}
		self.link.inboxes[self.other()]
			.send(PeerEvent::Message(message))
			.map_err(|_| SyncError::new("peer endpoint dropped"))
	}

	/// Stored for the peer unconditionally; pushed as an event only while reachable.
	async fn update_context(&self, context: SyncMessage) -> Result<(), SyncError> {
		let other = self.other();
		*self.link.contexts[other].lock() = Some(context.clone());
		if self.is_reachable() {
			let _ = self.link.inboxes[other].send(PeerEvent::Context(context));
		}
		Ok(())
	}

	fn received_context(&self) -> Option<SyncMessage> {
		self.link.contexts[self.side].lock().clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn messages_need_reachability_but_contexts_do_not() {
		let ((a, _rx_a), (b, mut rx_b)) = MemoryLink::pair();

		a.send_message(SyncMessage::request_update()).await.unwrap();
		assert_eq!(rx_b.recv().await, Some(PeerEvent::Message(SyncMessage::request_update())));

		a.set_reachable(false);
		assert_eq!(rx_b.recv().await, Some(PeerEvent::Reachability(false)));
		assert!(a.send_message(SyncMessage::request_update()).await.is_err());

		let context = SyncMessage::language_update("fr");
		a.update_context(context.clone()).await.unwrap();
		assert_eq!(b.received_context(), Some(context));
		assert_eq!(a.received_context(), None);
		assert!(rx_b.try_recv().is_err());
	}
}
