//! Secondary side of the peer link.

use std::sync::Arc;

use doorkey::SyncError;
use doorkey_protocol::PeerFrame;
use futures::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use super::server::HANDSHAKE_TIMEOUT;
use super::{WsPeer, decode_frame, encode_frame};

/// Connects, authenticates with `token` and attaches the socket to `peer`.
///
/// Returns once the primary has sent `welcome`; the returned task pumps the
/// socket until either side closes it.
pub async fn connect(url: &str, token: &str, peer: Arc<WsPeer>) -> Result<JoinHandle<()>, SyncError> {
	let (socket, _) = connect_async(url).await.map_err(|e| SyncError::new(format!("connect {url}: {e}")))?;
	let (mut sink, mut stream) = socket.split();

	let hello = encode_frame(&PeerFrame::Hello { token: token.to_string() }).ok_or_else(|| SyncError::new("could not encode hello"))?;
	sink.send(Message::Text(hello)).await.map_err(|e| SyncError::new(format!("send hello: {e}")))?;

	match tokio::time::timeout(HANDSHAKE_TIMEOUT, next_frame(&mut stream)).await {
		Ok(Some(PeerFrame::Welcome { version })) => info!(target = "doorkey.sync", %url, %version, "connected to primary"),
		Ok(Some(PeerFrame::Rejected { reason })) => return Err(SyncError::new(format!("primary rejected the connection: {reason}"))),
		Ok(Some(other)) => return Err(SyncError::new(format!("unexpected handshake frame {other:?}"))),
		Ok(None) => return Err(SyncError::new("primary closed the connection during handshake")),
		Err(_) => return Err(SyncError::new("handshake timed out")),
	}

	let (outbox, mut frames) = mpsc::unbounded_channel();
	let id = peer.attach(outbox);
	Ok(tokio::spawn(async move {
		let writer = async {
			while let Some(frame) = frames.recv().await {
				let Some(text) = encode_frame(&frame) else {
					continue;
				};
				if let Err(err) = sink.send(Message::Text(text)).await {
					debug!(target = "doorkey.sync", error = %err, "socket write failed");
					break;
				}
			}
		};
		let reader = async {
			while let Some(frame) = next_frame(&mut stream).await {
				peer.deliver(frame);
			}
		};
		tokio::select! {
			_ = writer => {}
			_ = reader => {}
		}
		peer.detach(id);
		debug!(target = "doorkey.sync", "primary link closed");
	}))
}

async fn next_frame<S>(stream: &mut S) -> Option<PeerFrame>
where
	S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
	while let Some(msg) = stream.next().await {
		match msg {
			Ok(Message::Text(text)) => {
				if let Some(frame) = decode_frame(&text) {
					return Some(frame);
				}
			}
			Ok(Message::Close(_)) => return None,
			Ok(_) => continue,
			Err(err) => {
				warn!(target = "doorkey.sync", error = %err, "websocket error");
				return None;
			}
		}
	}
	None
}
