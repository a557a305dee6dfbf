//! Primary side of the peer link.
//!
//! # Protocol
//!
//! 1. The secondary connects to [`SYNC_PATH`] and sends `hello {token}`
//! 2. The primary answers `welcome` or `rejected` and closes on rejection
//! 3. After `welcome` the primary sends its current `context`
//! 4. Both sides then exchange `message` frames; context changes follow as `context` frames

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use doorkey_protocol::PeerFrame;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{SYNC_PATH, WsPeer, decode_frame, encode_frame};

/// How long a fresh socket has to present its token.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct ServeState {
	peer: Arc<WsPeer>,
	token: Arc<str>,
}

pub fn router(peer: Arc<WsPeer>, token: &str) -> Router {
	let state = ServeState { peer, token: token.into() };
	Router::new().route(SYNC_PATH, get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServeState>) -> impl IntoResponse {
	ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: ServeState) {
	let (mut sender, mut receiver) = socket.split();

	let rejection = match tokio::time::timeout(HANDSHAKE_TIMEOUT, next_frame(&mut receiver)).await {
		Ok(Some(PeerFrame::Hello { token })) if *token == *state.token => None,
		Ok(Some(PeerFrame::Hello { .. })) => Some("Invalid token"),
		Ok(Some(_)) => Some("Expected hello"),
		Ok(None) => return,
		Err(_) => Some("Handshake timed out"),
	};
	if let Some(reason) = rejection {
		info!(target = "doorkey.sync", reason, "peer rejected");
		let _ = send_frame(&mut sender, &PeerFrame::Rejected { reason: reason.into() }).await;
		let _ = sender.close().await;
		return;
	}

	let welcome = PeerFrame::Welcome {
		version: env!("CARGO_PKG_VERSION").into(),
	};
	if send_frame(&mut sender, &welcome).await.is_err() {
		return;
	}
	if let Some(context) = state.peer.published_context() {
		if send_frame(&mut sender, &PeerFrame::Context { context }).await.is_err() {
			return;
		}
	}
	info!(target = "doorkey.sync", "peer connected");

	let (outbox, mut frames) = mpsc::unbounded_channel();
	let id = state.peer.attach(outbox);
	let writer = tokio::spawn(async move {
		while let Some(frame) = frames.recv().await {
			if send_frame(&mut sender, &frame).await.is_err() {
				break;
			}
		}
	});

	while let Some(frame) = next_frame(&mut receiver).await {
		state.peer.deliver(frame);
	}

	state.peer.detach(id);
	writer.abort();
	info!(target = "doorkey.sync", "peer disconnected");
}

async fn next_frame(receiver: &mut SplitStream<WebSocket>) -> Option<PeerFrame> {
	while let Some(msg) = receiver.next().await {
		match msg {
			Ok(Message::Text(text)) => {
				if let Some(frame) = decode_frame(text.as_str()) {
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

async fn send_frame(sender: &mut SplitSink<WebSocket, Message>, frame: &PeerFrame) -> Result<(), axum::Error> {
	let Some(text) = encode_frame(frame) else {
		return Ok(());
	};
	debug!(target = "doorkey.sync", bytes = text.len(), "frame out");
	sender.send(Message::Text(text.into())).await
}
