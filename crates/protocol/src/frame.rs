//! Framing for the WebSocket peer link.
//!
//! # Protocol
//!
//! 1. Secondary connects and sends `Hello { token }`
//! 2. Primary validates the token and responds with `Welcome` or `Rejected`
//! 3. Either side sends `Message` frames for immediate delivery
//! 4. The primary sends a `Context` frame after `Welcome` and whenever its
//!    durable context changes

use serde::{Deserialize, Serialize};

use crate::sync::SyncMessage;

/// One frame on the peer link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerFrame {
	Hello { token: String },
	Welcome { version: String },
	Rejected { reason: String },
	Message { message: SyncMessage },
	Context { context: SyncMessage },
}
