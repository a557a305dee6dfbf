//! Session sync payload exchanged between paired devices.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound for one encoded payload.
///
/// Mirrors the message size ceiling of typical companion-device links.
pub const MAX_PAYLOAD_BYTES: usize = 65_536;

/// What the receiving device should do with a [`SyncMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncAction {
	/// Carries a full session snapshot.
	SessionUpdate,
	/// Asks the peer to push a fresh `sessionUpdate`.
	RequestUpdate,
	/// Carries only a locale tag.
	LanguageUpdate,
}

impl fmt::Display for SyncAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncAction::SessionUpdate => write!(f, "sessionUpdate"),
			SyncAction::RequestUpdate => write!(f, "requestUpdate"),
			SyncAction::LanguageUpdate => write!(f, "languageUpdate"),
		}
	}
}

/// Flat key-value sync payload.
///
/// `cookie_expiry` is epoch seconds, `0` meaning "no expiry". Fields that an
/// action does not use are left at their defaults and tolerated when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
	pub action: SyncAction,
	#[serde(default)]
	pub door_id: String,
	#[serde(default)]
	pub base_url: String,
	#[serde(default)]
	pub cookie: String,
	#[serde(default)]
	pub cookie_expiry: f64,
	#[serde(default)]
	pub is_configured: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub language: Option<String>,
}

impl SyncMessage {
	/// A bare `requestUpdate` message.
	pub fn request_update() -> Self {
		Self {
			action: SyncAction::RequestUpdate,
			door_id: String::new(),
			base_url: String::new(),
			cookie: String::new(),
			cookie_expiry: 0.0,
			is_configured: false,
			language: None,
		}
	}

	/// A `languageUpdate` message carrying only `tag`.
	pub fn language_update(tag: impl Into<String>) -> Self {
		Self {
			action: SyncAction::LanguageUpdate,
			language: Some(tag.into()),
			..Self::request_update()
		}
	}

	/// Encodes to JSON, rejecting payloads above [`MAX_PAYLOAD_BYTES`].
	pub fn to_json(&self) -> Result<String, PayloadError> {
		let json = serde_json::to_string(self)?;
		if json.len() > MAX_PAYLOAD_BYTES {
			return Err(PayloadError::TooLarge {
				size: json.len(),
				limit: MAX_PAYLOAD_BYTES,
			});
		}
		Ok(json)
	}

	/// Decodes from JSON, rejecting oversized input before parsing.
	pub fn from_json(json: &str) -> Result<Self, PayloadError> {
		if json.len() > MAX_PAYLOAD_BYTES {
			return Err(PayloadError::TooLarge {
				size: json.len(),
				limit: MAX_PAYLOAD_BYTES,
			});
		}
		Ok(serde_json::from_str(json)?)
	}
}

/// Failure to encode or decode a sync payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
	#[error("malformed sync payload: {0}")]
	Json(#[from] serde_json::Error),
	#[error("sync payload of {size} bytes exceeds {limit} bytes")]
	TooLarge { size: usize, limit: usize },
}
