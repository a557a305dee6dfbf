//! Error taxonomy shared across the session, unlock and sync layers.

use thiserror::Error;

/// Errors from link resolution and session bookkeeping.
#[derive(Debug, Error)]
pub enum SessionError {
	#[error("Invalid link. Paste the complete link from your message: {0}")]
	InvalidLink(String),

	#[error("Could not extract door information from the link")]
	NoDoorIdFound,

	#[error("Unable to process the link: {0}")]
	InvalidResponse(String),

	#[error("Session snapshot is inconsistent: {0}")]
	InvalidSession(String),

	#[error("Unable to save session data: {0}")]
	Storage(String),
}

impl From<std::io::Error> for SessionError {
	fn from(err: std::io::Error) -> Self {
		SessionError::Storage(err.to_string())
	}
}

impl From<serde_json::Error> for SessionError {
	fn from(err: serde_json::Error) -> Self {
		SessionError::Storage(err.to_string())
	}
}

/// Reasons an unlock attempt did not open the door.
///
/// The display text is the short message shown to the person at the door.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnlockError {
	#[error("Set up your room link first")]
	NotConfigured,

	#[error("Session expired. Refresh the session on your primary device")]
	SessionExpired,

	#[error("No network connection")]
	NetworkUnavailable,

	#[error("The door service answered unexpectedly. Try again in a moment")]
	UnexpectedResponse,

	#[error("An unlock is already in progress")]
	InProgress,

	#[error("Something went wrong: {0}")]
	Unknown(String),
}

/// Failures below HTTP semantics: the request never produced a status.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("invalid url: {0}")]
	InvalidUrl(String),

	#[error("request timed out: {0}")]
	Timeout(String),

	#[error("connection failed: {0}")]
	Connect(String),

	#[error("request failed: {0}")]
	Request(String),
}

impl From<reqwest::Error> for TransportError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_timeout() {
			TransportError::Timeout(err.to_string())
		} else if err.is_connect() {
			TransportError::Connect(err.to_string())
		} else if err.is_builder() {
			TransportError::InvalidUrl(err.to_string())
		} else {
			TransportError::Request(err.to_string())
		}
	}
}

/// Sync failures are binary to the user; the reason is for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not sync: {reason}")]
pub struct SyncError {
	pub reason: String,
}

impl SyncError {
	pub fn new(reason: impl Into<String>) -> Self {
		Self { reason: reason.into() }
	}
}

/// Result alias for session-layer operations.
pub type Result<T, E = SessionError> = std::result::Result<T, E>;
