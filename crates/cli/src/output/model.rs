use serde::{Deserialize, Serialize};

/// The result envelope returned by all commands.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub duration_ms: Option<u64>,
}

/// Error information for failed commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

/// Stable error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	InvalidLink,
	NoDoorId,
	InvalidResponse,
	InvalidSession,
	StorageError,
	NotConfigured,
	SessionExpired,
	NetworkUnavailable,
	UnexpectedResponse,
	InProgress,
	SyncFailed,
	IoError,
	InvalidInput,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let code = match self {
			ErrorCode::InvalidLink => "INVALID_LINK",
			ErrorCode::NoDoorId => "NO_DOOR_ID",
			ErrorCode::InvalidResponse => "INVALID_RESPONSE",
			ErrorCode::InvalidSession => "INVALID_SESSION",
			ErrorCode::StorageError => "STORAGE_ERROR",
			ErrorCode::NotConfigured => "NOT_CONFIGURED",
			ErrorCode::SessionExpired => "SESSION_EXPIRED",
			ErrorCode::NetworkUnavailable => "NETWORK_UNAVAILABLE",
			ErrorCode::UnexpectedResponse => "UNEXPECTED_RESPONSE",
			ErrorCode::InProgress => "IN_PROGRESS",
			ErrorCode::SyncFailed => "SYNC_FAILED",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(code)
	}
}
