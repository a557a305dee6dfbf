use doorkey::{SessionError, SyncError, TransportError, UnlockError};
use thiserror::Error;

use crate::output::ErrorCode;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Session(#[from] SessionError),

	#[error(transparent)]
	Unlock(#[from] UnlockError),

	#[error(transparent)]
	Sync(#[from] SyncError),

	#[error(transparent)]
	Transport(#[from] TransportError),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("{0}")]
	Context(String),
}

impl CliError {
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::Session(err) => match err {
				SessionError::InvalidLink(_) => ErrorCode::InvalidLink,
				SessionError::NoDoorIdFound => ErrorCode::NoDoorId,
				SessionError::InvalidResponse(_) => ErrorCode::InvalidResponse,
				SessionError::InvalidSession(_) => ErrorCode::InvalidSession,
				SessionError::Storage(_) => ErrorCode::StorageError,
			},
			CliError::Unlock(err) => match err {
				UnlockError::NotConfigured => ErrorCode::NotConfigured,
				UnlockError::SessionExpired => ErrorCode::SessionExpired,
				UnlockError::NetworkUnavailable => ErrorCode::NetworkUnavailable,
				UnlockError::UnexpectedResponse => ErrorCode::UnexpectedResponse,
				UnlockError::InProgress => ErrorCode::InProgress,
				UnlockError::Unknown(_) => ErrorCode::InternalError,
			},
			CliError::Sync(_) => ErrorCode::SyncFailed,
			CliError::Transport(_) => ErrorCode::NetworkUnavailable,
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Json(_) => ErrorCode::InvalidInput,
			CliError::InvalidInput(_) => ErrorCode::InvalidInput,
			CliError::Context(_) => ErrorCode::InternalError,
		}
	}
}

pub type Result<T> = std::result::Result<T, CliError>;
