//! Conversions between [`Session`] and the wire [`SyncMessage`].

use doorkey_protocol::{SyncAction, SyncMessage};

use crate::locale::Language;
use crate::session::{Session, expiry_from_epoch, expiry_to_epoch, normalize_host};

/// Full `sessionUpdate` snapshot of `session`.
pub fn session_message(session: &Session, language: Language) -> SyncMessage {
	SyncMessage {
		action: SyncAction::SessionUpdate,
		door_id: session.door_id.clone(),
		base_url: session.base_host.clone(),
		cookie: session.cookie_value.clone(),
		cookie_expiry: expiry_to_epoch(session.cookie_expiry),
		is_configured: session.configured,
		language: Some(language.tag().to_string()),
	}
}

/// Session carried by a `sessionUpdate` payload.
pub fn session_from_message(message: &SyncMessage) -> Session {
	Session {
		door_id: message.door_id.trim().to_string(),
		base_host: normalize_host(&message.base_url),
		cookie_value: message.cookie.clone(),
		cookie_expiry: expiry_from_epoch(message.cookie_expiry),
		configured: message.is_configured,
	}
}
