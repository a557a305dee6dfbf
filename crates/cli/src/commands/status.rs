use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::app::App;
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct StatusReport {
	pub configured: bool,
	pub valid: bool,
	pub door_id: Option<String>,
	pub host: Option<String>,
	pub cookie: bool,
	pub expires: Option<String>,
	pub last_sync: Option<String>,
	pub link: Option<String>,
	pub language: String,
}

#[derive(Debug, Serialize)]
pub struct ClearReport {
	pub cleared: bool,
}

/// RFC 3339, UTC, whole seconds.
pub(super) fn timestamp(at: SystemTime) -> String {
	DateTime::<Utc>::from(at).to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn non_empty(value: String) -> Option<String> {
	(!value.is_empty()).then_some(value)
}

pub fn run(app: &App) -> StatusReport {
	let session = app.session.snapshot();
	let link = app.session.link();
	StatusReport {
		configured: session.configured,
		valid: session.configured && session.is_valid(),
		cookie: !session.cookie_value.is_empty(),
		expires: session.cookie_expiry.map(timestamp),
		door_id: non_empty(session.door_id),
		host: non_empty(session.base_host),
		last_sync: app.session.last_sync().map(timestamp),
		link: non_empty(link.link),
		language: app.locale.get().tag().to_string(),
	}
}

pub fn clear(app: &App) -> Result<ClearReport> {
	app.session.clear()?;
	Ok(ClearReport { cleared: true })
}

#[cfg(test)]
mod tests {
	use std::time::{Duration, UNIX_EPOCH};

	use super::*;

	#[test]
	fn timestamps_are_utc_seconds() {
		assert_eq!(timestamp(UNIX_EPOCH + Duration::from_millis(1_700_000_000_250)), "2023-11-14T22:13:20Z");
	}

	#[test]
	fn fresh_state_is_not_configured() {
		let dir = tempfile::tempdir().unwrap();
		let app = App::open(dir.path().to_path_buf()).unwrap();
		let report = run(&app);
		assert!(!report.configured);
		assert!(!report.valid);
		assert_eq!(report.door_id, None);
		assert_eq!(report.language, "en");
	}
}
