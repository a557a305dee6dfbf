use doorkey::{CookieAttachment, UnlockError};
use serde::Serialize;
use tracing::info;

use crate::app::App;
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct UnlockReport {
	pub unlocked: bool,
	pub door_id: String,
	pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshReport {
	pub valid: bool,
	pub door_id: String,
}

/// One unlock attempt; any failure becomes the command's error.
pub async fn run(app: &App, attachment: CookieAttachment) -> Result<UnlockReport> {
	let engine = app.engine(attachment)?;
	engine.unlock().await.into_result()?;
	let door_id = app.session.snapshot().door_id;
	info!(target = "doorkey.cli", door_id = %door_id, "door unlocked");
	Ok(UnlockReport {
		unlocked: true,
		door_id,
		message: engine.status().message,
	})
}

/// Refresh pass only. A session that stays invalid is reported as expired.
pub async fn refresh(app: &App) -> Result<RefreshReport> {
	let engine = app.engine(app.settings.cookie_attachment)?;
	if !engine.refresh().await? {
		return Err(UnlockError::SessionExpired.into());
	}
	Ok(RefreshReport {
		valid: true,
		door_id: app.session.snapshot().door_id,
	})
}
