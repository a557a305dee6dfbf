use serde::Serialize;
use tracing::info;

use super::status::timestamp;
use crate::app::App;
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct SetupReport {
	pub door_id: String,
	pub host: String,
	pub source: String,
	pub cookie: bool,
	pub expires: Option<String>,
	pub hops: usize,
	pub link: String,
}

/// Walks `link` and stores the session it grants.
pub async fn run(app: &App, link: &str) -> Result<SetupReport> {
	let resolution = app.walker().resolve(link).await?;
	let session = app.session.apply_resolution(&resolution)?;
	info!(target = "doorkey.cli", door_id = %session.door_id, host = %session.base_host, cookie = !session.cookie_value.is_empty(), "room link set up");

	Ok(SetupReport {
		door_id: session.door_id,
		host: session.base_host,
		source: resolution.source.to_string(),
		cookie: !session.cookie_value.is_empty(),
		expires: session.cookie_expiry.map(timestamp),
		hops: resolution.steps.len(),
		link: resolution.link.to_string(),
	})
}
