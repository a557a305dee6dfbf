use std::sync::Arc;

use doorkey::{SyncError, SyncManager};
use serde::Serialize;
use tracing::{info, warn};

use crate::app::App;
use crate::error::{CliError, Result};
use crate::peer::{WsPeer, client};

#[derive(Debug, Serialize)]
pub struct PullReport {
	pub connected: bool,
	pub synced: bool,
	pub configured: bool,
	pub valid: bool,
	pub door_id: Option<String>,
	pub language: String,
	pub unlocked: Option<bool>,
}

/// Secondary device flow: connect, ask for a session, optionally unlock.
///
/// An unreachable primary falls back to the last context it published. With
/// `unlock` set, a failed sync still attempts the unlock with the stored session.
pub async fn run(app: &App, peer_url: Option<String>, token: Option<String>, unlock: bool) -> Result<PullReport> {
	let url = peer_url
		.or_else(|| app.settings.peer_url.clone())
		.ok_or_else(|| CliError::InvalidInput("no peer URL; pass --peer or set peer_url in settings.json".into()))?;
	let token = token
		.or_else(|| app.settings.token.clone())
		.ok_or_else(|| CliError::InvalidInput("no peer token; pass --token or set token in settings.json".into()))?;
	let timeout = app.settings.request_timeout();

	let (peer, events) = WsPeer::new(app.store.clone());
	let manager = Arc::new(SyncManager::new(peer.clone(), app.session.clone(), app.locale.clone()).with_request_timeout(timeout));
	let inbound = manager.spawn_inbound_loop(events);

	let link = match tokio::time::timeout(timeout, client::connect(&url, &token, peer)).await {
		Ok(Ok(link)) => Some(link),
		Ok(Err(err)) => {
			warn!(target = "doorkey.cli", %url, error = %err, "primary unreachable");
			None
		}
		Err(_) => {
			warn!(target = "doorkey.cli", %url, ?timeout, "primary did not answer in time");
			None
		}
	};
	let connected = link.is_some();

	let synced = manager.request_update().await;
	if let Some(link) = link {
		link.abort();
	}
	inbound.abort();

	if synced {
		app.save_language(app.locale.get())?;
		info!(target = "doorkey.cli", connected, door_id = %app.session.snapshot().door_id, "session pulled");
	} else if !unlock {
		return Err(SyncError::new(if connected { "primary did not send a session" } else { "primary unreachable and no stored context" }).into());
	} else {
		warn!(target = "doorkey.cli", "sync failed, unlocking with the stored session");
	}

	let unlocked = if unlock {
		let engine = app.engine(app.settings.cookie_attachment)?;
		engine.unlock().await.into_result()?;
		Some(true)
	} else {
		None
	};

	let session = app.session.snapshot();
	Ok(PullReport {
		connected,
		synced,
		configured: session.configured,
		valid: session.configured && session.is_valid(),
		door_id: (!session.door_id.is_empty()).then_some(session.door_id),
		language: app.locale.get().tag().to_string(),
		unlocked,
	})
}
