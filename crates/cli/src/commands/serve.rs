use std::sync::Arc;
use std::time::Duration;

use doorkey::{ConnectivityMonitor, Language, SyncManager};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::App;
use crate::error::{CliError, Result};
use crate::peer::{SYNC_PATH, WsPeer, server};

/// How often the primary re-reads its state directory for changes made by other commands.
pub const RELOAD_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct ServeReport {
	pub listen: String,
	pub url: String,
	pub token: String,
	pub configured: bool,
	pub door_id: Option<String>,
}

/// Primary device flow: publish the session and answer the secondary until Ctrl+C.
///
/// `started` receives the report once the socket is bound.
pub async fn run(app: App, listen: Option<String>, token: Option<String>, started: impl FnOnce(ServeReport)) -> Result<()> {
	let listen = listen.unwrap_or_else(|| app.settings.listen().to_string());
	let token = match token.or_else(|| app.settings.token.clone()) {
		Some(token) => token,
		None => {
			let token = generate_token();
			let mut settings = app.settings.clone();
			settings.token = Some(token.clone());
			settings.save(&app.state_dir)?;
			info!(target = "doorkey.cli", "generated peer token and saved it to settings");
			token
		}
	};
	let app = Arc::new(app);

	let (peer, events) = WsPeer::new(app.store.clone());
	let manager = Arc::new(SyncManager::new(peer.clone(), app.session.clone(), app.locale.clone()).with_request_timeout(app.settings.request_timeout()));
	let inbound = manager.spawn_inbound_loop(events);
	let forwarder = manager.spawn_session_forwarder();
	manager.push_session().await?;

	let listener = tokio::net::TcpListener::bind(&listen)
		.await
		.map_err(|e| CliError::Context(format!("Failed to bind to {listen}: {e}")))?;
	let addr = listener.local_addr()?;

	let session = app.session.snapshot();
	started(ServeReport {
		listen: addr.to_string(),
		url: format!("ws://{addr}{SYNC_PATH}"),
		token: token.clone(),
		configured: session.configured,
		door_id: (!session.door_id.is_empty()).then_some(session.door_id),
	});
	info!(target = "doorkey.cli", %addr, "serving peer link");

	let monitor = app.monitor()?;
	let connectivity = watch_connectivity(&monitor);
	let reloader = spawn_reloader(app.clone(), manager);
	let served = axum::serve(listener, server::router(peer, &token)).with_graceful_shutdown(shutdown_signal()).await;

	monitor.stop();
	connectivity.abort();
	reloader.abort();
	forwarder.abort();
	inbound.abort();
	served.map_err(|e| CliError::Context(format!("Server error: {e}")))?;
	info!(target = "doorkey.cli", "peer link stopped");
	Ok(())
}

/// Picks up `setup`, `clear` and `language` runs from other processes.
///
/// Session changes reach the peer through the session forwarder. A language
/// changed on disk is pushed; one changed by the peer is written back.
fn spawn_reloader(app: Arc<App>, manager: Arc<SyncManager>) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(RELOAD_INTERVAL);
		ticker.tick().await;
		let mut on_disk = app.reload_language();
		loop {
			ticker.tick().await;
			match app.session.reload() {
				Ok(true) => info!(target = "doorkey.cli", "session changed on disk"),
				Ok(false) => debug!(target = "doorkey.cli", "state reloaded"),
				Err(err) => warn!(target = "doorkey.cli", error = %err, "could not reload state"),
			}

			let stored = app.reload_language();
			if stored != on_disk {
				on_disk = stored;
				if let Some(language) = stored {
					app.locale.set(language);
					if let Err(err) = manager.push_language().await {
						warn!(target = "doorkey.cli", error = %err, "language push failed");
					}
				}
				continue;
			}
			let current = app.locale.get();
			if stored != Some(current) {
				persist_peer_language(&app, current);
				on_disk = Some(current);
			}
		}
	})
}

/// Starts periodic probing and logs each change in network reachability.
fn watch_connectivity(monitor: &Arc<ConnectivityMonitor>) -> JoinHandle<()> {
	let mut state = monitor.subscribe();
	monitor.start();
	tokio::spawn(async move {
		while state.changed().await.is_ok() {
			let current = *state.borrow_and_update();
			if current.has_internet {
				info!(target = "doorkey.cli", "network reachable");
			} else {
				warn!(target = "doorkey.cli", "network unreachable, peers can still pull the last session");
			}
		}
	})
}

fn persist_peer_language(app: &App, language: Language) {
	match app.save_language(language) {
		Ok(()) => debug!(target = "doorkey.cli", %language, "language from peer saved"),
		Err(err) => warn!(target = "doorkey.cli", error = %err, "could not save language"),
	}
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		warn!(target = "doorkey.cli", error = %err, "could not listen for Ctrl+C");
		std::future::pending::<()>().await;
	}
}

/// Random 128-bit peer token, hex encoded.
fn generate_token() -> String {
	Uuid::new_v4().simple().to_string()
}
