//! Per-device settings and state directory layout.
//!
//! `settings.json` holds the peer link and network knobs; `state.json` next
//! to it is the key-value store behind the persisted session.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use doorkey::CookieAttachment;
use doorkey::connectivity::DEFAULT_PROBE_URL;
use doorkey::sync::REQUEST_TIMEOUT;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::{CliError, Result};

pub const SETTINGS_FILE: &str = "settings.json";
pub const STATE_FILE: &str = "state.json";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:7878";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
	/// Where `pull` connects, e.g. `ws://192.168.1.20:7878/sync`.
	pub peer_url: Option<String>,
	/// Where `serve` binds.
	pub listen: Option<String>,
	pub token: Option<String>,
	/// Starting language when nothing has been chosen yet.
	pub language: Option<String>,
	pub probe_url: Option<String>,
	pub request_timeout_secs: Option<u64>,
	pub cookie_attachment: CookieAttachment,
}

impl Settings {
	/// Missing or unreadable files yield defaults.
	pub fn load(dir: &Path) -> Self {
		let path = dir.join(SETTINGS_FILE);
		let Ok(content) = fs::read_to_string(&path) else {
			return Self::default();
		};
		serde_json::from_str(&content).unwrap_or_else(|err| {
			warn!(target = "doorkey.cli", path = %path.display(), error = %err, "ignoring invalid settings file");
			Self::default()
		})
	}

	pub fn save(&self, dir: &Path) -> Result<()> {
		fs::create_dir_all(dir)?;
		let json = serde_json::to_string_pretty(self)?;
		fs::write(dir.join(SETTINGS_FILE), json)?;
		Ok(())
	}

	pub fn listen(&self) -> &str {
		self.listen.as_deref().unwrap_or(DEFAULT_LISTEN)
	}

	pub fn request_timeout(&self) -> Duration {
		self.request_timeout_secs.map(Duration::from_secs).unwrap_or(REQUEST_TIMEOUT)
	}

	pub fn probe_url(&self) -> Result<Url> {
		let raw = self.probe_url.as_deref().unwrap_or(DEFAULT_PROBE_URL);
		Url::parse(raw).map_err(|e| CliError::InvalidInput(format!("probe_url {raw}: {e}")))
	}
}

/// `--state-dir` (or `DOORKEY_STATE_DIR`), else the platform config dir.
pub fn resolve_state_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
	if let Some(dir) = flag {
		return Ok(dir);
	}
	dirs::config_dir()
		.map(|dir| dir.join("doorkey"))
		.ok_or_else(|| CliError::Context("Could not determine config directory; pass --state-dir".into()))
}
