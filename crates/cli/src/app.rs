//! Wires the core services over one state directory.

use std::path::PathBuf;
use std::sync::Arc;

use doorkey::{
	BrowserClient, ConnectivityMonitor, CookieAttachment, CookieJar, EngineOptions, JsonFileStore, KeyValueStore, Language, LocaleState, RedirectWalker, ReqwestTransport, SessionRepository,
	SessionService, UnlockEngine,
};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::settings::{STATE_FILE, Settings};

/// Store key of the chosen language tag.
pub const LANGUAGE_KEY: &str = "doorkey.locale.language";

pub struct App {
	pub state_dir: PathBuf,
	pub settings: Settings,
	pub store: Arc<JsonFileStore>,
	pub session: Arc<SessionService>,
	pub client: BrowserClient,
	pub locale: Arc<LocaleState>,
	transport: Arc<ReqwestTransport>,
}

impl App {
	pub fn open(state_dir: PathBuf) -> Result<Self> {
		let settings = Settings::load(&state_dir);
		let store = Arc::new(JsonFileStore::open(state_dir.join(STATE_FILE)));
		let jar = Arc::new(CookieJar::new());
		let session = Arc::new(SessionService::load(SessionRepository::new(store.clone()), jar.clone()));
		let transport = Arc::new(ReqwestTransport::new()?);
		let client = BrowserClient::new(transport.clone(), jar);
		let language = stored_language(&*store)
			.or_else(|| settings.language.as_deref().map(Language::from_tag_or_default))
			.unwrap_or_default();
		debug!(target = "doorkey.cli", dir = %state_dir.display(), %language, configured = session.snapshot().configured, "state opened");

		Ok(Self {
			state_dir,
			settings,
			store,
			session,
			client,
			locale: Arc::new(LocaleState::new(language)),
			transport,
		})
	}

	pub fn walker(&self) -> RedirectWalker {
		RedirectWalker::new(self.client.clone())
	}

	/// Connectivity prober against the configured probe URL.
	pub fn monitor(&self) -> Result<Arc<ConnectivityMonitor>> {
		Ok(Arc::new(ConnectivityMonitor::new(self.transport.clone(), self.settings.probe_url()?)))
	}

	pub fn engine(&self, cookie_attachment: CookieAttachment) -> Result<UnlockEngine> {
		let monitor = self.monitor()?;
		let options = EngineOptions {
			cookie_attachment,
			..EngineOptions::default()
		};
		Ok(UnlockEngine::new(self.client.clone(), self.session.clone()).with_connectivity(monitor).with_options(options))
	}

	/// Language persisted in the state store, re-read from disk.
	pub fn reload_language(&self) -> Option<Language> {
		self.store.reload();
		stored_language(&*self.store)
	}

	pub fn save_language(&self, language: Language) -> Result<()> {
		self.store.set(LANGUAGE_KEY, Value::String(language.tag().to_string()));
		self.store.synchronize()?;
		Ok(())
	}
}

fn stored_language(store: &dyn KeyValueStore) -> Option<Language> {
	store.get_string(LANGUAGE_KEY).map(|tag| Language::from_tag_or_default(&tag))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn language_survives_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let app = App::open(dir.path().to_path_buf()).unwrap();
		assert_eq!(app.locale.get(), Language::En);

		app.save_language(Language::Ja).unwrap();

		let reopened = App::open(dir.path().to_path_buf()).unwrap();
		assert_eq!(reopened.locale.get(), Language::Ja);
		assert_eq!(reopened.reload_language(), Some(Language::Ja));
	}

	#[test]
	fn settings_language_is_the_fallback() {
		let dir = tempfile::tempdir().unwrap();
		Settings {
			language: Some("fr".into()),
			..Settings::default()
		}
		.save(dir.path())
		.unwrap();

		let app = App::open(dir.path().to_path_buf()).unwrap();
		assert_eq!(app.locale.get(), Language::Fr);
	}
}
