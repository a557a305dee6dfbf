use doorkey::Language;
use doorkey::locale::UnknownLanguage;
use serde::Serialize;

use crate::app::App;
use crate::error::{CliError, Result};

#[derive(Debug, Serialize)]
pub struct LanguageReport {
	pub language: String,
	pub changed: bool,
}

/// Persists the language; a running `serve` pushes it to the peer on its next reload.
pub fn run(app: &App, tag: &str) -> Result<LanguageReport> {
	let language: Language = tag.parse().map_err(|err: UnknownLanguage| CliError::InvalidInput(err.to_string()))?;
	let changed = app.locale.set(language);
	app.save_language(language)?;
	Ok(LanguageReport {
		language: language.tag().to_string(),
		changed,
	})
}
