//! Display language shared between paired devices.

use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
	#[default]
	En,
	Ro,
	De,
	Fr,
	Es,
	Pt,
	Uk,
	Bg,
	Tr,
	He,
	Zh,
	Ja,
	Ko,
}

impl Language {
	pub const ALL: [Language; 13] = [
		Language::En,
		Language::Ro,
		Language::De,
		Language::Fr,
		Language::Es,
		Language::Pt,
		Language::Uk,
		Language::Bg,
		Language::Tr,
		Language::He,
		Language::Zh,
		Language::Ja,
		Language::Ko,
	];

	pub fn tag(self) -> &'static str {
		match self {
			Language::En => "en",
			Language::Ro => "ro",
			Language::De => "de",
			Language::Fr => "fr",
			Language::Es => "es",
			Language::Pt => "pt",
			Language::Uk => "uk",
			Language::Bg => "bg",
			Language::Tr => "tr",
			Language::He => "he",
			Language::Zh => "zh",
			Language::Ja => "ja",
			Language::Ko => "ko",
		}
	}

	/// Parses a tag such as `de`, `pt-BR` or `zh_Hans`; unknown tags give English.
	pub fn from_tag_or_default(tag: &str) -> Language {
		tag.parse().unwrap_or_default()
	}
}

impl fmt::Display for Language {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.tag())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language tag '{0}'")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
	type Err = UnknownLanguage;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let primary = s.trim().split(['-', '_']).next().unwrap_or_default().to_ascii_lowercase();
		Language::ALL
			.into_iter()
			.find(|language| language.tag() == primary)
			.ok_or_else(|| UnknownLanguage(s.to_string()))
	}
}

/// Current language, settable from the CLI or a peer payload.
#[derive(Debug, Default)]
pub struct LocaleState {
	current: RwLock<Language>,
}

impl LocaleState {
	pub fn new(language: Language) -> Self {
		Self {
			current: RwLock::new(language),
		}
	}

	pub fn get(&self) -> Language {
		*self.current.read()
	}

	/// Returns whether the language changed.
	pub fn set(&self, language: Language) -> bool {
		let mut current = self.current.write();
		if *current == language {
			return false;
		}
		debug!(target = "doorkey.sync", from = %*current, to = %language, "language changed");
		*current = language;
		true
	}
}
