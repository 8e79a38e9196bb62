use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use snapglot_pipeline::{LibreTranslateConfig, OcrModelConfig, QueuePolicy};
use snapglot_protocol::{LanguagePair, MinSize};

const DISPLAY_DURATION_RANGE: std::ops::RangeInclusive<u64> = 1..=600;

/// Read once at startup; nothing writes it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
	#[serde(default = "default_source_lang")]
	pub source_lang: String,
	#[serde(default = "default_target_lang")]
	pub target_lang: String,
	#[serde(default = "default_region_hotkey")]
	pub region_hotkey: String,
	#[serde(default = "default_fullscreen_hotkey")]
	pub fullscreen_hotkey: String,
	#[serde(default = "default_display_duration_secs")]
	pub display_duration_secs: u64,
	#[serde(default = "default_min_selection_px")]
	pub min_selection_px: u32,
	#[serde(default)]
	pub queue_policy: QueuePolicy,
	#[serde(default)]
	pub translator: LibreTranslateConfig,
	#[serde(default)]
	pub recognizer: OcrModelConfig,
}
impl AppSettings {
	#[must_use]
	pub fn load() -> Self {
		match Self::path() {
			Some(path) if path.exists() => Self::load_from(&path),
			Some(path) => {
				tracing::info!(path = %path.display(), "No settings file; using defaults.");

				Self::default()
			},
			None => {
				tracing::warn!("No per-user config directory; using default settings.");

				Self::default()
			},
		}
	}

	#[must_use]
	pub fn load_from(path: &Path) -> Self {
		let text = match fs::read_to_string(path) {
			Ok(text) => text,
			Err(err) => {
				tracing::warn!(
					path = %path.display(),
					error = %err,
					"Failed to read settings; using defaults."
				);

				return Self::default();
			},
		};

		match Self::parse(&text) {
			Ok(settings) => {
				tracing::info!(path = %path.display(), "Loaded settings.");

				settings
			},
			Err(err) => {
				tracing::warn!(
					path = %path.display(),
					error = %err,
					"Invalid settings; using defaults."
				);

				Self::default()
			},
		}
	}

	pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
		let mut settings: Self = toml::from_str(text)?;

		settings.display_duration_secs = settings
			.display_duration_secs
			.clamp(*DISPLAY_DURATION_RANGE.start(), *DISPLAY_DURATION_RANGE.end());
		settings.min_selection_px = settings.min_selection_px.max(1);

		Ok(settings.with_default_models_dir())
	}

	#[must_use]
	pub fn languages(&self) -> LanguagePair {
		LanguagePair::new(self.source_lang.clone(), self.target_lang.clone())
	}

	#[must_use]
	pub fn display_duration(&self) -> Duration {
		Duration::from_secs(self.display_duration_secs)
	}

	#[must_use]
	pub fn min_size(&self) -> MinSize {
		MinSize::square(self.min_selection_px)
	}

	fn path() -> Option<PathBuf> {
		Some(Self::dirs()?.config_dir().join("settings.toml"))
	}

	fn dirs() -> Option<ProjectDirs> {
		ProjectDirs::from("ink", "hack", "snapglot")
	}

	/// OCR models live under the data directory unless the file says otherwise.
	fn with_default_models_dir(mut self) -> Self {
		if self.recognizer.models_dir.as_os_str().is_empty()
			&& let Some(dirs) = Self::dirs()
		{
			self.recognizer.models_dir = dirs.data_dir().join("models");
		}

		self
	}
}

impl Default for AppSettings {
	fn default() -> Self {
		Self {
			source_lang: default_source_lang(),
			target_lang: default_target_lang(),
			region_hotkey: default_region_hotkey(),
			fullscreen_hotkey: default_fullscreen_hotkey(),
			display_duration_secs: default_display_duration_secs(),
			min_selection_px: default_min_selection_px(),
			queue_policy: QueuePolicy::default(),
			translator: LibreTranslateConfig::default(),
			recognizer: OcrModelConfig::default(),
		}
		.with_default_models_dir()
	}
}

fn default_source_lang() -> String {
	String::from("en")
}

fn default_target_lang() -> String {
	String::from("vi")
}

fn default_region_hotkey() -> String {
	String::from("Ctrl+J")
}

fn default_fullscreen_hotkey() -> String {
	String::from("Ctrl+Shift+J")
}

fn default_display_duration_secs() -> u64 {
	10
}

fn default_min_selection_px() -> u32 {
	10
}
