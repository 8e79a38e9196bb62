use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use snapglot_protocol::LanguagePair;

/// Translation collaborator.
pub trait Translator: Send {
	/// Checked before every request so an unconfigured engine is never called.
	fn is_available(&self) -> bool;

	fn supports_batch(&self) -> bool {
		false
	}

	fn translate(&mut self, text: &str, languages: &LanguagePair) -> Result<String>;

	/// Translations in the same order and count as `texts`.
	fn translate_batch(
		&mut self,
		texts: &[String],
		languages: &LanguagePair,
	) -> Result<Vec<String>> {
		texts.iter().map(|text| self.translate(text, languages)).collect()
	}
}

#[derive(Debug, Error)]
pub enum TranslateError {
	#[error("translator is not configured")]
	NotConfigured,

	#[error("translator returned {got} results for {expected} inputs")]
	CountMismatch { expected: usize, got: usize },

	#[error("translator responded with HTTP {status}: {body}")]
	Status { status: u16, body: String },
}

/// Always unavailable; forces the degraded pass-through path.
#[derive(Debug, Default)]
pub struct UnavailableTranslator {}

impl Translator for UnavailableTranslator {
	fn is_available(&self) -> bool {
		false
	}

	fn translate(&mut self, _text: &str, _languages: &LanguagePair) -> Result<String> {
		Err(TranslateError::NotConfigured.into())
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibreTranslateConfig {
	/// Base URL such as `http://localhost:5000`. Empty disables translation.
	#[serde(default)]
	pub endpoint: String,
	#[serde(default)]
	pub api_key: Option<String>,
	#[serde(default = "default_batch")]
	pub batch: bool,
	#[serde(default = "default_timeout_secs")]
	pub timeout_secs: u64,
}

impl Default for LibreTranslateConfig {
	fn default() -> Self {
		Self {
			endpoint: String::new(),
			api_key: None,
			batch: default_batch(),
			timeout_secs: default_timeout_secs(),
		}
	}
}

fn default_batch() -> bool {
	true
}

fn default_timeout_secs() -> u64 {
	15
}

#[derive(Serialize)]
struct TranslateRequest<'a, Q: Serialize> {
	q: Q,
	source: &'a str,
	target: &'a str,
	format: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse<T> {
	#[serde(rename = "translatedText")]
	translated_text: T,
}

/// Client for a LibreTranslate-compatible `/translate` endpoint.
pub struct LibreTranslateClient {
	config: LibreTranslateConfig,
	http: reqwest::blocking::Client,
}
impl LibreTranslateClient {
	pub fn new(config: LibreTranslateConfig) -> Result<Self> {
		let http = reqwest::blocking::Client::builder()
			.timeout(Duration::from_secs(config.timeout_secs.max(1)))
			.build()
			.wrap_err("failed to build translation HTTP client")?;

		Ok(Self { config, http })
	}

	fn url(&self) -> String {
		format!("{}/translate", self.config.endpoint.trim_end_matches('/'))
	}

	fn post<Q, T>(&self, q: Q, languages: &LanguagePair) -> Result<T>
	where
		Q: Serialize,
		T: DeserializeOwned,
	{
		let request = TranslateRequest {
			q,
			source: &languages.source,
			target: &languages.target,
			format: "text",
			api_key: self.config.api_key.as_deref(),
		};
		let response = self
			.http
			.post(self.url())
			.json(&request)
			.send()
			.wrap_err_with(|| format!("translation request to {} failed", self.url()))?;
		let status = response.status();

		if !status.is_success() {
			let body = response.text().unwrap_or_default();

			return Err(TranslateError::Status { status: status.as_u16(), body }.into());
		}

		let parsed: TranslateResponse<T> =
			response.json().wrap_err("failed to decode translation response")?;

		Ok(parsed.translated_text)
	}
}

impl Translator for LibreTranslateClient {
	fn is_available(&self) -> bool {
		!self.config.endpoint.trim().is_empty()
	}

	fn supports_batch(&self) -> bool {
		self.config.batch
	}

	fn translate(&mut self, text: &str, languages: &LanguagePair) -> Result<String> {
		if !self.is_available() {
			return Err(TranslateError::NotConfigured.into());
		}

		self.post::<_, String>(text, languages)
	}

	fn translate_batch(
		&mut self,
		texts: &[String],
		languages: &LanguagePair,
	) -> Result<Vec<String>> {
		if !self.is_available() {
			return Err(TranslateError::NotConfigured.into());
		}
		if texts.is_empty() {
			return Ok(Vec::new());
		}

		let translated = self.post::<_, Vec<String>>(texts, languages)?;

		if translated.len() != texts.len() {
			return Err(
				TranslateError::CountMismatch { expected: texts.len(), got: translated.len() }
					.into(),
			);
		}

		Ok(translated)
	}
}

#[cfg(test)]
mod tests {
	use snapglot_protocol::LanguagePair;

	use crate::translate::{
		LibreTranslateClient, LibreTranslateConfig, TranslateRequest, Translator,
		UnavailableTranslator,
	};

	#[test]
	fn unavailable_translator_refuses() {
		let mut translator = UnavailableTranslator::default();

		assert!(!translator.is_available());
		assert!(translator.translate("Hello", &LanguagePair::new("en", "vi")).is_err());
	}

	#[test]
	fn empty_endpoint_is_unavailable() {
		let client = LibreTranslateClient::new(LibreTranslateConfig::default()).unwrap();

		assert!(!client.is_available());

		let client = LibreTranslateClient::new(LibreTranslateConfig {
			endpoint: String::from("http://localhost:5000/"),
			..LibreTranslateConfig::default()
		})
		.unwrap();

		assert!(client.is_available());
		assert_eq!(client.url(), "http://localhost:5000/translate");
	}

	#[test]
	fn batch_request_sends_array() {
		let texts = vec![String::from("Hello"), String::from("World")];
		let request = TranslateRequest {
			q: &texts,
			source: "en",
			target: "vi",
			format: "text",
			api_key: None,
		};

		assert_eq!(
			serde_json::to_string(&request).unwrap(),
			r#"{"q":["Hello","World"],"source":"en","target":"vi","format":"text"}"#
		);
	}

	#[test]
	fn config_defaults_to_batching() {
		let config: LibreTranslateConfig = serde_json::from_str("{}").unwrap();

		assert!(config.batch);
		assert!(config.endpoint.is_empty());
		assert_eq!(config.timeout_secs, 15);
	}
}
