use std::path::{Path, PathBuf};

use color_eyre::eyre::Result;
use image::{DynamicImage, RgbaImage};
use ocr_rs::OcrEngine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use snapglot_protocol::{Rect, TextSpan};

const DETECTION_MODEL: &str = "PP-OCRv5_mobile_det.mnn";
/// `(language, recognition model, charset)` for every bundled PP-OCRv5 language.
const LANGUAGE_MODELS: &[(&str, &str, &str)] = &[
	("chinese", "PP-OCRv5_mobile_rec.mnn", "ppocr_keys_v5.txt"),
	("english", "en_PP-OCRv5_mobile_rec_infer.mnn", "ppocr_keys_en.txt"),
	("korean", "korean_PP-OCRv5_mobile_rec_infer.mnn", "ppocr_keys_korean.txt"),
	("latin", "latin_PP-OCRv5_mobile_rec_infer.mnn", "ppocr_keys_latin.txt"),
	("cyrillic", "cyrillic_PP-OCRv5_mobile_rec_infer.mnn", "ppocr_keys_cyrillic.txt"),
	("greek", "el_PP-OCRv5_mobile_rec_infer.mnn", "ppocr_keys_el.txt"),
	("thai", "th_PP-OCRv5_mobile_rec_infer.mnn", "ppocr_keys_th.txt"),
];

/// Text recognition collaborator. Finding no text is `Ok(vec![])`, never an error.
///
/// Engines are built and used on the worker thread, so implementations need not be `Send`.
pub trait Recognizer {
	fn recognize(&mut self, image: &RgbaImage) -> Result<Vec<TextSpan>>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecognizeError {
	#[error("no OCR model for language `{language}`")]
	UnknownLanguage { language: String },

	#[error("OCR model file is missing: {}", path.display())]
	MissingModel { path: PathBuf },

	#[error("OCR engine failed: {0}")]
	Engine(String),
}

/// Recognizes nothing. Used when no engine is configured.
#[derive(Debug, Default)]
pub struct StubRecognizer {}

impl Recognizer for StubRecognizer {
	fn recognize(&mut self, _image: &RgbaImage) -> Result<Vec<TextSpan>> {
		Ok(Vec::new())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrModelConfig {
	/// Directory holding the detection model plus the recognition model and charset.
	#[serde(default)]
	pub models_dir: PathBuf,
	#[serde(default = "default_ocr_language")]
	pub language: String,
}

impl Default for OcrModelConfig {
	fn default() -> Self {
		Self { models_dir: PathBuf::new(), language: default_ocr_language() }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
	pub detection: PathBuf,
	pub recognition: PathBuf,
	pub charset: PathBuf,
}
impl ModelPaths {
	/// Picks the files for `config.language` and checks that each one exists.
	pub fn resolve(config: &OcrModelConfig) -> Result<Self, RecognizeError> {
		let language = config.language.trim().to_ascii_lowercase();
		let Some((_, recognition, charset)) =
			LANGUAGE_MODELS.iter().find(|(id, _, _)| *id == language)
		else {
			return Err(RecognizeError::UnknownLanguage { language: config.language.clone() });
		};
		let dir = config.models_dir.as_path();
		let paths = Self {
			detection: dir.join(DETECTION_MODEL),
			recognition: dir.join(recognition),
			charset: dir.join(charset),
		};

		for path in [&paths.detection, &paths.recognition, &paths.charset] {
			require_file(path)?;
		}

		Ok(paths)
	}
}

/// PP-OCRv5 detection and recognition through `ocr-rs`. One span per detected text line.
pub struct PaddleRecognizer {
	engine: OcrEngine,
}
impl PaddleRecognizer {
	pub fn new(config: &OcrModelConfig) -> Result<Self> {
		let paths = ModelPaths::resolve(config)?;
		let engine = OcrEngine::new(&paths.detection, &paths.recognition, &paths.charset, None)
			.map_err(|err| RecognizeError::Engine(err.to_string()))?;

		tracing::info!(
			language = %config.language,
			models_dir = %config.models_dir.display(),
			"OCR engine loaded."
		);

		Ok(Self { engine })
	}
}

impl Recognizer for PaddleRecognizer {
	fn recognize(&mut self, image: &RgbaImage) -> Result<Vec<TextSpan>> {
		if is_blank(image) {
			return Ok(Vec::new());
		}

		let lines = self
			.engine
			.recognize(&DynamicImage::ImageRgba8(image.clone()))
			.map_err(|err| RecognizeError::Engine(err.to_string()))?;

		Ok(lines
			.into_iter()
			.map(|line| {
				let rect = line.bbox.rect;

				span_from_detection(
					line.text,
					rect.left() as i32,
					rect.top() as i32,
					rect.width() as u32,
					rect.height() as u32,
					line.confidence,
				)
			})
			.collect())
	}
}

fn span_from_detection(
	text: String,
	left: i32,
	top: i32,
	width: u32,
	height: u32,
	confidence: f32,
) -> TextSpan {
	let confidence = if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 };

	TextSpan::new(text, Rect::new(left, top, width, height), confidence)
}

fn require_file(path: &Path) -> Result<(), RecognizeError> {
	if path.is_file() {
		Ok(())
	} else {
		Err(RecognizeError::MissingModel { path: path.to_path_buf() })
	}
}

/// True when every pixel matches the first one, or there are no pixels at all.
fn is_blank(image: &RgbaImage) -> bool {
	let mut pixels = image.pixels();
	let Some(first) = pixels.next() else {
		return true;
	};

	pixels.all(|pixel| pixel == first)
}

fn default_ocr_language() -> String {
	String::from("english")
}
