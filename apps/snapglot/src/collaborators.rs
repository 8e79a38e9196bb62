use color_eyre::eyre::{Result, WrapErr};

use snapglot_pipeline::{
	Collaborators, LibreTranslateClient, LibreTranslateConfig, OcrModelConfig, PaddleRecognizer,
	Translator, UnavailableTranslator, default_capture_backend,
};

/// Builds the engines on the worker thread from the loaded settings.
pub fn build(
	recognizer: OcrModelConfig,
	translator: LibreTranslateConfig,
) -> Result<Collaborators> {
	let translator: Box<dyn Translator> = if translator.endpoint.trim().is_empty() {
		tracing::warn!("No translation endpoint configured; results will be untranslated.");

		Box::new(UnavailableTranslator::default())
	} else {
		tracing::info!(
			endpoint = %translator.endpoint,
			batch = translator.batch,
			"Using LibreTranslate."
		);

		Box::new(LibreTranslateClient::new(translator).wrap_err("failed to set up translator")?)
	};
	let recognizer = PaddleRecognizer::new(&recognizer).wrap_err("failed to load OCR models")?;

	Ok(Collaborators {
		capture: default_capture_backend(),
		recognizer: Box::new(recognizer),
		translator,
	})
}
