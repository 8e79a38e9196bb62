use snapglot_protocol::{TRANSLATOR_UNAVAILABLE_MARKER, TextSpan, TranslatedSpan};

/// Two boxes at or above this intersection-over-union are one detection.
pub const DUPLICATE_OVERLAP: f32 = 0.5;

/// Drops spans with blank text and collapses double-reported detections,
/// keeping the more confident one in the earlier span's position. Surviving
/// spans are returned as recognized.
#[must_use]
pub fn prepare_spans(spans: Vec<TextSpan>) -> Vec<TextSpan> {
	let mut kept: Vec<TextSpan> = Vec::with_capacity(spans.len());

	for span in spans {
		if span.text.trim().is_empty() {
			continue;
		}

		match kept.iter_mut().find(|k| k.bbox.overlap_ratio(&span.bbox) >= DUPLICATE_OVERLAP) {
			Some(existing) =>
				if span.confidence > existing.confidence {
					*existing = span;
				},
			None => kept.push(span),
		}
	}

	kept
}

/// Pairs each span with the translation at the same index.
///
/// Callers guarantee equal lengths; a short `translations` leaves the trailing
/// spans marked untranslated rather than shifting anything.
#[must_use]
pub fn zip_translations(spans: Vec<TextSpan>, translations: Vec<String>) -> Vec<TranslatedSpan> {
	let mut translations = translations.into_iter();

	spans
		.into_iter()
		.map(|span| TranslatedSpan {
			span,
			translated_text: translations
				.next()
				.unwrap_or_else(|| String::from(TRANSLATOR_UNAVAILABLE_MARKER)),
		})
		.collect()
}

#[must_use]
pub fn pass_through(spans: Vec<TextSpan>) -> Vec<TranslatedSpan> {
	zip_translations(spans, Vec::new())
}
