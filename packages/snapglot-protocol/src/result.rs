use serde::{Deserialize, Serialize};

use crate::command::RequestId;
use crate::geometry::Rect;

/// Stands in for `translated_text` when no translation could be produced.
pub const TRANSLATOR_UNAVAILABLE_MARKER: &str = "[translator unavailable]";

/// A recognized text region. `bbox` is relative to the captured rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
	pub text: String,
	pub bbox: Rect,
	pub confidence: f32,
}
impl TextSpan {
	#[must_use]
	pub fn new(text: impl Into<String>, bbox: Rect, confidence: f32) -> Self {
		Self { text: text.into(), bbox, confidence: confidence.clamp(0.0, 1.0) }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedSpan {
	#[serde(flatten)]
	pub span: TextSpan,
	pub translated_text: String,
}
impl TranslatedSpan {
	#[must_use]
	pub fn is_untranslated(&self) -> bool {
		self.translated_text == TRANSLATOR_UNAVAILABLE_MARKER
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
	pub capture_ms: u64,
	pub ocr_ms: u64,
	pub translate_ms: u64,
	pub total_ms: u64,
}

/// Failure taxonomy carried inside a result. An empty recognition is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	CaptureFailed,
	RecognitionFailed,
	TranslatorUnavailable,
	/// Skipped in favor of a newer queued request of the same kind.
	Superseded,
}
impl ErrorKind {
	/// Whether the request still delivered spans worth showing.
	#[must_use]
	pub fn is_degraded_success(self) -> bool {
		matches!(self, Self::TranslatorUnavailable)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResult {
	pub request_id: RequestId,
	/// Screen rectangle that was captured, once resolved.
	pub region: Option<Rect>,
	pub spans: Vec<TranslatedSpan>,
	pub timings: StageTimings,
	pub error: Option<ErrorKind>,
	pub message: Option<String>,
}
impl CaptureResult {
	#[must_use]
	pub fn failed(
		request_id: RequestId,
		region: Option<Rect>,
		error: ErrorKind,
		message: impl Into<String>,
		timings: StageTimings,
	) -> Self {
		Self {
			request_id,
			region,
			spans: Vec::new(),
			timings,
			error: Some(error),
			message: Some(message.into()),
		}
	}

	#[must_use]
	pub fn superseded(request_id: RequestId, by: RequestId) -> Self {
		Self::failed(
			request_id,
			None,
			ErrorKind::Superseded,
			format!("superseded by {by}"),
			StageTimings::default(),
		)
	}

	#[must_use]
	pub fn is_success(&self) -> bool {
		self.error.is_none_or(ErrorKind::is_degraded_success)
	}
}

/// Everything that travels on the result queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
	Ready { translator_available: bool },
	Result { result: CaptureResult },
	Down { reason: String },
}

#[cfg(test)]
mod tests {
	use crate::{
		CaptureResult, ErrorKind, PipelineEvent, Rect, RequestId, StageTimings, TextSpan,
		TranslatedSpan,
	};

	#[test]
	fn confidence_is_clamped() {
		assert_eq!(TextSpan::new("a", Rect::new(0, 0, 1, 1), 1.7).confidence, 1.0);
		assert_eq!(TextSpan::new("a", Rect::new(0, 0, 1, 1), -0.2).confidence, 0.0);
	}

	#[test]
	fn success_covers_degraded_results() {
		let mut result = CaptureResult {
			request_id: RequestId(1),
			region: None,
			spans: Vec::new(),
			timings: StageTimings::default(),
			error: None,
			message: None,
		};

		assert!(result.is_success());

		result.error = Some(ErrorKind::TranslatorUnavailable);

		assert!(result.is_success());

		result.error = Some(ErrorKind::CaptureFailed);

		assert!(!result.is_success());
	}

	#[test]
	fn superseded_names_the_newer_request() {
		let result = CaptureResult::superseded(RequestId(4), RequestId(6));

		assert_eq!(result.error, Some(ErrorKind::Superseded));
		assert_eq!(result.message.as_deref(), Some("superseded by #6"));
		assert!(result.spans.is_empty());
	}

	#[test]
	fn json_translated_span_is_flat() {
		let span = TranslatedSpan {
			span: TextSpan::new("Hello", Rect::new(10, 10, 80, 20), 0.5),
			translated_text: String::from("Xin chào"),
		};
		let json = serde_json::to_value(&span).unwrap();

		assert_eq!(
			json,
			serde_json::json!({
				"text": "Hello",
				"bbox": { "x": 10, "y": 10, "width": 80, "height": 20 },
				"confidence": 0.5,
				"translated_text": "Xin chào",
			})
		);
	}

	#[test]
	fn json_events_are_tagged() {
		let ready = serde_json::to_string(&PipelineEvent::Ready { translator_available: false })
			.unwrap();
		let down =
			serde_json::to_string(&PipelineEvent::Down { reason: String::from("boom") }).unwrap();

		assert_eq!(ready, r#"{"type":"ready","translator_available":false}"#);
		assert_eq!(down, r#"{"type":"down","reason":"boom"}"#);
	}
}
