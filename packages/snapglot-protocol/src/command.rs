use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{MinSize, Rect};

/// Producer-assigned key that orders and identifies a capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePair {
	pub source: String,
	pub target: String,
}
impl LanguagePair {
	#[must_use]
	pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
		Self { source: source.into(), target: target.into() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
	Region,
	FullScreen,
}

/// What to capture. A rectangle exists exactly when the kind is `Region`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureTarget {
	Region { rect: Rect },
	FullScreen,
}
impl CaptureTarget {
	#[must_use]
	pub fn kind(&self) -> CaptureKind {
		match self {
			Self::Region { .. } => CaptureKind::Region,
			Self::FullScreen => CaptureKind::FullScreen,
		}
	}

	#[must_use]
	pub fn rect(&self) -> Option<Rect> {
		match self {
			Self::Region { rect } => Some(*rect),
			Self::FullScreen => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureCommand {
	pub request_id: RequestId,
	pub target: CaptureTarget,
	pub languages: LanguagePair,
}
impl CaptureCommand {
	pub fn region(
		request_id: RequestId,
		rect: Rect,
		min_size: MinSize,
		languages: LanguagePair,
	) -> Result<Self, CommandError> {
		if !min_size.admits(&rect) {
			return Err(CommandError::RegionTooSmall { rect, min_size });
		}

		Ok(Self { request_id, target: CaptureTarget::Region { rect }, languages })
	}

	#[must_use]
	pub fn full_screen(request_id: RequestId, languages: LanguagePair) -> Self {
		Self { request_id, target: CaptureTarget::FullScreen, languages }
	}

	#[must_use]
	pub fn kind(&self) -> CaptureKind {
		self.target.kind()
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
	#[error(
		"region {}x{} is below the minimum {}x{}",
		rect.width, rect.height, min_size.width, min_size.height
	)]
	RegionTooSmall { rect: Rect, min_size: MinSize },
}

/// Everything that travels on the command queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineCommand {
	Capture { command: CaptureCommand },
	Shutdown,
}

#[cfg(test)]
mod tests {
	use crate::{
		CaptureCommand, CaptureKind, CommandError, LanguagePair, MinSize, PipelineCommand, Rect,
		RequestId,
	};

	fn en_vi() -> LanguagePair {
		LanguagePair::new("en", "vi")
	}

	#[test]
	fn region_command_carries_rect() {
		let rect = Rect::new(0, 0, 200, 50);
		let command =
			CaptureCommand::region(RequestId(1), rect, MinSize::default(), en_vi()).unwrap();

		assert_eq!(command.kind(), CaptureKind::Region);
		assert_eq!(command.target.rect(), Some(rect));
	}

	#[test]
	fn region_below_threshold_is_rejected() {
		let rect = Rect::new(100, 100, 2, 1);
		let err = CaptureCommand::region(RequestId(1), rect, MinSize::square(10), en_vi())
			.unwrap_err();

		assert_eq!(err, CommandError::RegionTooSmall { rect, min_size: MinSize::square(10) });
		assert_eq!(err.to_string(), "region 2x1 is below the minimum 10x10");
	}

	#[test]
	fn full_screen_has_no_rect() {
		let command = CaptureCommand::full_screen(RequestId(7), en_vi());

		assert_eq!(command.kind(), CaptureKind::FullScreen);
		assert_eq!(command.target.rect(), None);
	}

	#[test]
	fn json_shutdown_is_tagged() {
		let json = serde_json::to_string(&PipelineCommand::Shutdown).unwrap();

		assert_eq!(json, r#"{"type":"shutdown"}"#);
	}

	#[test]
	fn json_region_capture_is_tagged() {
		let command = CaptureCommand::region(
			RequestId(3),
			Rect::new(1, 2, 30, 40),
			MinSize::default(),
			en_vi(),
		)
		.unwrap();
		let json = serde_json::to_value(PipelineCommand::Capture { command }).unwrap();

		assert_eq!(
			json,
			serde_json::json!({
				"type": "capture",
				"command": {
					"request_id": 3,
					"target": {
						"kind": "region",
						"rect": { "x": 1, "y": 2, "width": 30, "height": 40 },
					},
					"languages": { "source": "en", "target": "vi" },
				},
			})
		);
	}
}
