//! Messages exchanged between the interactive front end and the capture worker.

mod command;
mod geometry;
mod result;

pub use crate::command::{
	CaptureCommand, CaptureKind, CaptureTarget, CommandError, LanguagePair, PipelineCommand,
	RequestId,
};
pub use crate::geometry::{MinSize, Point, Rect};
pub use crate::result::{
	CaptureResult, ErrorKind, PipelineEvent, StageTimings, TRANSLATOR_UNAVAILABLE_MARKER, TextSpan,
	TranslatedSpan,
};
