//! Front-end state machines: drag-to-select, result display lifetime, and the
//! non-blocking bridge from the worker's result queue.

mod dispatch;
mod lifecycle;
mod selector;

pub use dispatch::{DispatchSummary, ResultDispatcher};
pub use lifecycle::{
	DEFAULT_DISPLAY_DURATION, NOTICE_DURATION, Notice, OverlayEntry, OverlayLifecycle, PlacedSpan,
	Resolution,
};
pub use selector::{PointerEvent, RegionSelector, SelectError, SelectionOutcome, SelectionState};
