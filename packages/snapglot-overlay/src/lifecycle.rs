use std::time::{Duration, Instant};

use snapglot_protocol::{CaptureResult, ErrorKind, Rect, RequestId, TranslatedSpan};

pub const DEFAULT_DISPLAY_DURATION: Duration = Duration::from_secs(10);
/// How long a failure notice stays up.
pub const NOTICE_DURATION: Duration = Duration::from_secs(4);
/// Space between a capture region and its pending marker.
const MARKER_GAP: i32 = 6;

/// The single displayed result.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayEntry {
	pub request_id: RequestId,
	pub region: Rect,
	pub spans: Vec<TranslatedSpan>,
	pub expires_at: Instant,
}

/// Transient diagnostic shown in place of an entry when a request fails.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
	pub request_id: Option<RequestId>,
	pub kind: Option<ErrorKind>,
	pub message: String,
	/// `None` keeps the notice until it is cleared.
	pub expires_at: Option<Instant>,
}

/// A span ready to draw, in screen coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedSpan {
	pub rect: Rect,
	pub label: String,
	pub untranslated: bool,
}

/// What a delivered result did to the display.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
	Displayed,
	/// Resolved with nothing to show.
	Empty,
	Notice,
	/// A superseded request; the display is left alone.
	Skipped,
}

pub struct OverlayLifecycle {
	display_duration: Duration,
	entry: Option<OverlayEntry>,
	notice: Option<Notice>,
	pending: Option<(RequestId, Option<Rect>)>,
	down: bool,
}
impl OverlayLifecycle {
	#[must_use]
	pub fn new(display_duration: Duration) -> Self {
		Self { display_duration, entry: None, notice: None, pending: None, down: false }
	}

	#[must_use]
	pub fn display_duration(&self) -> Duration {
		self.display_duration
	}

	#[must_use]
	pub fn entry(&self) -> Option<&OverlayEntry> {
		self.entry.as_ref()
	}

	#[must_use]
	pub fn notice(&self) -> Option<&Notice> {
		self.notice.as_ref()
	}

	/// The requested region of the newest outstanding request, if known.
	#[must_use]
	pub fn pending(&self) -> Option<(RequestId, Option<Rect>)> {
		self.pending
	}

	#[must_use]
	pub fn is_pipeline_down(&self) -> bool {
		self.down
	}

	/// Whether the overlay has anything to paint. A full screen request in flight
	/// paints nothing, since any marker would land inside its own capture.
	#[must_use]
	pub fn is_visible(&self) -> bool {
		self.entry.is_some()
			|| self.notice.is_some()
			|| self.pending.is_some_and(|(_, region)| region.is_some())
	}

	#[must_use]
	pub fn is_waiting(&self) -> bool {
		self.pending.is_some()
	}

	/// Starts waiting on a capture. Whatever is on screen comes down first so the
	/// capture sees the page rather than an earlier translation.
	pub fn mark_pending(&mut self, request_id: RequestId, region: Option<Rect>) {
		self.entry = None;

		if !self.down {
			self.notice = None;
		}

		self.pending = Some((request_id, region));
	}

	/// Where to draw a `width` by `height` loading marker for the pending region:
	/// above it when that fits on `screen`, otherwise below, never overlapping it.
	#[must_use]
	pub fn pending_marker(&self, screen: Rect, width: u32, height: u32) -> Option<Rect> {
		let (_, Some(region)) = self.pending? else {
			return None;
		};

		marker_outside(region, screen, width, height)
	}

	pub fn on_result(&mut self, result: CaptureResult, now: Instant) -> Resolution {
		if self.pending.is_some_and(|(id, _)| id <= result.request_id) {
			self.pending = None;
		}

		if result.error == Some(ErrorKind::Superseded) {
			return Resolution::Skipped;
		}

		// A newer result always replaces whatever is up, expired or not.
		self.entry = None;
		self.notice = None;

		match result.error {
			Some(kind @ (ErrorKind::CaptureFailed | ErrorKind::RecognitionFailed)) => {
				let message = result.message.unwrap_or_else(|| match kind {
					ErrorKind::RecognitionFailed => String::from("text recognition failed"),
					_ => String::from("screen capture failed"),
				});

				self.notice = Some(Notice {
					request_id: Some(result.request_id),
					kind: Some(kind),
					message,
					expires_at: Some(now + NOTICE_DURATION),
				});

				Resolution::Notice
			},
			_ if result.spans.is_empty() => Resolution::Empty,
			_ => {
				self.entry = Some(OverlayEntry {
					request_id: result.request_id,
					region: result.region.unwrap_or(Rect::new(0, 0, 0, 0)),
					spans: result.spans,
					expires_at: now + self.display_duration,
				});

				Resolution::Displayed
			},
		}
	}

	/// The worker is gone. The notice stays until the user clears it.
	pub fn on_pipeline_down(&mut self, reason: impl Into<String>) {
		self.down = true;
		self.pending = None;
		self.entry = None;
		self.notice = Some(Notice {
			request_id: None,
			kind: None,
			message: format!("capture pipeline is down: {}", reason.into()),
			expires_at: None,
		});
	}

	/// Explicit dismissal. Returns whether anything was showing.
	pub fn clear(&mut self) -> bool {
		let was_visible = self.entry.is_some() || self.notice.is_some();

		self.entry = None;
		self.notice = None;

		was_visible
	}

	/// Retires anything whose time is up. Returns whether the display changed.
	pub fn tick(&mut self, now: Instant) -> bool {
		let mut changed = false;

		if self.entry.as_ref().is_some_and(|entry| now >= entry.expires_at) {
			self.entry = None;
			changed = true;
		}
		if self
			.notice
			.as_ref()
			.is_some_and(|notice| notice.expires_at.is_some_and(|at| now >= at))
		{
			self.notice = None;
			changed = true;
		}

		changed
	}

	/// The earliest instant at which `tick` would change something.
	#[must_use]
	pub fn next_deadline(&self) -> Option<Instant> {
		let entry = self.entry.as_ref().map(|entry| entry.expires_at);
		let notice = self.notice.as_ref().and_then(|notice| notice.expires_at);

		match (entry, notice) {
			(Some(a), Some(b)) => Some(a.min(b)),
			(a, b) => a.or(b),
		}
	}

	/// Spans of the displayed entry, moved from capture-local to screen coordinates.
	#[must_use]
	pub fn placed_spans(&self) -> Vec<PlacedSpan> {
		let Some(entry) = &self.entry else {
			return Vec::new();
		};
		let origin = entry.region.origin();

		entry
			.spans
			.iter()
			.map(|span| {
				let untranslated = span.is_untranslated();
				let label = if untranslated {
					format!("{} {}", span.span.text.trim(), span.translated_text)
				} else {
					span.translated_text.clone()
				};

				PlacedSpan { rect: span.span.bbox.offset_by(origin), label, untranslated }
			})
			.collect()
	}
}

fn marker_outside(region: Rect, screen: Rect, width: u32, height: u32) -> Option<Rect> {
	let height_i = i32::try_from(height).ok()?;
	let above = region.y - MARKER_GAP - height_i;
	let below = region.bottom() + MARKER_GAP;
	let y = if above >= screen.y {
		above
	} else if below + height_i <= screen.bottom() {
		below
	} else {
		return None;
	};
	let max_x = screen.right() - i32::try_from(width).ok()?;
	let x = region.x.min(max_x).max(screen.x);

	Some(Rect::new(x, y, width, height))
}

impl Default for OverlayLifecycle {
	fn default() -> Self {
		Self::new(DEFAULT_DISPLAY_DURATION)
	}
}

#[cfg(test)]
mod tests {
	use std::time::{Duration, Instant};

	use snapglot_protocol::{
		CaptureResult, ErrorKind, Rect, RequestId, StageTimings, TRANSLATOR_UNAVAILABLE_MARKER,
		TextSpan, TranslatedSpan,
	};

	use crate::lifecycle::{NOTICE_DURATION, OverlayLifecycle, Resolution};

	fn result(id: u64, region: Rect, spans: &[(&str, &str, Rect)]) -> CaptureResult {
		CaptureResult {
			request_id: RequestId(id),
			region: Some(region),
			spans: spans
				.iter()
				.map(|(text, translated, bbox)| TranslatedSpan {
					span: TextSpan::new(*text, *bbox, 0.9),
					translated_text: (*translated).to_owned(),
				})
				.collect(),
			timings: StageTimings::default(),
			error: None,
			message: None,
		}
	}

	fn hello(id: u64) -> CaptureResult {
		result(id, Rect::new(0, 0, 200, 50), &[("Hello", "Xin chào", Rect::new(10, 10, 80, 20))])
	}

	#[test]
	fn result_is_displayed_for_the_configured_duration() {
		let mut overlay = OverlayLifecycle::default();
		let t0 = Instant::now();

		assert_eq!(overlay.on_result(hello(1), t0), Resolution::Displayed);
		assert_eq!(overlay.next_deadline(), Some(t0 + Duration::from_secs(10)));
		assert!(!overlay.tick(t0 + Duration::from_millis(9_999)));
		assert!(overlay.entry().is_some());
		assert!(overlay.tick(t0 + Duration::from_secs(10)));
		assert!(overlay.entry().is_none());
		assert!(!overlay.is_visible());
	}

	#[test]
	fn newer_result_supersedes_before_expiry() {
		let mut overlay = OverlayLifecycle::default();
		let t0 = Instant::now();

		overlay.on_result(hello(1), t0);
		let bye = [("Bye", "Tạm biệt", Rect::new(0, 0, 50, 20))];

		let later = t0 + Duration::from_secs(3);

		overlay.on_result(result(2, Rect::new(500, 500, 100, 40), &bye), later);

		let entry = overlay.entry().unwrap();

		assert_eq!(entry.request_id, RequestId(2));
		assert_eq!(entry.spans.len(), 1);
		assert_eq!(entry.expires_at, t0 + Duration::from_secs(13));
	}

	#[test]
	fn empty_result_clears_without_error() {
		let mut overlay = OverlayLifecycle::default();
		let t0 = Instant::now();

		overlay.on_result(hello(1), t0);

		assert_eq!(
			overlay.on_result(result(2, Rect::new(0, 0, 50, 50), &[]), t0),
			Resolution::Empty
		);
		assert!(overlay.entry().is_none());
		assert!(overlay.notice().is_none());
	}

	#[test]
	fn clear_cancels_the_auto_hide() {
		let mut overlay = OverlayLifecycle::default();
		let t0 = Instant::now();

		overlay.on_result(hello(1), t0);

		assert!(overlay.clear());
		assert_eq!(overlay.next_deadline(), None);
		assert!(!overlay.tick(t0 + Duration::from_secs(60)));
		assert!(!overlay.clear());
	}

	#[test]
	fn capture_failure_shows_a_notice() {
		let mut overlay = OverlayLifecycle::default();
		let t0 = Instant::now();
		let failed = CaptureResult::failed(
			RequestId(4),
			Some(Rect::new(0, 0, 20, 20)),
			ErrorKind::CaptureFailed,
			"permission denied",
			StageTimings::default(),
		);

		overlay.on_result(hello(3), t0);

		assert_eq!(overlay.on_result(failed, t0), Resolution::Notice);
		assert!(overlay.entry().is_none());
		assert_eq!(overlay.notice().unwrap().message, "permission denied");
		assert!(overlay.tick(t0 + NOTICE_DURATION));
		assert!(overlay.notice().is_none());
	}

	#[test]
	fn superseded_results_leave_the_display_alone() {
		let mut overlay = OverlayLifecycle::default();
		let t0 = Instant::now();

		overlay.on_result(hello(1), t0);

		assert_eq!(
			overlay.on_result(CaptureResult::superseded(RequestId(2), RequestId(3)), t0),
			Resolution::Skipped
		);
		assert_eq!(overlay.entry().unwrap().request_id, RequestId(1));
	}

	#[test]
	fn spans_are_placed_at_the_capture_origin() {
		let mut overlay = OverlayLifecycle::default();
		let degraded = result(
			1,
			Rect::new(300, 200, 400, 100),
			&[
				("Hello", "Xin chào", Rect::new(10, 10, 80, 20)),
				("World", TRANSLATOR_UNAVAILABLE_MARKER, Rect::new(10, 40, 80, 20)),
			],
		);

		overlay.on_result(degraded, Instant::now());

		let placed = overlay.placed_spans();

		assert_eq!(placed[0].rect, Rect::new(310, 210, 80, 20));
		assert_eq!(placed[0].label, "Xin chào");
		assert!(!placed[0].untranslated);
		assert_eq!(placed[1].rect, Rect::new(310, 240, 80, 20));
		assert_eq!(placed[1].label, format!("World {TRANSLATOR_UNAVAILABLE_MARKER}"));
		assert!(placed[1].untranslated);
	}

	#[test]
	fn pending_marker_resolves_with_its_result() {
		let mut overlay = OverlayLifecycle::default();
		let t0 = Instant::now();

		overlay.mark_pending(RequestId(5), Some(Rect::new(0, 0, 200, 50)));

		assert!(overlay.is_visible());

		overlay.on_result(result(5, Rect::new(0, 0, 200, 50), &[]), t0);

		assert_eq!(overlay.pending(), None);
		assert!(!overlay.is_visible());
	}

	#[test]
	fn new_capture_takes_the_previous_translation_down() {
		let mut overlay = OverlayLifecycle::default();

		overlay.on_result(hello(1), Instant::now());
		overlay.mark_pending(RequestId(2), Some(Rect::new(0, 0, 200, 50)));

		assert!(overlay.entry().is_none());
		assert!(overlay.placed_spans().is_empty());
		assert!(overlay.is_waiting());
	}

	#[test]
	fn full_screen_wait_paints_nothing() {
		let mut overlay = OverlayLifecycle::default();

		overlay.mark_pending(RequestId(1), None);

		assert!(overlay.is_waiting());
		assert!(!overlay.is_visible());
		assert_eq!(overlay.pending_marker(Rect::new(0, 0, 1920, 1080), 100, 20), None);
	}

	#[test]
	fn pending_marker_stays_outside_the_capture() {
		let screen = Rect::new(0, 0, 1920, 1080);
		let mut overlay = OverlayLifecycle::default();

		overlay.mark_pending(RequestId(1), Some(Rect::new(100, 200, 300, 100)));

		assert_eq!(overlay.pending_marker(screen, 120, 20), Some(Rect::new(100, 174, 120, 20)));

		overlay.mark_pending(RequestId(2), Some(Rect::new(1850, 5, 60, 100)));

		let below = overlay.pending_marker(screen, 120, 20).unwrap();

		assert_eq!(below, Rect::new(1800, 111, 120, 20));
		assert!(below.intersection(&Rect::new(1850, 5, 60, 100)).is_none());

		overlay.mark_pending(RequestId(3), Some(screen));

		assert_eq!(overlay.pending_marker(screen, 120, 20), None);
	}

	#[test]
	fn pipeline_down_notice_persists() {
		let mut overlay = OverlayLifecycle::default();
		let t0 = Instant::now();

		overlay.mark_pending(RequestId(1), None);
		overlay.on_pipeline_down("result queue closed");

		assert!(overlay.is_pipeline_down());
		assert_eq!(overlay.pending(), None);
		assert!(!overlay.tick(t0 + Duration::from_secs(3_600)));
		assert!(overlay.notice().unwrap().message.contains("result queue closed"));
	}
}
