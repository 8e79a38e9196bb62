use color_eyre::eyre::{Result, WrapErr};
use image::{RgbaImage, imageops};
use thiserror::Error;

use snapglot_protocol::{Point, Rect};

/// Screen capture collaborator.
pub trait CaptureBackend: Send {
	/// Union of every monitor, in screen coordinates.
	fn full_screen_bounds(&mut self) -> Result<Rect>;

	/// Pixels covered by `rect`. The image is `rect.width` by `rect.height`.
	fn capture(&mut self, rect: Rect) -> Result<RgbaImage>;
}

#[derive(Debug, Error)]
pub enum CaptureBackendError {
	#[error("screen capture is not supported on this platform (backend: {backend})")]
	NotSupported { backend: &'static str },

	#[error("no monitors detected")]
	NoMonitors,

	#[error("rect {rect:?} lies outside every monitor")]
	OutsideMonitors { rect: Rect },

	#[error("rect {rect:?} has zero width or height")]
	EmptyRect { rect: Rect },
}

pub struct StubCaptureBackend {}
impl StubCaptureBackend {
	#[must_use]
	pub fn new() -> Self {
		Self {}
	}
}

impl Default for StubCaptureBackend {
	fn default() -> Self {
		Self::new()
	}
}

impl CaptureBackend for StubCaptureBackend {
	fn full_screen_bounds(&mut self) -> Result<Rect> {
		Err(CaptureBackendError::NotSupported { backend: "stub" }.into())
	}

	fn capture(&mut self, _rect: Rect) -> Result<RgbaImage> {
		Err(CaptureBackendError::NotSupported { backend: "stub" }.into())
	}
}

pub struct XcapCaptureBackend {}
impl XcapCaptureBackend {
	#[must_use]
	pub fn new() -> Self {
		Self {}
	}
}

impl Default for XcapCaptureBackend {
	fn default() -> Self {
		Self::new()
	}
}

impl CaptureBackend for XcapCaptureBackend {
	fn full_screen_bounds(&mut self) -> Result<Rect> {
		let monitors = xcap_monitors()?;
		let bounds = monitors.iter().map(|(_, rect)| *rect).collect::<Vec<_>>();

		Ok(virtual_bounds(&bounds).ok_or(CaptureBackendError::NoMonitors)?)
	}

	fn capture(&mut self, rect: Rect) -> Result<RgbaImage> {
		if rect.is_empty() {
			return Err(CaptureBackendError::EmptyRect { rect }.into());
		}

		let monitors = xcap_monitors()?;
		let bounds = monitors.iter().map(|(_, rect)| *rect).collect::<Vec<_>>();
		let pieces = monitor_pieces(rect, &bounds);

		if pieces.is_empty() {
			return Err(CaptureBackendError::OutsideMonitors { rect }.into());
		}

		let mut out = RgbaImage::new(rect.width, rect.height);

		for piece in pieces {
			let (monitor, monitor_rect) = &monitors[piece.monitor];
			let frame = monitor
				.capture_image()
				.wrap_err_with(|| format!("xcap capture_image failed for {monitor_rect:?}"))?;
			let cropped = crop_scaled(&frame, *monitor_rect, piece.local);

			imageops::overlay(
				&mut out,
				&cropped,
				i64::from(piece.dest.x),
				i64::from(piece.dest.y),
			);
		}

		Ok(out)
	}
}

#[must_use]
pub fn default_capture_backend() -> Box<dyn CaptureBackend> {
	Box::new(XcapCaptureBackend::new())
}

/// Every monitor in the coordinate space [`XcapCaptureBackend::capture`] reads:
/// points on macOS, pixels elsewhere. Selection and overlay windows are laid out
/// in this space so a selected rect is captured as drawn.
pub fn monitor_areas() -> Result<Vec<Rect>> {
	Ok(xcap_monitors()?.into_iter().map(|(_, rect)| rect).collect())
}

/// The part of a capture that one monitor contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MonitorPiece {
	pub monitor: usize,
	/// Region inside the monitor, relative to the monitor origin.
	pub local: Rect,
	/// Where the region lands in the output image.
	pub dest: Point,
}

pub(crate) fn virtual_bounds(monitors: &[Rect]) -> Option<Rect> {
	let (first, rest) = monitors.split_first()?;

	Some(rest.iter().fold(*first, |acc, rect| acc.union(rect)))
}

pub(crate) fn monitor_pieces(rect: Rect, monitors: &[Rect]) -> Vec<MonitorPiece> {
	monitors
		.iter()
		.enumerate()
		.filter_map(|(monitor, bounds)| {
			let shared = rect.intersection(bounds)?;

			Some(MonitorPiece {
				monitor,
				local: Rect::new(
					shared.x - bounds.x,
					shared.y - bounds.y,
					shared.width,
					shared.height,
				),
				dest: Point::new(shared.x - rect.x, shared.y - rect.y),
			})
		})
		.collect()
}

/// Crops `local` out of a monitor frame whose pixel density may differ from the
/// monitor's reported size, returning an image sized in screen units.
fn crop_scaled(frame: &RgbaImage, monitor: Rect, local: Rect) -> RgbaImage {
	let sx = frame.width() as f64 / f64::from(monitor.width.max(1));
	let sy = frame.height() as f64 / f64::from(monitor.height.max(1));
	let px = ((local.x as f64) * sx).round().max(0.0) as u32;
	let py = ((local.y as f64) * sy).round().max(0.0) as u32;
	let pw = ((f64::from(local.width) * sx).round() as u32).min(frame.width().saturating_sub(px));
	let ph = ((f64::from(local.height) * sy).round() as u32).min(frame.height().saturating_sub(py));
	let cropped = imageops::crop_imm(frame, px, py, pw.max(1), ph.max(1)).to_image();

	if cropped.width() == local.width && cropped.height() == local.height {
		return cropped;
	}

	imageops::resize(&cropped, local.width, local.height, imageops::FilterType::Triangle)
}

fn xcap_monitors() -> Result<Vec<(xcap::Monitor, Rect)>> {
	let monitors = xcap::Monitor::all().wrap_err("xcap Monitor::all failed")?;
	let mut out = Vec::with_capacity(monitors.len());

	for monitor in monitors {
		let rect = Rect::new(
			monitor.x().wrap_err("Failed to read xcap monitor x")?,
			monitor.y().wrap_err("Failed to read xcap monitor y")?,
			monitor.width().wrap_err("Failed to read xcap monitor width")?,
			monitor.height().wrap_err("Failed to read xcap monitor height")?,
		);

		out.push((monitor, rect));
	}

	if out.is_empty() {
		return Err(CaptureBackendError::NoMonitors.into());
	}

	Ok(out)
}
