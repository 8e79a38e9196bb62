use color_eyre::eyre::Result;
use egui::{Align2, Color32, FontId, Stroke, StrokeKind};
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::WindowId;

use snapglot_overlay::OverlayLifecycle;
use snapglot_protocol::Rect;

use crate::surface::EguiSurface;

const SPAN_FILL: Color32 = Color32::from_black_alpha(200);
const UNTRANSLATED_TEXT: Color32 = Color32::from_rgb(255, 196, 64);
const PENDING_STROKE: Color32 = Color32::from_rgb(64, 156, 255);
const NOTICE_FILL: Color32 = Color32::from_rgb(150, 30, 30);
const MARKER_WIDTH: u32 = 120;
const MARKER_HEIGHT: u32 = 22;

/// Click-through window over one monitor that paints whatever the lifecycle says is showing.
pub struct OverlayWindow {
	surface: EguiSurface,
	visible: bool,
}
impl OverlayWindow {
	pub fn open(event_loop: &ActiveEventLoop, area: Rect) -> Result<Self> {
		let surface = EguiSurface::open(event_loop, "snapglot overlay", area, |attrs| {
			attrs.with_active(false)
		})?;

		if let Err(err) = surface.window().set_cursor_hittest(false) {
			tracing::warn!(error = %err, "Overlay window cannot be made click-through.");
		}

		Ok(Self { surface, visible: true })
	}

	#[must_use]
	pub fn window_id(&self) -> WindowId {
		self.surface.window_id()
	}

	#[must_use]
	pub fn area(&self) -> Rect {
		self.surface.area()
	}

	pub fn set_visible(&mut self, visible: bool) {
		if self.visible != visible {
			self.surface.window().set_visible(visible);

			self.visible = visible;
		}
		if visible {
			self.surface.window().request_redraw();
		}
	}

	pub fn handle_window_event(&mut self, event: &WindowEvent) {
		self.surface.handle_window_event(event);
	}

	/// `screen` is the union of all monitors. Notices go only on the window given `notices`.
	pub fn draw(
		&mut self,
		lifecycle: &OverlayLifecycle,
		screen: Rect,
		notices: bool,
	) -> Result<()> {
		let placed = lifecycle.placed_spans();
		let marker = lifecycle.pending_marker(screen, MARKER_WIDTH, MARKER_HEIGHT);
		let notice = lifecycle.notice().filter(|_| notices).map(|notice| notice.message.clone());

		self.surface.draw(|ctx, surface| {
			let painter = ctx.layer_painter(egui::LayerId::background());

			for span in &placed {
				let rect = surface.to_local(span.rect);
				let size = (rect.height() * 0.75).clamp(10.0, 28.0);
				let color = if span.untranslated { UNTRANSLATED_TEXT } else { Color32::WHITE };
				let galley = painter.layout(
					span.label.clone(),
					FontId::proportional(size),
					color,
					f32::INFINITY,
				);
				let backdrop = egui::Rect::from_min_size(
					rect.min,
					egui::vec2(
						rect.width().max(galley.size().x + 6.0),
						rect.height().max(galley.size().y),
					),
				);

				painter.rect_filled(backdrop, 3.0, SPAN_FILL);
				painter.galley(backdrop.min + egui::vec2(3.0, 0.0), galley, color);
			}

			// Kept clear of the region being captured.
			if let Some(marker) = marker {
				let rect = surface.to_local(marker);

				painter.rect_filled(rect, 4.0, SPAN_FILL);
				painter.rect_stroke(
					rect,
					4.0,
					Stroke::new(1.0, PENDING_STROKE),
					StrokeKind::Inside,
				);
				painter.text(
					rect.center(),
					Align2::CENTER_CENTER,
					"Translating...",
					FontId::proportional(13.0),
					PENDING_STROKE,
				);
			}

			if let Some(message) = &notice {
				let galley = painter.layout(
					message.clone(),
					FontId::proportional(14.0),
					Color32::WHITE,
					ctx.screen_rect().width() * 0.5,
				);
				let origin =
					ctx.screen_rect().center_top() + egui::vec2(-galley.size().x / 2.0, 56.0);
				let backdrop = egui::Rect::from_min_size(origin, galley.size()).expand(8.0);

				painter.rect_filled(backdrop, 6.0, NOTICE_FILL);
				painter.galley(origin, galley, Color32::WHITE);
			}
		})
	}
}
