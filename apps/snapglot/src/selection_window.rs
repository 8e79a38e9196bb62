use color_eyre::eyre::Result;
use egui::{Align2, Color32, FontId, Stroke, StrokeKind};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::{CursorIcon, WindowId};

use snapglot_overlay::{PointerEvent, RegionSelector, SelectionOutcome};
use snapglot_protocol::{Point, Rect, RequestId};

use crate::surface::EguiSurface;

const DIM: Color32 = Color32::from_black_alpha(90);
const FRAME: Color32 = Color32::from_rgb(64, 156, 255);

pub enum SelectionControl {
	Continue,
	Committed { request_id: RequestId, rect: Rect },
	Cancelled,
	Failed(String),
}

/// Drag surface covering one monitor. One per monitor, alive for exactly one gesture.
pub struct SelectionWindow {
	surface: EguiSurface,
	cursor: Option<Point>,
}
impl SelectionWindow {
	pub fn open(event_loop: &ActiveEventLoop, area: Rect, focused: bool) -> Result<Self> {
		let surface = EguiSurface::open(event_loop, "snapglot selection", area, |attrs| attrs)?;

		surface.window().set_cursor(CursorIcon::Crosshair);

		if focused {
			surface.window().focus_window();
		}

		surface.window().request_redraw();

		Ok(Self { surface, cursor: None })
	}

	#[must_use]
	pub fn window_id(&self) -> WindowId {
		self.surface.window_id()
	}

	pub fn request_redraw(&self) {
		self.surface.window().request_redraw();
	}

	pub fn handle_window_event(
		&mut self,
		selector: &mut RegionSelector,
		event: &WindowEvent,
	) -> SelectionControl {
		let pointer = match event {
			WindowEvent::CursorMoved { position, .. } => {
				let point = self.surface.to_screen(*position);

				self.cursor = Some(point);

				Some(PointerEvent::Move(point))
			},
			WindowEvent::MouseInput { state, button: MouseButton::Left, .. } =>
				self.cursor.map(|point| match state {
					ElementState::Pressed => PointerEvent::Down(point),
					ElementState::Released => PointerEvent::Up(point),
				}),
			WindowEvent::KeyboardInput { event, .. }
				if event.state == ElementState::Pressed
					&& event.logical_key == Key::Named(NamedKey::Escape) =>
				Some(PointerEvent::Cancel),
			WindowEvent::CloseRequested => Some(PointerEvent::Cancel),
			_ => None,
		};

		self.surface.handle_window_event(event);

		let Some(pointer) = pointer else {
			return SelectionControl::Continue;
		};

		match selector.handle(pointer) {
			Ok(SelectionOutcome::Committed { request_id, rect }) =>
				SelectionControl::Committed { request_id, rect },
			Ok(SelectionOutcome::Cancelled) => SelectionControl::Cancelled,
			// Escape with no drag in progress still dismisses the surface.
			Ok(SelectionOutcome::Ignored) if pointer == PointerEvent::Cancel =>
				SelectionControl::Cancelled,
			Ok(_) => SelectionControl::Continue,
			Err(err) => SelectionControl::Failed(err.to_string()),
		}
	}

	pub fn draw(&mut self, selector: &RegionSelector) -> Result<()> {
		let live = selector.live_rect();
		let area = self.surface.area();

		self.surface.draw(|ctx, surface| {
			let painter = ctx.layer_painter(egui::LayerId::background());
			let screen = ctx.screen_rect();
			let Some((rect, visible)) =
				live.and_then(|rect| rect.intersection(&area).map(|visible| (rect, visible)))
			else {
				painter.rect_filled(screen, 0.0, DIM);

				return;
			};
			let hole = surface.to_local(visible);

			// Dim everything except the selection.
			for band in [
				egui::Rect::from_min_max(screen.min, egui::pos2(screen.max.x, hole.min.y)),
				egui::Rect::from_min_max(egui::pos2(screen.min.x, hole.max.y), screen.max),
				egui::Rect::from_min_max(
					egui::pos2(screen.min.x, hole.min.y),
					egui::pos2(hole.min.x, hole.max.y),
				),
				egui::Rect::from_min_max(
					egui::pos2(hole.max.x, hole.min.y),
					egui::pos2(screen.max.x, hole.max.y),
				),
			] {
				painter.rect_filled(band, 0.0, DIM);
			}

			painter.rect_stroke(hole, 0.0, Stroke::new(1.5, FRAME), StrokeKind::Outside);

			// The size label goes on the monitor holding the selection's corner.
			if visible.origin() != rect.origin() {
				return;
			}

			painter.text(
				hole.left_top() - egui::vec2(0.0, 4.0),
				Align2::LEFT_BOTTOM,
				format!("{} x {}", rect.width, rect.height),
				FontId::monospace(12.0),
				Color32::WHITE,
			);
		})
	}
}
