use thiserror::Error;

use snapglot_pipeline::{ChannelClosed, CommandQueue};
use snapglot_protocol::{
	CaptureCommand, CommandError, LanguagePair, MinSize, Point, Rect, RequestId,
};

#[derive(Debug, Error)]
pub enum SelectError {
	#[error(transparent)]
	Closed(#[from] ChannelClosed),

	#[error(transparent)]
	Rejected(#[from] CommandError),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PointerEvent {
	Down(Point),
	Move(Point),
	Up(Point),
	/// Escape, or the surface losing focus.
	Cancel,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SelectionState {
	#[default]
	Idle,
	Dragging {
		anchor: Point,
		current: Point,
	},
}
impl SelectionState {
	/// The normalized rectangle under the drag, if one is in progress.
	#[must_use]
	pub fn live_rect(&self) -> Option<Rect> {
		match *self {
			Self::Idle => None,
			Self::Dragging { anchor, current } => Some(Rect::from_points(anchor, current)),
		}
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SelectionOutcome {
	Ignored,
	Started,
	Updated(Rect),
	Committed { request_id: RequestId, rect: Rect },
	Cancelled,
}

#[derive(Debug, Eq, PartialEq)]
enum Transition {
	Ignored,
	Started,
	Updated(Rect),
	Commit(Rect),
	Cancelled,
}

/// Pure gesture step. Points are clamped to `bounds` before anything is measured.
fn transition(
	state: SelectionState,
	event: PointerEvent,
	bounds: Rect,
	min_size: MinSize,
) -> (SelectionState, Transition) {
	match (state, event) {
		(SelectionState::Idle, PointerEvent::Down(point)) => {
			let anchor = bounds.clamp_point(point);

			(SelectionState::Dragging { anchor, current: anchor }, Transition::Started)
		},
		(SelectionState::Idle, _) => (SelectionState::Idle, Transition::Ignored),
		// One gesture at a time.
		(dragging @ SelectionState::Dragging { .. }, PointerEvent::Down(_)) =>
			(dragging, Transition::Ignored),
		(SelectionState::Dragging { anchor, .. }, PointerEvent::Move(point)) => {
			let current = bounds.clamp_point(point);

			(
				SelectionState::Dragging { anchor, current },
				Transition::Updated(Rect::from_points(anchor, current)),
			)
		},
		(SelectionState::Dragging { anchor, .. }, PointerEvent::Up(point)) => {
			let rect = Rect::from_points(anchor, bounds.clamp_point(point));

			if min_size.admits(&rect) {
				(SelectionState::Idle, Transition::Commit(rect))
			} else {
				(SelectionState::Idle, Transition::Cancelled)
			}
		},
		(SelectionState::Dragging { .. }, PointerEvent::Cancel) =>
			(SelectionState::Idle, Transition::Cancelled),
	}
}

/// Turns pointer gestures on the selection surface into region capture commands.
pub struct RegionSelector {
	commands: CommandQueue,
	languages: LanguagePair,
	bounds: Rect,
	min_size: MinSize,
	state: SelectionState,
}
impl RegionSelector {
	#[must_use]
	pub fn new(
		commands: CommandQueue,
		languages: LanguagePair,
		bounds: Rect,
		min_size: MinSize,
	) -> Self {
		Self { commands, languages, bounds, min_size, state: SelectionState::Idle }
	}

	#[must_use]
	pub fn state(&self) -> SelectionState {
		self.state
	}

	#[must_use]
	pub fn is_dragging(&self) -> bool {
		matches!(self.state, SelectionState::Dragging { .. })
	}

	#[must_use]
	pub fn live_rect(&self) -> Option<Rect> {
		self.state.live_rect()
	}

	/// Monitors can change between gestures; an in-flight drag keeps its bounds.
	pub fn set_bounds(&mut self, bounds: Rect) {
		if !self.is_dragging() {
			self.bounds = bounds;
		}
	}

	/// Drops any half-finished gesture without emitting a command.
	pub fn reset(&mut self) {
		self.state = SelectionState::Idle;
	}

	/// Feeds one pointer event. A committed gesture enqueues exactly one region
	/// command; the selector is back in `Idle` afterwards even if the send fails.
	pub fn handle(&mut self, event: PointerEvent) -> Result<SelectionOutcome, SelectError> {
		let (next, step) = transition(self.state, event, self.bounds, self.min_size);

		self.state = next;

		match step {
			Transition::Ignored => Ok(SelectionOutcome::Ignored),
			Transition::Started => Ok(SelectionOutcome::Started),
			Transition::Updated(rect) => Ok(SelectionOutcome::Updated(rect)),
			Transition::Cancelled => {
				tracing::debug!("Selection cancelled.");

				Ok(SelectionOutcome::Cancelled)
			},
			Transition::Commit(rect) => {
				let request_id = self.commands.next_request_id();
				let command = CaptureCommand::region(
					request_id,
					rect,
					self.min_size,
					self.languages.clone(),
				)?;

				self.commands.send(command)?;

				tracing::info!(request_id = %request_id, ?rect, "Region capture requested.");

				Ok(SelectionOutcome::Committed { request_id, rect })
			},
		}
	}
}
