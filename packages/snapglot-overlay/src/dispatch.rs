use std::time::Instant;

use snapglot_pipeline::{ResultQueue, TryReceive};
use snapglot_protocol::PipelineEvent;

use crate::lifecycle::{OverlayLifecycle, Resolution};

/// What one `pump` did.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DispatchSummary {
	pub results: usize,
	/// Whether the overlay needs a redraw.
	pub changed: bool,
}

/// Moves worker events onto the interactive thread without ever blocking it.
pub struct ResultDispatcher {
	results: ResultQueue,
	translator_available: Option<bool>,
	down: bool,
}
impl ResultDispatcher {
	#[must_use]
	pub fn new(results: ResultQueue) -> Self {
		Self { results, translator_available: None, down: false }
	}

	/// `None` until the worker has reported in.
	#[must_use]
	pub fn translator_available(&self) -> Option<bool> {
		self.translator_available
	}

	#[must_use]
	pub fn is_down(&self) -> bool {
		self.down
	}

	/// Drains every event queued so far into `lifecycle`.
	pub fn pump(&mut self, lifecycle: &mut OverlayLifecycle, now: Instant) -> DispatchSummary {
		let mut summary = DispatchSummary::default();

		while !self.down {
			match self.results.try_receive() {
				TryReceive::Event(PipelineEvent::Ready { translator_available }) => {
					tracing::info!(translator_available, "Capture pipeline reported ready.");

					self.translator_available = Some(translator_available);
				},
				TryReceive::Event(PipelineEvent::Result { result }) => {
					let request_id = result.request_id;
					let resolution = lifecycle.on_result(result, now);

					tracing::debug!(request_id = %request_id, ?resolution, "Result dispatched.");

					summary.results += 1;
					summary.changed |= resolution != Resolution::Skipped;
				},
				TryReceive::Event(PipelineEvent::Down { reason }) => {
					tracing::error!(reason = %reason, "Capture pipeline down.");

					lifecycle.on_pipeline_down(reason);

					self.down = true;
					summary.changed = true;
				},
				TryReceive::Empty => break,
				TryReceive::Disconnected => {
					tracing::error!("Result queue disconnected without a shutdown notice.");

					lifecycle.on_pipeline_down("the worker stopped unexpectedly");

					self.down = true;
					summary.changed = true;
				},
			}
		}

		summary
	}
}
