use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use snapglot_protocol::{
	CaptureCommand, CaptureKind, CaptureResult, CaptureTarget, ErrorKind, LanguagePair,
	PipelineCommand, PipelineEvent, Rect, RequestId, StageTimings, TRANSLATOR_UNAVAILABLE_MARKER,
	TextSpan, TranslatedSpan,
};

use crate::backend::CaptureBackend;
use crate::channel::{CommandInbox, EventOutbox, WorkerEndpoint};
use crate::recognize::Recognizer;
use crate::spans::{pass_through, prepare_spans, zip_translations};
use crate::translate::Translator;

/// How the worker treats commands that pile up while it is busy.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
	/// Run every command in arrival order.
	#[default]
	Fifo,
	/// Resolve an older pending command as `Superseded` when a newer one of the
	/// same kind is already queued behind it.
	SupersedeStale,
}

pub struct Collaborators {
	pub capture: Box<dyn CaptureBackend>,
	pub recognizer: Box<dyn Recognizer>,
	pub translator: Box<dyn Translator>,
}

/// Owns the capture, recognition and translation sequence for one command at a time.
pub struct CaptureWorker {
	collaborators: Collaborators,
}
impl CaptureWorker {
	#[must_use]
	pub fn new(collaborators: Collaborators) -> Self {
		Self { collaborators }
	}

	/// Starts the worker thread. `build` runs on that thread so slow engine
	/// setup never stalls the caller.
	pub fn spawn<F>(endpoint: WorkerEndpoint, policy: QueuePolicy, build: F) -> Result<WorkerHandle>
	where
		F: FnOnce() -> Result<Collaborators> + Send + 'static,
	{
		let join = thread::Builder::new()
			.name(String::from("snapglot-worker"))
			.spawn(move || {
				let WorkerEndpoint { inbox, outbox } = endpoint;

				match build() {
					Ok(collaborators) => Self::new(collaborators).run(&inbox, &outbox, policy),
					Err(err) => {
						tracing::error!(
							error = %format!("{err:#}"),
							"Failed to start capture pipeline."
						);

						let _ = outbox.send(PipelineEvent::Down {
							reason: format!("pipeline failed to start: {err:#}"),
						});
					},
				}
			})
			.wrap_err("failed to spawn capture worker thread")?;

		Ok(WorkerHandle { join: Some(join) })
	}

	/// Runs the full pipeline for one command. Never panics on collaborator faults;
	/// every failure is folded into the returned result.
	pub fn process(&mut self, command: &CaptureCommand) -> CaptureResult {
		let request_id = command.request_id;
		let started = Instant::now();
		let mut timings = StageTimings::default();
		let region = match self.resolve_region(command) {
			Ok(region) => region,
			Err(err) => {
				let message = format!("{err:#}");

				tracing::warn!(
					request_id = %request_id,
					error = %message,
					"Capture target could not be resolved."
				);

				timings.total_ms = elapsed_ms(started);

				return CaptureResult::failed(
					request_id,
					command.target.rect(),
					ErrorKind::CaptureFailed,
					message,
					timings,
				);
			},
		};
		let capture_started = Instant::now();
		let image = match self.collaborators.capture.capture(region) {
			Ok(image) => image,
			Err(err) => {
				let message = format!("{err:#}");

				tracing::warn!(request_id = %request_id, error = %message, "Capture failed.");

				timings.capture_ms = elapsed_ms(capture_started);
				timings.total_ms = elapsed_ms(started);

				return CaptureResult::failed(
					request_id,
					Some(region),
					ErrorKind::CaptureFailed,
					message,
					timings,
				);
			},
		};

		timings.capture_ms = elapsed_ms(capture_started);

		let ocr_started = Instant::now();
		let recognized = self.collaborators.recognizer.recognize(&image);

		timings.ocr_ms = elapsed_ms(ocr_started);

		let spans = match recognized {
			Ok(spans) => prepare_spans(spans),
			Err(err) => {
				let message = format!("{err:#}");

				tracing::warn!(request_id = %request_id, error = %message, "Recognition failed.");

				timings.total_ms = elapsed_ms(started);

				return CaptureResult::failed(
					request_id,
					Some(region),
					ErrorKind::RecognitionFailed,
					message,
					timings,
				);
			},
		};
		let translate_started = Instant::now();
		let (spans, error, message) = if spans.is_empty() {
			(Vec::new(), None, None)
		} else {
			self.translate_spans(spans, &command.languages)
		};

		timings.translate_ms = elapsed_ms(translate_started);
		timings.total_ms = elapsed_ms(started);

		tracing::info!(
			request_id = %request_id,
			spans = spans.len(),
			capture_ms = timings.capture_ms,
			ocr_ms = timings.ocr_ms,
			translate_ms = timings.translate_ms,
			total_ms = timings.total_ms,
			"Capture request processed."
		);

		CaptureResult { request_id, region: Some(region), spans, timings, error, message }
	}

	fn resolve_region(&mut self, command: &CaptureCommand) -> Result<Rect> {
		match command.target {
			CaptureTarget::Region { rect } => Ok(rect),
			CaptureTarget::FullScreen => self
				.collaborators
				.capture
				.full_screen_bounds()
				.wrap_err("failed to query full screen bounds"),
		}
	}

	fn translate_spans(
		&mut self,
		spans: Vec<TextSpan>,
		languages: &LanguagePair,
	) -> (Vec<TranslatedSpan>, Option<ErrorKind>, Option<String>) {
		let translator = &mut self.collaborators.translator;

		if !translator.is_available() {
			return (
				pass_through(spans),
				Some(ErrorKind::TranslatorUnavailable),
				Some(String::from("translator is not configured")),
			);
		}

		let texts = spans.iter().map(|span| span.text.trim().to_owned()).collect::<Vec<_>>();

		if translator.supports_batch() {
			match translator.translate_batch(&texts, languages) {
				Ok(translated) if translated.len() == texts.len() =>
					return (zip_translations(spans, translated), None, None),
				Ok(translated) => tracing::warn!(
					expected = texts.len(),
					got = translated.len(),
					"Batch translation count mismatch; retrying per span."
				),
				Err(err) => tracing::warn!(
					error = %format!("{err:#}"),
					"Batch translation failed; retrying per span."
				),
			}
		}

		let mut translated = Vec::with_capacity(texts.len());
		let mut failure = None;

		for text in &texts {
			match translator.translate(text, languages) {
				Ok(out) => translated.push(out),
				Err(err) => {
					let message = format!("{err:#}");

					tracing::warn!(error = %message, "Span translation failed.");

					translated.push(String::from(TRANSLATOR_UNAVAILABLE_MARKER));
					failure.get_or_insert(message);
				},
			}
		}

		match failure {
			Some(message) => (
				zip_translations(spans, translated),
				Some(ErrorKind::TranslatorUnavailable),
				Some(message),
			),
			None => (zip_translations(spans, translated), None, None),
		}
	}

	fn run(mut self, inbox: &CommandInbox, outbox: &EventOutbox, policy: QueuePolicy) {
		let translator_available = self.collaborators.translator.is_available();

		if translator_available {
			tracing::info!("Capture pipeline ready.");
		} else {
			tracing::warn!(
				"Capture pipeline ready without a translator; results will be untranslated."
			);
		}

		if outbox.send(PipelineEvent::Ready { translator_available }).is_err() {
			tracing::error!("Result queue closed before the pipeline started.");

			return;
		}

		while let Some(batch) = next_batch(inbox, policy) {
			for step in plan(batch, policy) {
				let result = match step {
					Step::Execute(command) => self.process_guarded(&command),
					Step::Supersede { stale, by } => {
						tracing::info!(
							request_id = %stale.request_id,
							superseded_by = %by,
							"Skipping stale request."
						);

						CaptureResult::superseded(stale.request_id, by)
					},
					Step::Shutdown { abandoned } => {
						if abandoned > 0 {
							tracing::warn!(
								abandoned,
								"Commands queued after shutdown were not run."
							);
						}

						tracing::info!("Capture pipeline shutting down.");

						return;
					},
				};

				if let Err(err) = outbox.send(PipelineEvent::Result { result }) {
					tracing::error!(error = %err, "Capture pipeline down.");

					return;
				}
			}
		}

		tracing::info!("Command queue closed; capture pipeline stopped.");
	}

	fn process_guarded(&mut self, command: &CaptureCommand) -> CaptureResult {
		match catch_unwind(AssertUnwindSafe(|| self.process(command))) {
			Ok(result) => result,
			Err(_) => {
				tracing::error!(
					request_id = %command.request_id,
					"Pipeline panicked while processing request."
				);

				CaptureResult::failed(
					command.request_id,
					command.target.rect(),
					ErrorKind::CaptureFailed,
					"pipeline panicked while processing this request",
					StageTimings::default(),
				)
			},
		}
	}
}

/// Join handle for the worker thread.
pub struct WorkerHandle {
	join: Option<JoinHandle<()>>,
}
impl WorkerHandle {
	#[must_use]
	pub fn is_finished(&self) -> bool {
		self.join.as_ref().is_none_or(JoinHandle::is_finished)
	}

	/// Waits up to `timeout` for the thread to exit. Returns whether it did.
	pub fn join_timeout(&mut self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;

		while !self.is_finished() {
			if Instant::now() >= deadline {
				return false;
			}

			thread::sleep(Duration::from_millis(10));
		}

		if let Some(join) = self.join.take() {
			if join.join().is_err() {
				tracing::error!("Capture worker thread panicked.");
			}
		}

		true
	}
}

#[derive(Debug, PartialEq)]
pub(crate) enum Step {
	Execute(CaptureCommand),
	Supersede { stale: CaptureCommand, by: RequestId },
	Shutdown { abandoned: usize },
}

/// Blocks for one command, then drains whatever else is already queued when
/// the policy needs to look ahead.
fn next_batch(inbox: &CommandInbox, policy: QueuePolicy) -> Option<Vec<PipelineCommand>> {
	let mut batch = vec![inbox.recv()?];

	if policy == QueuePolicy::SupersedeStale {
		while let Some(next) = inbox.try_recv() {
			batch.push(next);
		}
	}

	Some(batch)
}

/// Orders one drained batch into steps. Commands keep their arrival order; with
/// `SupersedeStale` a command is skipped when a later command of the same kind
/// precedes the next shutdown.
pub(crate) fn plan(batch: Vec<PipelineCommand>, policy: QueuePolicy) -> Vec<Step> {
	let shutdown_at = batch.iter().position(|c| matches!(c, PipelineCommand::Shutdown));
	let live_len = shutdown_at.unwrap_or(batch.len());
	let latest_of = |kind: CaptureKind| {
		batch[..live_len].iter().rev().find_map(|c| match c {
			PipelineCommand::Capture { command } if command.kind() == kind =>
				Some(command.request_id),
			_ => None,
		})
	};
	let latest_region = latest_of(CaptureKind::Region);
	let latest_full = latest_of(CaptureKind::FullScreen);
	let mut steps = Vec::with_capacity(live_len + 1);

	for command in batch.iter().take(live_len) {
		let PipelineCommand::Capture { command } = command else {
			continue;
		};
		let latest = match command.kind() {
			CaptureKind::Region => latest_region,
			CaptureKind::FullScreen => latest_full,
		};

		match latest {
			Some(by) if policy == QueuePolicy::SupersedeStale && by != command.request_id =>
				steps.push(Step::Supersede { stale: command.clone(), by }),
			_ => steps.push(Step::Execute(command.clone())),
		}
	}

	if let Some(at) = shutdown_at {
		steps.push(Step::Shutdown { abandoned: batch.len() - at - 1 });
	}

	steps
}

fn elapsed_ms(since: Instant) -> u64 {
	u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
