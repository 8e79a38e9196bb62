use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::time::Duration;

use thiserror::Error;

use snapglot_protocol::{CaptureCommand, PipelineCommand, PipelineEvent, RequestId};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("the {0} queue is closed")]
pub struct ChannelClosed(pub &'static str);

/// The command and result queues plus the worker's end of both.
///
/// Created once at startup. The worker endpoint is not `Clone`, so exactly one
/// consumer can ever drain the command queue.
pub struct RequestChannel {
	pub commands: CommandQueue,
	pub results: ResultQueue,
	pub worker: WorkerEndpoint,
}
impl RequestChannel {
	#[must_use]
	pub fn new() -> Self {
		// Both queues are unbounded: producers never block and never lose a command.
		let (command_tx, command_rx) = channel::<PipelineCommand>();
		let (event_tx, event_rx) = channel::<PipelineEvent>();

		Self {
			commands: CommandQueue { tx: command_tx, next_id: Arc::new(AtomicU64::new(1)) },
			results: ResultQueue { rx: event_rx },
			worker: WorkerEndpoint {
				inbox: CommandInbox { rx: command_rx },
				outbox: EventOutbox { tx: event_tx },
			},
		}
	}
}

impl Default for RequestChannel {
	fn default() -> Self {
		Self::new()
	}
}

/// Producer handle for the command queue. Cheap to clone; every clone shares
/// the same request id sequence.
#[derive(Clone, Debug)]
pub struct CommandQueue {
	tx: Sender<PipelineCommand>,
	next_id: Arc<AtomicU64>,
}
impl CommandQueue {
	/// Allocates the next request id. Ids are strictly increasing across clones.
	#[must_use]
	pub fn next_request_id(&self) -> RequestId {
		RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
	}

	pub fn send(&self, command: CaptureCommand) -> Result<(), ChannelClosed> {
		self.tx.send(PipelineCommand::Capture { command }).map_err(|_| ChannelClosed("command"))
	}

	pub fn shutdown(&self) -> Result<(), ChannelClosed> {
		self.tx.send(PipelineCommand::Shutdown).map_err(|_| ChannelClosed("command"))
	}
}

/// Consumer handle for the result queue.
pub struct ResultQueue {
	rx: Receiver<PipelineEvent>,
}
impl ResultQueue {
	/// Blocks until the next event. `None` once the worker side is gone.
	pub fn receive(&self) -> Option<PipelineEvent> {
		self.rx.recv().ok()
	}

	pub fn receive_timeout(&self, timeout: Duration) -> TryReceive {
		match self.rx.recv_timeout(timeout) {
			Ok(event) => TryReceive::Event(event),
			Err(RecvTimeoutError::Timeout) => TryReceive::Empty,
			Err(RecvTimeoutError::Disconnected) => TryReceive::Disconnected,
		}
	}

	pub fn try_receive(&self) -> TryReceive {
		match self.rx.try_recv() {
			Ok(event) => TryReceive::Event(event),
			Err(TryRecvError::Empty) => TryReceive::Empty,
			Err(TryRecvError::Disconnected) => TryReceive::Disconnected,
		}
	}
}

#[derive(Debug)]
pub enum TryReceive {
	Event(PipelineEvent),
	Empty,
	Disconnected,
}

/// The worker's end of both queues. Handed to [`crate::CaptureWorker::spawn`].
pub struct WorkerEndpoint {
	pub(crate) inbox: CommandInbox,
	pub(crate) outbox: EventOutbox,
}

pub(crate) struct CommandInbox {
	rx: Receiver<PipelineCommand>,
}
impl CommandInbox {
	pub(crate) fn recv(&self) -> Option<PipelineCommand> {
		self.rx.recv().ok()
	}

	pub(crate) fn try_recv(&self) -> Option<PipelineCommand> {
		self.rx.try_recv().ok()
	}
}

pub(crate) struct EventOutbox {
	tx: Sender<PipelineEvent>,
}
impl EventOutbox {
	pub(crate) fn send(&self, event: PipelineEvent) -> Result<(), ChannelClosed> {
		self.tx.send(event).map_err(|_| ChannelClosed("result"))
	}
}

#[cfg(test)]
mod tests {
	use snapglot_protocol::{CaptureCommand, LanguagePair, PipelineCommand, PipelineEvent};

	use crate::channel::{RequestChannel, TryReceive};

	#[test]
	fn request_ids_are_monotonic_across_clones() {
		let channel = RequestChannel::new();
		let a = channel.commands.clone();
		let b = channel.commands.clone();
		let first = a.next_request_id();
		let second = b.next_request_id();
		let third = a.next_request_id();

		assert!(first < second && second < third);
	}

	#[test]
	fn commands_arrive_in_send_order() {
		let channel = RequestChannel::new();
		let langs = LanguagePair::new("en", "vi");

		for _ in 0..3 {
			let id = channel.commands.next_request_id();

			channel.commands.send(CaptureCommand::full_screen(id, langs.clone())).unwrap();
		}

		channel.commands.shutdown().unwrap();

		let mut seen = Vec::new();

		while let Some(command) = channel.worker.inbox.try_recv() {
			seen.push(command);
		}

		assert_eq!(seen.len(), 4);
		assert!(matches!(seen[3], PipelineCommand::Shutdown));

		let ids = seen
			.iter()
			.filter_map(|c| match c {
				PipelineCommand::Capture { command } => Some(command.request_id.0),
				PipelineCommand::Shutdown => None,
			})
			.collect::<Vec<_>>();

		assert_eq!(ids, vec![1, 2, 3]);
	}

	#[test]
	fn result_queue_reports_disconnect() {
		let RequestChannel { results, worker, .. } = RequestChannel::new();

		assert!(matches!(results.try_receive(), TryReceive::Empty));

		worker.outbox.send(PipelineEvent::Ready { translator_available: true }).unwrap();

		drop(worker);

		assert!(matches!(results.try_receive(), TryReceive::Event(PipelineEvent::Ready { .. })));
		assert!(matches!(results.try_receive(), TryReceive::Disconnected));
	}

	#[test]
	fn blocking_receive_drains_then_ends_at_disconnect() {
		let RequestChannel { results, worker, .. } = RequestChannel::new();

		worker.outbox.send(PipelineEvent::Down { reason: String::from("gone") }).unwrap();

		drop(worker);

		assert!(matches!(results.receive(), Some(PipelineEvent::Down { .. })));
		assert!(results.receive().is_none());
	}

	#[test]
	fn send_fails_once_worker_is_gone() {
		let RequestChannel { commands, worker, .. } = RequestChannel::new();

		drop(worker);

		assert!(commands.shutdown().is_err());
	}
}
