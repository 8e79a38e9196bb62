//! The capture worker: one thread that turns capture commands into translated results.
//!
//! Commands enter through [`CommandQueue`], results leave through [`ResultQueue`], and
//! the three collaborators (screen capture, text recognition, translation) sit behind
//! traits so engines can be swapped without touching the orchestration.

mod backend;
mod channel;
mod recognize;
mod spans;
mod translate;
mod worker;

pub use backend::{
	CaptureBackend, CaptureBackendError, StubCaptureBackend, XcapCaptureBackend,
	default_capture_backend, monitor_areas,
};
pub use channel::{
	ChannelClosed, CommandQueue, RequestChannel, ResultQueue, TryReceive, WorkerEndpoint,
};
pub use recognize::{
	ModelPaths, OcrModelConfig, PaddleRecognizer, RecognizeError, Recognizer, StubRecognizer,
};
pub use spans::{DUPLICATE_OVERLAP, pass_through, prepare_spans, zip_translations};
pub use translate::{
	LibreTranslateClient, LibreTranslateConfig, TranslateError, Translator, UnavailableTranslator,
};
pub use worker::{CaptureWorker, Collaborators, QueuePolicy, WorkerHandle};
