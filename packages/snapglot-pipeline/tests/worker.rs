use std::sync::{Arc, Mutex};
use std::time::Duration;

use color_eyre::eyre::{Result, eyre};
use image::{Rgba, RgbaImage};

use snapglot_pipeline::{
	CaptureBackend, CaptureWorker, Collaborators, QueuePolicy, Recognizer, RequestChannel,
	Translator, TryReceive, UnavailableTranslator,
};
use snapglot_protocol::{
	CaptureCommand, CaptureResult, ErrorKind, LanguagePair, MinSize, PipelineEvent, Rect,
	RequestId, TRANSLATOR_UNAVAILABLE_MARKER, TextSpan,
};

const WAIT: Duration = Duration::from_secs(5);

/// Paints a dark bar into an otherwise white capture so recognizers see "text".
struct PaintedScreen {
	captured: Arc<Mutex<Vec<Rect>>>,
}
impl CaptureBackend for PaintedScreen {
	fn full_screen_bounds(&mut self) -> Result<Rect> {
		Ok(Rect::new(0, 0, 1280, 720))
	}

	fn capture(&mut self, rect: Rect) -> Result<RgbaImage> {
		self.captured.lock().unwrap().push(rect);

		let mut image = RgbaImage::from_pixel(rect.width, rect.height, Rgba([255, 255, 255, 255]));

		for x in 10..rect.width.min(90) {
			image.put_pixel(x, rect.height / 2, Rgba([0, 0, 0, 255]));
		}

		Ok(image)
	}
}

struct BlankScreen;
impl CaptureBackend for BlankScreen {
	fn full_screen_bounds(&mut self) -> Result<Rect> {
		Ok(Rect::new(0, 0, 1280, 720))
	}

	fn capture(&mut self, rect: Rect) -> Result<RgbaImage> {
		Ok(RgbaImage::from_pixel(rect.width, rect.height, Rgba([255, 255, 255, 255])))
	}
}

/// Reports "Hello" whenever the capture is not uniform.
struct HelloRecognizer;
impl Recognizer for HelloRecognizer {
	fn recognize(&mut self, image: &RgbaImage) -> Result<Vec<TextSpan>> {
		let first = image.get_pixel(0, 0);

		if image.pixels().all(|p| p == first) {
			return Ok(Vec::new());
		}

		Ok(vec![TextSpan::new("Hello", Rect::new(10, 10, 80, 20), 0.95)])
	}
}

struct Dictionary;
impl Translator for Dictionary {
	fn is_available(&self) -> bool {
		true
	}

	fn supports_batch(&self) -> bool {
		true
	}

	fn translate(&mut self, text: &str, languages: &LanguagePair) -> Result<String> {
		match (text, languages.target.as_str()) {
			("Hello", "vi") => Ok(String::from("Xin chào")),
			_ => Err(eyre!("no entry for {text}")),
		}
	}

	fn translate_batch(
		&mut self,
		texts: &[String],
		languages: &LanguagePair,
	) -> Result<Vec<String>> {
		texts.iter().map(|text| self.translate(text, languages)).collect()
	}
}

fn en_vi() -> LanguagePair {
	LanguagePair::new("en", "vi")
}

fn painted() -> (PaintedScreen, Arc<Mutex<Vec<Rect>>>) {
	let captured = Arc::new(Mutex::new(Vec::new()));

	(PaintedScreen { captured: captured.clone() }, captured)
}

fn next_result(channel: &snapglot_pipeline::ResultQueue) -> CaptureResult {
	loop {
		match channel.receive_timeout(WAIT) {
			TryReceive::Event(PipelineEvent::Result { result }) => return result,
			TryReceive::Event(PipelineEvent::Ready { .. }) => continue,
			other => panic!("expected a result, got {other:?}"),
		}
	}
}

#[test]
fn hello_is_translated_in_place() {
	let RequestChannel { commands, results, worker } = RequestChannel::new();
	let (screen, captured) = painted();
	let mut handle = CaptureWorker::spawn(worker, QueuePolicy::Fifo, move || {
		Ok(Collaborators {
			capture: Box::new(screen),
			recognizer: Box::new(HelloRecognizer),
			translator: Box::new(Dictionary),
		})
	})
	.unwrap();

	assert!(matches!(
		results.receive_timeout(WAIT),
		TryReceive::Event(PipelineEvent::Ready { translator_available: true })
	));

	let id = commands.next_request_id();
	let rect = Rect::new(0, 0, 200, 50);

	commands.send(CaptureCommand::region(id, rect, MinSize::default(), en_vi()).unwrap()).unwrap();

	let result = next_result(&results);

	assert_eq!(result.request_id, id);
	assert_eq!(result.region, Some(rect));
	assert_eq!(result.error, None);
	assert_eq!(result.spans.len(), 1);
	assert_eq!(result.spans[0].span.text, "Hello");
	assert_eq!(result.spans[0].translated_text, "Xin chào");
	assert_eq!(result.spans[0].span.bbox, Rect::new(10, 10, 80, 20));
	assert_eq!(*captured.lock().unwrap(), vec![rect]);

	commands.shutdown().unwrap();

	assert!(handle.join_timeout(WAIT));
}

#[test]
fn results_follow_submission_order() {
	let RequestChannel { commands, results, worker } = RequestChannel::new();
	let (screen, captured) = painted();
	let mut handle = CaptureWorker::spawn(worker, QueuePolicy::Fifo, move || {
		Ok(Collaborators {
			capture: Box::new(screen),
			recognizer: Box::new(HelloRecognizer),
			translator: Box::new(Dictionary),
		})
	})
	.unwrap();
	let rects = [Rect::new(0, 0, 200, 50), Rect::new(300, 0, 120, 40), Rect::new(0, 400, 64, 64)];
	let mut sent = Vec::new();

	for rect in rects {
		let id = commands.next_request_id();

		commands
			.send(CaptureCommand::region(id, rect, MinSize::default(), en_vi()).unwrap())
			.unwrap();
		sent.push(id);
	}

	let received = (0..rects.len()).map(|_| next_result(&results).request_id).collect::<Vec<_>>();

	assert_eq!(received, sent);
	assert_eq!(*captured.lock().unwrap(), rects.to_vec());

	commands.shutdown().unwrap();

	assert!(handle.join_timeout(WAIT));
}

#[test]
fn missing_translator_degrades_to_marked_spans() {
	let RequestChannel { commands, results, worker } = RequestChannel::new();
	let (screen, _) = painted();
	let mut handle = CaptureWorker::spawn(worker, QueuePolicy::Fifo, move || {
		Ok(Collaborators {
			capture: Box::new(screen),
			recognizer: Box::new(HelloRecognizer),
			translator: Box::new(UnavailableTranslator::default()),
		})
	})
	.unwrap();

	assert!(matches!(
		results.receive_timeout(WAIT),
		TryReceive::Event(PipelineEvent::Ready { translator_available: false })
	));

	commands.send(CaptureCommand::full_screen(commands.next_request_id(), en_vi())).unwrap();

	let result = next_result(&results);

	assert_eq!(result.error, Some(ErrorKind::TranslatorUnavailable));
	assert!(result.is_success());
	assert_eq!(result.region, Some(Rect::new(0, 0, 1280, 720)));
	assert_eq!(result.spans[0].span.text, "Hello");
	assert_eq!(result.spans[0].translated_text, TRANSLATOR_UNAVAILABLE_MARKER);

	commands.shutdown().unwrap();

	assert!(handle.join_timeout(WAIT));
}

#[test]
fn blank_capture_resolves_with_no_spans() {
	let RequestChannel { commands, results, worker } = RequestChannel::new();
	let mut handle = CaptureWorker::spawn(worker, QueuePolicy::Fifo, || {
		Ok(Collaborators {
			capture: Box::new(BlankScreen),
			recognizer: Box::new(HelloRecognizer),
			translator: Box::new(Dictionary),
		})
	})
	.unwrap();
	let id = commands.next_request_id();

	commands
		.send(
			CaptureCommand::region(id, Rect::new(5, 5, 40, 40), MinSize::default(), en_vi())
				.unwrap(),
		)
		.unwrap();

	let result = next_result(&results);

	assert_eq!(result.request_id, id);
	assert!(result.spans.is_empty());
	assert_eq!(result.error, None);

	commands.shutdown().unwrap();

	assert!(handle.join_timeout(WAIT));
}

#[test]
fn shutdown_stops_after_pending_work() {
	let RequestChannel { commands, results, worker } = RequestChannel::new();
	let id = commands.next_request_id();

	// Queued before the worker exists; must still be answered before shutdown.
	commands.send(CaptureCommand::full_screen(id, en_vi())).unwrap();
	commands.shutdown().unwrap();

	let mut handle = CaptureWorker::spawn(worker, QueuePolicy::Fifo, || {
		Ok(Collaborators {
			capture: Box::new(BlankScreen),
			recognizer: Box::new(HelloRecognizer),
			translator: Box::new(Dictionary),
		})
	})
	.unwrap();

	assert_eq!(next_result(&results).request_id, id);
	assert!(handle.join_timeout(WAIT));
	assert!(matches!(results.try_receive(), TryReceive::Disconnected));
	assert!(commands.send(CaptureCommand::full_screen(RequestId(99), en_vi())).is_err());
}

#[test]
fn stale_region_requests_are_superseded() {
	let RequestChannel { commands, results, worker } = RequestChannel::new();
	let ids = (0..3).map(|_| commands.next_request_id()).collect::<Vec<_>>();

	for (i, id) in ids.iter().enumerate() {
		let rect = Rect::new(i as i32 * 100, 0, 50, 50);

		commands
			.send(CaptureCommand::region(*id, rect, MinSize::default(), en_vi()).unwrap())
			.unwrap();
	}

	let mut handle = CaptureWorker::spawn(worker, QueuePolicy::SupersedeStale, || {
		Ok(Collaborators {
			capture: Box::new(BlankScreen),
			recognizer: Box::new(HelloRecognizer),
			translator: Box::new(Dictionary),
		})
	})
	.unwrap();
	let outcomes = (0..3).map(|_| next_result(&results)).collect::<Vec<_>>();

	assert_eq!(outcomes.iter().map(|r| r.request_id).collect::<Vec<_>>(), ids);
	assert_eq!(outcomes[0].error, Some(ErrorKind::Superseded));
	assert_eq!(outcomes[1].error, Some(ErrorKind::Superseded));
	assert_eq!(outcomes[2].error, None);

	commands.shutdown().unwrap();

	assert!(handle.join_timeout(WAIT));
}

#[test]
fn failed_startup_reports_pipeline_down() {
	let RequestChannel { commands, results, worker } = RequestChannel::new();
	let mut handle =
		CaptureWorker::spawn(worker, QueuePolicy::Fifo, || Err(eyre!("no OCR engine found")))
			.unwrap();

	match results.receive_timeout(WAIT) {
		TryReceive::Event(PipelineEvent::Down { reason }) =>
			assert!(reason.contains("no OCR engine found")),
		other => panic!("expected pipeline down, got {other:?}"),
	}

	assert!(handle.join_timeout(WAIT));
	assert!(matches!(results.try_receive(), TryReceive::Disconnected));
	assert!(commands.shutdown().is_err());
}

#[test]
fn closed_result_queue_stops_the_worker() {
	let RequestChannel { commands, results, worker } = RequestChannel::new();

	drop(results);

	let mut handle = CaptureWorker::spawn(worker, QueuePolicy::Fifo, || {
		Ok(Collaborators {
			capture: Box::new(BlankScreen),
			recognizer: Box::new(HelloRecognizer),
			translator: Box::new(Dictionary),
		})
	})
	.unwrap();

	assert!(handle.join_timeout(WAIT));
	assert!(commands.send(CaptureCommand::full_screen(RequestId(1), en_vi())).is_err());
}
