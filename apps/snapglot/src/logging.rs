use directories::ProjectDirs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Console logging plus a daily file under the per-user data dir.
///
/// Hold the returned guard for the life of the process; dropping it flushes and
/// stops the file writer.
pub fn init() -> Option<WorkerGuard> {
	let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let console = tracing_subscriber::fmt::layer().with_filter(filter());
	let log_dir =
		ProjectDirs::from("ink", "hack", "snapglot").map(|dirs| dirs.data_dir().join("logs"));
	let (file, guard) = match log_dir {
		Some(dir) => {
			let appender = tracing_appender::rolling::daily(dir, "snapglot.log");
			let (writer, guard) = tracing_appender::non_blocking(appender);
			let layer = tracing_subscriber::fmt::layer()
				.with_ansi(false)
				.with_writer(writer)
				.with_filter(filter());

			(Some(layer), Some(guard))
		},
		None => (None, None),
	};

	tracing_subscriber::registry().with(console).with(file).init();

	guard
}
