mod app;
mod collaborators;
mod hotkeys;
mod icon;
mod logging;
mod overlay_window;
mod selection_window;
mod settings;
mod surface;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;

use crate::settings::AppSettings;

/// Snip a screen region, recognize its text, and overlay the translation in place.
#[derive(Debug, Parser)]
#[command(name = "snapglot", version, about)]
struct Args {
	/// Source language code, overriding the settings file.
	#[arg(long)]
	source: Option<String>,

	/// Target language code, overriding the settings file.
	#[arg(long)]
	target: Option<String>,

	/// Settings file to read instead of the per-user one.
	#[arg(long, value_name = "PATH")]
	config: Option<PathBuf>,
}

fn main() -> Result<()> {
	let args = Args::parse();

	color_eyre::install()?;

	let _log_guard = logging::init();
	let mut settings = match args.config.as_deref() {
		Some(path) => AppSettings::load_from(path),
		None => AppSettings::load(),
	};

	if let Some(source) = args.source {
		settings.source_lang = source;
	}
	if let Some(target) = args.target {
		settings.target_lang = target;
	}

	tracing::info!(
		source = %settings.source_lang,
		target = %settings.target_lang,
		"Starting snapglot."
	);

	app::run(settings)
}
