//! Deckwatch: tracks an opponent's card cycle from screen captures.
//!
//! `deckwatch [config.json]` runs until the frame source runs dry, the
//! operator types `quit`, or capture keeps failing.

mod capture;
mod config;
mod console;
mod error;
mod sink;
mod tracker;

use std::{
	path::PathBuf,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Instant,
};

use anyhow::Context;
use data::Catalog;
use ie::{Ie, TemplateLibrary, TemplateOrigin, TemplateStore};

use crate::{
	capture::LatestFrame,
	config::Config,
	console::Console,
	error::{CaptureError, Error},
	sink::Sink,
	tracker::{ReviewDesk, Tracker, TrackerEvent},
};

fn main() -> anyhow::Result<()> {
	// Structured logging. Use `RUST_LOG=debug` etc.; stdout is reserved for JSON events.
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_writer(std::io::stderr)
		.init();

	let config = match std::env::args_os().nth(1).map(PathBuf::from) {
		Some(path) => Config::load_from(&path)?,
		None => Config::load_or_default(),
	};
	config.validate()?;

	run(config)
}

fn run(config: Config) -> anyhow::Result<()> {
	let assets = &config.assets;
	let catalog = Arc::new(Catalog::load(&assets.catalog)?);
	tracing::info!(cards = catalog.len(), path = %assets.catalog.display(), "catalog loaded");

	let blur_sigma = config.tracker.identify.blur_sigma;
	let mut library = TemplateLibrary::load_dirs(&assets.template_dirs, TemplateOrigin::Reference, &catalog, blur_sigma)?;
	let reviewed = library.load_dir(&assets.user_templates, TemplateOrigin::Reviewed, &catalog)?;
	if reviewed > 0 {
		tracing::info!(templates = reviewed, "loaded operator-confirmed templates");
	}
	if library.is_empty() {
		tracing::warn!("no templates loaded; every card will need manual review");
	}

	let ie = Ie::try_new(
		config.regions.clone(),
		config.classifier.clone(),
		library,
		TemplateStore::new(&assets.user_templates),
	)?;

	let stop = Arc::new(AtomicBool::new(false));
	let (desk, link) = ReviewDesk::channel();
	let console = Console::new(link, catalog.clone(), &assets.review_dir).spawn(stop.clone())?;

	let capture_cfg = &config.capture;
	let source = capture::open(capture_cfg)?;
	let latest = Arc::new(LatestFrame::new());
	let producer = capture::spawn_producer(source, latest.clone(), capture_cfg.poll_delay(), stop.clone())?;

	let started = Instant::now();
	let mut tracker = Tracker::new(ie, catalog.clone(), desk, config.tracker, started);
	let sink = Sink::new(catalog.clone(), started, config.json_output);

	let double_elixir_at = config.tracker.double_elixir_after_s.and_then(|s| started.checked_add(config::seconds(s)));
	let mut doubled = false;

	let mut failures = 0u32;
	let outcome = loop {
		if stop.load(Ordering::Relaxed) {
			tracing::info!("stop requested");
			break Ok(());
		}

		let now = Instant::now();
		if !doubled && double_elixir_at.is_some_and(|at| now >= at) {
			doubled = true;
			tracker.set_regen_interval(config.tracker.regen_interval() / 2, now);
			tracing::info!("double elixir");
		}

		match latest.take(capture_cfg.frame_timeout()) {
			Ok(frame) => {
				failures = 0;
				let now = Instant::now();
				let events = tracker.step(frame.as_image(), now);
				sink.emit(&events, now);
			}
			Err(CaptureError::Exhausted) => {
				tracing::info!("frame source exhausted");
				break Ok(());
			}
			Err(err) => {
				failures += 1;
				let now = Instant::now();
				let mut events = tracker.idle(now);
				if sink::should_log_failure(failures) {
					events.push(TrackerEvent::CaptureFailed { attempt: failures, error: err.to_string() });
				}
				sink.emit(&events, now);

				if failures >= capture_cfg.max_failures {
					break Err(Error::CaptureExhausted { attempts: failures, last: err });
				}
				std::thread::sleep(capture_cfg.retry_delay());
			}
		}
	};

	stop.store(true, Ordering::Relaxed);
	if producer.join().is_err() {
		tracing::error!("capture thread panicked");
	}
	// The console thread may be blocked on stdin; it exits on its own once `stop` is seen.
	drop(console);

	if tracker.open_reviews() > 0 {
		tracing::info!(open = tracker.open_reviews(), "reviews left unanswered");
	}
	let hand = tracker.hand();
	tracing::info!(
		hand = %sink::hand_names(&catalog, &hand.cards).join(", "),
		certain = hand.certain,
		elixir = tracker.elixir(),
		locked_slots = tracker.slots().iter().filter(|s| s.is_locked()).count(),
		"final state"
	);
	tracing::info!(
		"{}",
		sink::summary(&catalog, tracker.history().len(), started.elapsed(), tracker.queue().order())
	);

	outcome.context("tracking stopped")
}
