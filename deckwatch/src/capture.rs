//! Frame acquisition.
//!
//! Backends implement [`FrameSource`]. Capture runs on its own thread and
//! hands frames to the tracking loop through [`LatestFrame`], a single-slot
//! buffer: a new frame replaces an unconsumed one and the producer never
//! waits for the consumer.

use std::{
	path::{Path, PathBuf},
	sync::{
		Arc, Condvar, Mutex, PoisonError,
		atomic::{AtomicBool, Ordering},
	},
	thread::JoinHandle,
	time::{Duration, Instant},
};

use anyhow::Context;
use ie::OwnedImage;

use crate::{
	config::{CaptureConfig, CaptureSource},
	error::{CaptureError, Error},
};

pub trait FrameSource: Send {
	fn name(&self) -> &str;

	fn capture_frame(&mut self) -> Result<OwnedImage, CaptureError>;
}

/// Build the configured backends, in fallback order.
pub fn open(config: &CaptureConfig) -> Result<Box<dyn FrameSource>, Error> {
	let mut sources: Vec<Box<dyn FrameSource>> = Vec::new();
	for source in &config.sources {
		match source {
			CaptureSource::Replay { dir, looped } => match ReplaySource::open(dir, *looped) {
				Ok(replay) => sources.push(Box::new(replay)),
				Err(err) => tracing::warn!(error = %format!("{err:#}"), "replay source unavailable"),
			},
			#[cfg(feature = "xcap")]
			CaptureSource::Monitor { index } => sources.push(Box::new(screen::MonitorSource::new(*index))),
			#[cfg(feature = "xcap")]
			CaptureSource::Window { app_name } => sources.push(Box::new(screen::WindowSource::new(app_name.clone()))),
			#[cfg(not(feature = "xcap"))]
			CaptureSource::Monitor { .. } | CaptureSource::Window { .. } => {
				tracing::warn!(?source, "screen capture needs the `xcap` feature; skipping")
			}
		}
	}

	match sources.len() {
		0 => Err(Error::Config("no usable capture source".into())),
		1 => Ok(sources.remove(0)),
		_ => Ok(Box::new(Fallback::new(sources))),
	}
}

/// Uses the first backend that works and moves down the list when it stops working.
pub struct Fallback {
	sources: Vec<Box<dyn FrameSource>>,
	active: usize,
}

impl Fallback {
	pub fn new(sources: Vec<Box<dyn FrameSource>>) -> Self {
		Self { sources, active: 0 }
	}
}

impl FrameSource for Fallback {
	fn name(&self) -> &str {
		self.sources.get(self.active).map_or("none", |s| s.name())
	}

	fn capture_frame(&mut self) -> Result<OwnedImage, CaptureError> {
		let count = self.sources.len();
		let mut last = CaptureError::Unavailable("no capture source".into());
		for offset in 0..count {
			let index = (self.active + offset) % count;
			match self.sources[index].capture_frame() {
				Ok(frame) => {
					if index != self.active {
						tracing::info!(from = self.name(), to = self.sources[index].name(), "switched capture backend");
						self.active = index;
					}
					return Ok(frame);
				}
				Err(err) => {
					tracing::debug!(backend = self.sources[index].name(), error = %err, "capture backend failed");
					last = err;
				}
			}
		}
		Err(last)
	}
}

/// Plays back the PNG frames of a directory in file name order.
pub struct ReplaySource {
	name: String,
	frames: Vec<PathBuf>,
	next: usize,
	looped: bool,
}

impl ReplaySource {
	pub fn open(dir: &Path, looped: bool) -> anyhow::Result<Self> {
		let mut frames = std::fs::read_dir(dir)
			.with_context(|| format!("read replay dir {}", dir.display()))?
			.filter_map(|entry| entry.ok().map(|e| e.path()))
			.filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")))
			.collect::<Vec<_>>();
		frames.sort();
		anyhow::ensure!(!frames.is_empty(), "no png frames in {}", dir.display());

		tracing::info!(dir = %dir.display(), frames = frames.len(), looped, "replaying frames");
		Ok(Self {
			name: format!("replay:{}", dir.display()),
			frames,
			next: 0,
			looped,
		})
	}
}

impl FrameSource for ReplaySource {
	fn name(&self) -> &str {
		&self.name
	}

	fn capture_frame(&mut self) -> Result<OwnedImage, CaptureError> {
		if self.next >= self.frames.len() {
			if !self.looped {
				return Err(CaptureError::Exhausted);
			}
			self.next = 0;
		}
		let path = &self.frames[self.next];
		self.next += 1;
		OwnedImage::load(path).map_err(|err| CaptureError::Unavailable(format!("{err:#}")))
	}
}

#[cfg(feature = "xcap")]
mod screen {
	use xcap::image::EncodableLayout;

	use super::FrameSource;
	use crate::error::CaptureError;

	fn unavailable(err: impl std::fmt::Display) -> CaptureError {
		CaptureError::Unavailable(err.to_string())
	}

	pub struct MonitorSource {
		index: usize,
		name: String,
	}

	impl MonitorSource {
		pub fn new(index: usize) -> Self {
			Self { index, name: format!("monitor:{index}") }
		}
	}

	impl FrameSource for MonitorSource {
		fn name(&self) -> &str {
			&self.name
		}

		fn capture_frame(&mut self) -> Result<ie::OwnedImage, CaptureError> {
			let monitor = xcap::Monitor::all()
				.map_err(unavailable)?
				.into_iter()
				.nth(self.index)
				.ok_or_else(|| unavailable(format!("no monitor {}", self.index)))?;
			let img = monitor.capture_image().map_err(unavailable)?;
			Ok(ie::OwnedImage::from_rgba(img.width() as usize, img.as_bytes()))
		}
	}

	/// Captures the window whose app name matches (first match wins).
	pub struct WindowSource {
		app_name: String,
		name: String,
	}

	impl WindowSource {
		pub fn new(app_name: String) -> Self {
			Self { name: format!("window:{app_name}"), app_name }
		}
	}

	impl FrameSource for WindowSource {
		fn name(&self) -> &str {
			&self.name
		}

		fn capture_frame(&mut self) -> Result<ie::OwnedImage, CaptureError> {
			let window = xcap::Window::all()
				.map_err(unavailable)?
				.into_iter()
				.find(|window| window.app_name().ok().as_deref() == Some(self.app_name.as_str()))
				.ok_or_else(|| unavailable(format!("window {:?} not found", self.app_name)))?;
			let img = window.capture_image().map_err(unavailable)?;
			Ok(ie::OwnedImage::from_rgba(img.width() as usize, img.as_bytes()))
		}
	}
}

#[derive(Default)]
struct Latest {
	frame: Option<Result<OwnedImage, CaptureError>>,
	closed: bool,
}

/// Single-slot hand-off between the capture thread and the tracking loop.
#[derive(Default)]
pub struct LatestFrame {
	state: Mutex<Latest>,
	ready: Condvar,
}

impl LatestFrame {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replace whatever is waiting with `frame`.
	pub fn publish(&self, frame: Result<OwnedImage, CaptureError>) {
		let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
		state.frame = Some(frame);
		self.ready.notify_one();
	}

	/// No more frames will come; `take` reports `Exhausted` once the slot is drained.
	pub fn close(&self) {
		let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
		state.closed = true;
		self.ready.notify_all();
	}

	/// Wait up to `timeout` for the next capture result.
	pub fn take(&self, timeout: Duration) -> Result<OwnedImage, CaptureError> {
		let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
		let (mut state, _) = self
			.ready
			.wait_timeout_while(state, timeout, |s| s.frame.is_none() && !s.closed)
			.unwrap_or_else(PoisonError::into_inner);

		match state.frame.take() {
			Some(frame) => frame,
			None if state.closed => Err(CaptureError::Exhausted),
			None => Err(CaptureError::Timeout(timeout)),
		}
	}
}

/// Capture on a background thread every `interval` until `stop` is set or the source runs dry.
pub fn spawn_producer(
	mut source: Box<dyn FrameSource>,
	latest: Arc<LatestFrame>,
	interval: Duration,
	stop: Arc<AtomicBool>,
) -> anyhow::Result<JoinHandle<()>> {
	let handle = std::thread::Builder::new()
		.name("capture".into())
		.spawn(move || {
			tracing::info!(backend = source.name(), "capture started");
			while !stop.load(Ordering::Relaxed) {
				let started = Instant::now();
				match source.capture_frame() {
					Err(CaptureError::Exhausted) => break,
					frame => latest.publish(frame),
				}
				std::thread::sleep(interval.saturating_sub(started.elapsed()));
			}
			latest.close();
			tracing::info!("capture stopped");
		})
		.context("spawn capture thread")?;
	Ok(handle)
}
