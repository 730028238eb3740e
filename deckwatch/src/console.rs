//! Operator console: answers review requests from stdin.
//!
//! Runs on its own thread so the tracking loop never waits for a human. The
//! oldest open review is the current one; `3: hog rider` answers the review
//! of slot 3 instead. `calibrate N` tells the tracker that slot N currently
//! shows an empty slot, so its colour is learned as background.

use std::{
	collections::VecDeque,
	ops::ControlFlow,
	path::PathBuf,
	sync::{
		Arc, LazyLock,
		atomic::{AtomicBool, Ordering},
		mpsc::{self, Receiver, RecvTimeoutError},
	},
	thread::JoinHandle,
	time::Duration,
};

use anyhow::Context;
use data::Catalog;
use regex::Regex;

use crate::tracker::{OperatorCommand, OperatorLink, ReviewAnswer, ReviewRequest, Verdict};

static SLOT_PREFIX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)^\s*(?:s|slot\s*)?(\d)\s*[:=]\s*(.*)$").unwrap());
static CALIBRATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*cal(?:ibrate)?\s+(\d+)\s*$").unwrap());

const HELP: &str = "ENTER accepts the suggestion, type a card name to correct it, 'skip' leaves the slot unknown, \
                    'N: name' answers slot N, 'calibrate N' learns slot N as empty, 'quit' stops tracking";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input<'a> {
	Quit,
	Help,
	Calibrate(usize),
	Reply { slot: Option<usize>, text: &'a str },
}

fn parse(line: &str) -> Input<'_> {
	let trimmed = line.trim();
	match trimmed.to_lowercase().as_str() {
		"q" | "quit" | "exit" => return Input::Quit,
		"?" | "help" => return Input::Help,
		_ => {}
	}

	if let Some(slot) = CALIBRATE.captures(trimmed).and_then(|caps| caps[1].parse().ok()) {
		return Input::Calibrate(slot);
	}
	if let Some(caps) = SLOT_PREFIX.captures(trimmed) {
		let slot = caps.get(1).and_then(|m| m.as_str().parse().ok());
		let text = caps.get(2).map_or("", |m| m.as_str().trim());
		return Input::Reply { slot, text };
	}
	Input::Reply { slot: None, text: trimmed }
}

/// Turn the operator's text into a verdict for `request`, or say what is wrong with it.
fn resolve(text: &str, request: &ReviewRequest, catalog: &Catalog) -> Result<Verdict, String> {
	if text.is_empty() {
		return request
			.candidate
			.map(Verdict::Confirm)
			.ok_or_else(|| format!("no suggestion for slot {}; type a card name or 'skip'", request.slot));
	}
	if matches!(text.to_lowercase().as_str(), "skip" | "-" | "unknown") {
		return Ok(Verdict::Skip);
	}
	catalog
		.find_closest(text)
		.map(Verdict::Confirm)
		.ok_or_else(|| format!("'{text}' is not a known card"))
}

pub struct Console {
	link: OperatorLink,
	catalog: Arc<Catalog>,
	review_dir: PathBuf,
	open: VecDeque<ReviewRequest>,
}

impl Console {
	pub fn new(link: OperatorLink, catalog: Arc<Catalog>, review_dir: impl Into<PathBuf>) -> Self {
		Self {
			link,
			catalog,
			review_dir: review_dir.into(),
			open: VecDeque::new(),
		}
	}

	/// Start the console thread (plus a stdin reader). Typing `quit` sets `stop`.
	pub fn spawn(self, stop: Arc<AtomicBool>) -> anyhow::Result<JoinHandle<()>> {
		let (tx, lines) = mpsc::channel();
		std::thread::Builder::new()
			.name("stdin".into())
			.spawn(move || {
				for line in std::io::stdin().lines() {
					let Ok(line) = line else { break };
					if tx.send(line).is_err() {
						break;
					}
				}
			})
			.context("spawn stdin reader")?;

		std::thread::Builder::new()
			.name("console".into())
			.spawn(move || self.run(lines, stop))
			.context("spawn console thread")
	}

	fn run(mut self, lines: Receiver<String>, stop: Arc<AtomicBool>) {
		while !stop.load(Ordering::Relaxed) {
			self.receive();
			match lines.recv_timeout(Duration::from_millis(100)) {
				Ok(line) => {
					self.receive();
					if self.handle_line(&line).is_break() {
						stop.store(true, Ordering::Relaxed);
					}
				}
				Err(RecvTimeoutError::Timeout) => {}
				Err(RecvTimeoutError::Disconnected) => {
					tracing::info!(open = self.open.len(), "stdin closed; open reviews stay unanswered");
					break;
				}
			}
		}
	}

	/// Pull new review requests; announce the first one that becomes current.
	fn receive(&mut self) {
		while let Ok(request) = self.link.requests.try_recv() {
			self.open.push_back(request);
			if self.open.len() == 1 {
				self.announce(0);
			}
		}
	}

	fn announce(&self, index: usize) {
		let Some(request) = self.open.get(index) else {
			return;
		};
		let image = self.save_image(request);
		let suggestion = match request.candidate {
			Some(card) => format!("'{}' ({:.2})", self.catalog.name(card), request.confidence),
			None => format!("UNKNOWN (best {:.2})", request.confidence),
		};
		eprintln!("[REVIEW] slot {} {}: suggestion {suggestion}", request.slot, request.token);
		if let Some(path) = image {
			eprintln!("[REVIEW] image: {}", path.display());
		}
		if self.open.len() > 1 {
			eprintln!("[REVIEW] {} more waiting", self.open.len() - 1);
		}
		eprintln!("[REVIEW] {HELP}");
	}

	fn save_image(&self, request: &ReviewRequest) -> Option<PathBuf> {
		let path = self.review_dir.join(format!("slot{}_{}.png", request.slot, request.token.0));
		let saved = std::fs::create_dir_all(&self.review_dir)
			.with_context(|| format!("create {}", self.review_dir.display()))
			.and_then(|_| request.image.as_image().save_png(&path));
		match saved {
			Ok(()) => Some(path),
			Err(err) => {
				tracing::warn!(error = %format!("{err:#}"), slot = request.slot, "failed to write review image");
				None
			}
		}
	}

	fn handle_line(&mut self, line: &str) -> ControlFlow<()> {
		let (slot, text) = match parse(line) {
			Input::Quit => return ControlFlow::Break(()),
			Input::Help => {
				eprintln!("{HELP}");
				return ControlFlow::Continue(());
			}
			Input::Calibrate(slot) => return self.calibrate(slot),
			Input::Reply { slot, text } => (slot, text),
		};

		if self.open.is_empty() {
			if !text.is_empty() {
				eprintln!("no review is open");
			}
			return ControlFlow::Continue(());
		}

		let index = match slot {
			Some(slot) => match self.open.iter().position(|r| r.slot == slot) {
				Some(index) => index,
				None => {
					eprintln!("slot {slot} has no open review");
					return ControlFlow::Continue(());
				}
			},
			None => 0,
		};

		let verdict = match resolve(text, &self.open[index], &self.catalog) {
			Ok(verdict) => verdict,
			Err(msg) => {
				eprintln!("{msg}");
				return ControlFlow::Continue(());
			}
		};

		let Some(request) = self.open.remove(index) else {
			return ControlFlow::Continue(());
		};
		match verdict {
			Verdict::Confirm(card) => eprintln!("[LEARN][MANUAL] S{}={}", request.slot, self.catalog.name(card)),
			Verdict::Skip => eprintln!("[LEARN][SKIP] S{}", request.slot),
		}
		if self.link.answers.send(ReviewAnswer { token: request.token, verdict }).is_err() {
			tracing::warn!("tracker stopped; answer dropped");
			return ControlFlow::Break(());
		}

		if index == 0 {
			self.announce(0);
		}
		ControlFlow::Continue(())
	}

	fn calibrate(&self, slot: usize) -> ControlFlow<()> {
		if slot >= ie::SLOT_COUNT {
			eprintln!("there are only {} slots (0-{})", ie::SLOT_COUNT, ie::SLOT_COUNT - 1);
			return ControlFlow::Continue(());
		}
		if self.link.commands.send(OperatorCommand::Calibrate { slot }).is_err() {
			tracing::warn!("tracker stopped; calibration dropped");
			return ControlFlow::Break(());
		}
		eprintln!("[CALIBRATE] S{slot} will be sampled on the next frame; it must show an empty slot");
		ControlFlow::Continue(())
	}

	#[cfg(test)]
	fn review_dir(&self) -> &std::path::Path {
		&self.review_dir
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tracker::{ReviewDesk, testing::deck};
	use ie::{Color, OwnedImage};

	#[test]
	fn parse_recognises_commands_and_slot_prefixes() {
		assert_eq!(parse(" QUIT "), Input::Quit);
		assert_eq!(parse("help"), Input::Help);
		assert_eq!(parse(""), Input::Reply { slot: None, text: "" });
		assert_eq!(parse("hog rider"), Input::Reply { slot: None, text: "hog rider" });
		assert_eq!(parse("3: hog rider"), Input::Reply { slot: Some(3), text: "hog rider" });
		assert_eq!(parse("s5=skip"), Input::Reply { slot: Some(5), text: "skip" });
		assert_eq!(parse("slot 2:"), Input::Reply { slot: Some(2), text: "" });
		assert_eq!(parse("calibrate 3"), Input::Calibrate(3));
		assert_eq!(parse(" CAL 12 "), Input::Calibrate(12));
		assert_eq!(parse("calibrate"), Input::Reply { slot: None, text: "calibrate" });
	}

	#[test]
	fn calibrate_sends_a_command_for_valid_slots_only() {
		let (catalog, _) = deck();
		let dir = tempfile::tempdir().unwrap();
		let (mut desk, link) = ReviewDesk::channel();
		let mut console = Console::new(link, Arc::new(catalog), dir.path());

		assert!(console.handle_line("calibrate 6").is_continue());
		assert!(console.handle_line("calibrate 8").is_continue());
		assert_eq!(desk.poll_commands(), vec![OperatorCommand::Calibrate { slot: 6 }]);
	}

	#[test]
	fn resolve_accepts_suggestion_skip_and_typos() {
		let (catalog, cards) = deck();
		let hog = catalog.find("Hog Rider").unwrap();
		let request = ReviewRequest {
			token: crate::tracker::ReviewToken(1),
			slot: 0,
			candidate: Some(cards[0]),
			confidence: 0.5,
			image: OwnedImage::filled(1, 1, Color::BLACK),
		};

		assert_eq!(resolve("", &request, &catalog), Ok(Verdict::Confirm(cards[0])));
		assert_eq!(resolve("skip", &request, &catalog), Ok(Verdict::Skip));
		assert_eq!(resolve("hog ridr", &request, &catalog), Ok(Verdict::Confirm(hog)));
		assert!(resolve("zzzzzzzz", &request, &catalog).is_err());

		let unknown = ReviewRequest { candidate: None, ..request };
		assert!(resolve("", &unknown, &catalog).is_err());
	}

	#[test]
	fn answers_reach_the_desk_for_the_right_slot() {
		let (catalog, cards) = deck();
		let dir = tempfile::tempdir().unwrap();
		let (mut desk, link) = ReviewDesk::channel();
		let mut console = Console::new(link, Arc::new(catalog), dir.path().join("review"));

		let first = desk.open(1, Some(cards[2]), 0.6, OwnedImage::filled(8, 8, Color::WHITE));
		let second = desk.open(4, None, 0.1, OwnedImage::filled(8, 8, Color::BLACK));
		console.receive();
		assert!(console.review_dir().join(format!("slot1_{}.png", first.0)).exists());

		assert!(console.handle_line("4: zap").is_continue());
		assert!(console.handle_line("").is_continue());
		assert!(console.handle_line("quit").is_break());

		let resolved = desk.poll();
		assert_eq!(resolved.len(), 2);
		assert_eq!((resolved[0].token, resolved[0].verdict), (second, Verdict::Confirm(cards[5])));
		assert_eq!((resolved[1].token, resolved[1].verdict), (first, Verdict::Confirm(cards[2])));
	}

	#[test]
	fn bad_answers_keep_the_review_open() {
		let (catalog, _) = deck();
		let dir = tempfile::tempdir().unwrap();
		let (mut desk, link) = ReviewDesk::channel();
		let mut console = Console::new(link, Arc::new(catalog), dir.path());

		desk.open(2, None, 0.0, OwnedImage::filled(8, 8, Color::WHITE));
		console.receive();
		console.handle_line("");
		console.handle_line("not a card at all");
		console.handle_line("7: zap");
		assert!(desk.poll().is_empty());
		assert_eq!(console.open.len(), 1);
	}
}
