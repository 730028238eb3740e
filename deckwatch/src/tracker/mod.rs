//! The tracking loop body.
//!
//! [`Tracker::step`] is one iteration: regenerate elixir, apply review answers,
//! classify the 8 slots of the frame, identify settled reveals, and feed the
//! resulting plays into the cycle queue and the elixir estimate. All of that
//! state is owned here; nothing else writes to it.

pub mod cycle;
pub mod detector;
pub mod elixir;
pub mod event;
pub mod identify;
pub mod review;
pub mod slot;
#[cfg(test)]
pub(crate) mod testing;

use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use data::{CardId, Catalog};
use ie::{Ie, Image, OwnedImage, SlotState};

pub use cycle::{CycleQueue, CycleViolation, HandEstimate, Phase};
pub use elixir::ElixirEstimator;
pub use event::{PlayEvent, Source, TrackerEvent, Warning};
pub use identify::{Decision, IdentifyConfig};
pub use review::{OperatorCommand, OperatorLink, ReviewAnswer, ReviewDesk, ReviewRequest, ReviewToken, Verdict};
pub use slot::{Identity, Slot, SlotBank};

use detector::Detected;
use elixir::Spend;

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct TrackerConfig {
	/// Consecutive frames a new slot state must persist before it is accepted.
	pub debounce_frames: u32,
	pub identify: IdentifyConfig,
	pub initial_elixir: f32,
	/// Seconds per elixir point.
	pub regen_interval_s: f32,
	/// Seconds into the run after which regeneration doubles; `None` never doubles.
	pub double_elixir_after_s: Option<f32>,
}

impl Default for TrackerConfig {
	fn default() -> Self {
		Self {
			debounce_frames: 2,
			identify: IdentifyConfig::default(),
			initial_elixir: 5.0,
			regen_interval_s: 2.8,
			double_elixir_after_s: None,
		}
	}
}

impl TrackerConfig {
	pub fn regen_interval(&self) -> Duration {
		crate::config::seconds(self.regen_interval_s.max(0.001))
	}
}

pub struct Tracker {
	ie: Ie,
	catalog: Arc<Catalog>,
	config: TrackerConfig,
	slots: SlotBank,
	queue: CycleQueue,
	elixir: ElixirEstimator,
	desk: ReviewDesk,
	history: Vec<PlayEvent>,
}

impl Tracker {
	pub fn new(ie: Ie, catalog: Arc<Catalog>, desk: ReviewDesk, config: TrackerConfig, now: Instant) -> Self {
		let slots = SlotBank::new(&ie.layout().regions);
		Self {
			elixir: ElixirEstimator::new(config.initial_elixir, config.regen_interval(), now),
			ie,
			catalog,
			config,
			slots,
			queue: CycleQueue::new(),
			desk,
			history: Vec::new(),
		}
	}

	pub fn slots(&self) -> &SlotBank {
		&self.slots
	}

	pub fn queue(&self) -> &CycleQueue {
		&self.queue
	}

	pub fn hand(&self) -> HandEstimate {
		self.queue.hand()
	}

	pub fn elixir(&self) -> f32 {
		self.elixir.amount()
	}

	/// Every accepted play so far, in order.
	pub fn history(&self) -> &[PlayEvent] {
		&self.history
	}

	#[cfg(test)]
	pub fn ie(&self) -> &Ie {
		&self.ie
	}

	pub fn open_reviews(&self) -> usize {
		self.desk.open_count()
	}

	/// Switch to double (or normal) elixir.
	pub fn set_regen_interval(&mut self, interval: Duration, now: Instant) {
		self.elixir.set_regen_interval(interval, now);
	}

	/// One iteration on a fresh frame.
	pub fn step(&mut self, frame: Image, now: Instant) -> Vec<TrackerEvent> {
		let mut out = Vec::new();
		let plays = self.history.len();
		let elixir = self.elixir.amount();

		self.elixir.tick(now);
		self.apply_reviews(now, &mut out);
		self.apply_commands(frame, &mut out);
		self.observe(frame, now, &mut out);

		self.summarise(plays, elixir, &mut out);
		out
	}

	/// An iteration without a frame (capture failed). Time and reviews still advance.
	pub fn idle(&mut self, now: Instant) -> Vec<TrackerEvent> {
		let mut out = Vec::new();
		let plays = self.history.len();
		let elixir = self.elixir.amount();

		self.elixir.tick(now);
		self.apply_reviews(now, &mut out);

		self.summarise(plays, elixir, &mut out);
		out
	}

	fn summarise(&self, plays: usize, elixir: f32, out: &mut Vec<TrackerEvent>) {
		if self.history.len() != plays {
			out.push(TrackerEvent::Hand {
				hand: self.queue.hand(),
				phase: self.queue.phase(),
			});
		}
		if self.elixir.amount() != elixir {
			out.push(TrackerEvent::Elixir { amount: self.elixir.amount() });
		}
	}

	fn observe(&mut self, frame: Image, now: Instant, out: &mut Vec<TrackerEvent>) {
		let settle = self.config.identify.settle();
		let regions = self.ie.sample_slots(frame);

		// Slot order is the tie-break for everything that happens in one frame.
		for (index, region) in regions.into_iter().enumerate() {
			let Some(region) = region else {
				continue;
			};
			let reading = self.ie.classify_slot(region);

			let detected = match self.slots.get_mut(index) {
				Some(slot) => slot
					.observe(reading.state, now, self.config.debounce_frames)
					.map(|t| (t, detector::on_transition(slot, t, now))),
				None => continue,
			};

			if let Some((transition, detected)) = detected {
				tracing::debug!(
					slot = index,
					to = %transition.to,
					background = reading.background_fraction,
					saturation = reading.saturation,
					"slot transition"
				);
				out.push(TrackerEvent::Transition { slot: index, from: transition.from, to: transition.to });

				match detected {
					Detected::Nothing | Detected::Settling => {}
					Detected::Play(card) => self.play(index, card, now, Source::Memory, out),
					Detected::Recognized(card) => {
						out.push(TrackerEvent::Recognized { slot: index, card, source: Source::Memory })
					}
					Detected::IdentifyNow => self.identify(index, now, out),
					Detected::RevealWhilePending => {
						out.push(TrackerEvent::Warning(Warning::RevealWhilePending { slot: index }))
					}
				}
			}

			// Only a FULL reading may refresh the snapshot; the card may be leaving.
			let due = match self.slots.get_mut(index) {
				Some(Slot { state: Some(SlotState::Full), identity: Identity::Settling { since, snapshot }, .. })
					if reading.state == SlotState::Full =>
				{
					*snapshot = Some(region.to_owned_image());
					now.saturating_duration_since(*since) >= settle
				}
				_ => false,
			};
			if due {
				self.identify(index, now, out);
			}
		}
	}

	/// Match the settled reveal of `index` against the template library.
	fn identify(&mut self, index: usize, now: Instant, out: &mut Vec<TrackerEvent>) {
		let Some(slot) = self.slots.get_mut(index) else {
			return;
		};
		let Identity::Settling { snapshot, .. } = std::mem::replace(&mut slot.identity, Identity::Unidentified) else {
			return;
		};
		let Some(image) = snapshot else {
			tracing::debug!(slot = index, "reveal left before a full frame was kept");
			return;
		};

		let found = match self.ie.identify(image.as_image()) {
			Ok(found) => found,
			Err(err) => {
				out.push(TrackerEvent::Warning(Warning::IdentificationFailed {
					slot: index,
					error: format!("{err:#}"),
				}));
				None
			}
		};

		match self.config.identify.decide(found) {
			Decision::Accept(m) => match self.slots.bound_to(m.card) {
				Some(bound_to) if bound_to != index => {
					out.push(TrackerEvent::Warning(Warning::DuplicateBinding { slot: index, card: m.card, bound_to }));
					self.request_review(index, None, m.confidence, image, out);
				}
				_ => self.bind(index, m.card, Source::Template, m.confidence, now, out),
			},
			Decision::Review { candidate, confidence } => self.request_review(index, candidate, confidence, image, out),
		}
	}

	fn request_review(
		&mut self,
		index: usize,
		candidate: Option<CardId>,
		confidence: f32,
		image: OwnedImage,
		out: &mut Vec<TrackerEvent>,
	) {
		let token = self.desk.open(index, candidate, confidence, image);
		if let Some(slot) = self.slots.get_mut(index) {
			slot.identity = Identity::PendingReview(token);
			slot.last_confidence = confidence;
		}
		out.push(TrackerEvent::ReviewRequested { slot: index, token, candidate, confidence });
	}

	/// Operator commands need a frame, so they wait in the channel through capture gaps.
	fn apply_commands(&mut self, frame: Image, out: &mut Vec<TrackerEvent>) {
		for command in self.desk.poll_commands() {
			match command {
				OperatorCommand::Calibrate { slot } => {
					match self.ie.sample_slots(frame).get(slot).copied().flatten() {
						Some(region) => {
							let color = self.ie.calibrate_background(region);
							tracing::debug!(slot, %color, "background sampled");
							out.push(TrackerEvent::Calibrated { slot, color });
						}
						None => out.push(TrackerEvent::Warning(Warning::CalibrationFailed { slot })),
					}
				}
			}
		}
	}

	fn apply_reviews(&mut self, now: Instant, out: &mut Vec<TrackerEvent>) {
		for resolution in self.desk.poll() {
			let index = resolution.slot;
			if self.slots.get(index).and_then(Slot::pending_review) != Some(resolution.token) {
				tracing::debug!(slot = index, token = %resolution.token, "stale review answer");
				continue;
			}

			match resolution.verdict {
				review::Verdict::Confirm(card) => {
					if let Some(bound_to) = self.slots.bound_to(card).filter(|&other| other != index) {
						out.push(TrackerEvent::Warning(Warning::DuplicateBinding { slot: index, card, bound_to }));
						self.unresolve(index);
						continue;
					}
					if let Err(err) = self.ie.remember(&self.catalog, card, resolution.image.as_image()) {
						tracing::error!(error = %format!("{err:#}"), slot = index, "failed to add reviewed template");
					}
					self.bind(index, card, Source::Manual, 1.0, now, out);
				}
				review::Verdict::Skip => {
					self.unresolve(index);
					out.push(TrackerEvent::ReviewSkipped { slot: index, token: resolution.token });
				}
			}
		}
	}

	fn unresolve(&mut self, index: usize) {
		if let Some(slot) = self.slots.get_mut(index) {
			slot.identity = Identity::Unresolved;
			slot.revealed_at = None;
			if !slot.missed_reveals.is_empty() {
				tracing::debug!(slot = index, reveals = slot.missed_reveals.len(), "dropping reveals of an unresolved card");
				slot.missed_reveals.clear();
			}
		}
	}

	/// Lock `index` to `card`; the reveal that led here is its play, and so is
	/// every reveal seen while the review was open.
	fn bind(&mut self, index: usize, card: CardId, source: Source, confidence: f32, now: Instant, out: &mut Vec<TrackerEvent>) {
		let Some(slot) = self.slots.get_mut(index) else {
			return;
		};
		slot.lock(card, source, confidence);
		let revealed_at = slot.revealed_at.take();
		let missed = std::mem::take(&mut slot.missed_reveals);

		out.push(TrackerEvent::Discovery { slot: index, card, source, confidence });
		if let Some(at) = revealed_at {
			self.play(index, card, at.min(now), source, out);
		}
		for at in missed {
			self.play(index, card, at.min(now), Source::Memory, out);
		}
	}

	/// Feed one play to the cycle queue and the elixir estimate.
	fn play(&mut self, index: usize, card: CardId, at: Instant, source: Source, out: &mut Vec<TrackerEvent>) {
		let event = PlayEvent { slot: index, card, at, source };
		let rotation = match self.queue.record(card) {
			Ok(rotation) => rotation,
			Err(violation) => {
				out.push(TrackerEvent::Warning(Warning::QueueViolation { slot: index, violation }));
				return;
			}
		};
		tracing::debug!(slot = index, card = self.catalog.name(card), ?rotation, "queue updated");

		self.history.push(event);
		out.push(TrackerEvent::Play(event));

		let cost = self.catalog.cost(card).unwrap_or(0);
		if let Spend::Floored { available } = self.elixir.spend(cost) {
			out.push(TrackerEvent::Warning(Warning::ElixirFloored { card, cost, available }));
		}
	}
}
