use std::time::Instant;

use data::CardId;
use ie::{OwnedImage, Region, SLOT_COUNT, SlotState};

use super::{event::Source, review::ReviewToken};

/// Where a slot is on the way to knowing its card.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
	Unidentified,
	/// Revealed; waiting for the reveal animation to finish before matching.
	Settling {
		since: Instant,
		/// Latest FULL image, used if the card leaves before the delay is over.
		snapshot: Option<OwnedImage>,
	},
	/// Waiting on the operator. The slot takes no automatic identification meanwhile.
	PendingReview(ReviewToken),
	/// Review skipped; the next reveal tries again.
	Unresolved,
	Locked(Source),
}

/// A debounced EMPTY/FULL change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
	/// `None` when this is the first accepted state of the slot.
	pub from: Option<SlotState>,
	pub to: SlotState,
}

#[derive(Debug, Clone, Default)]
struct Debounce {
	candidate: Option<SlotState>,
	seen: u32,
}

#[derive(Debug, Clone)]
pub struct Slot {
	pub index: usize,
	pub region: Region,
	/// Accepted state; `None` until the first reading survived the debounce.
	pub state: Option<SlotState>,
	pub known_card: Option<CardId>,
	pub last_confidence: f32,
	pub last_transition_time: Option<Instant>,
	pub identity: Identity,
	/// Start of the current FULL period, if it was seen starting (not already FULL at startup).
	pub(crate) revealed_at: Option<Instant>,
	/// The current FULL period already produced its play.
	pub(crate) reveal_counted: bool,
	/// Reveals seen while a review was open; played once the review binds the slot.
	pub(crate) missed_reveals: Vec<Instant>,
	debounce: Debounce,
}

impl Slot {
	pub fn new(index: usize, region: Region) -> Self {
		Self {
			index,
			region,
			state: None,
			known_card: None,
			last_confidence: 0.0,
			last_transition_time: None,
			identity: Identity::Unidentified,
			revealed_at: None,
			reveal_counted: false,
			missed_reveals: Vec::new(),
			debounce: Debounce::default(),
		}
	}

	pub fn is_locked(&self) -> bool {
		matches!(self.identity, Identity::Locked(_))
	}

	pub fn pending_review(&self) -> Option<ReviewToken> {
		match self.identity {
			Identity::PendingReview(token) => Some(token),
			_ => None,
		}
	}

	/// Feed one raw classification.
	///
	/// A reading that differs from the accepted state has to repeat on
	/// `frames` consecutive calls before it is accepted; any other reading in
	/// between starts the count over.
	pub fn observe(&mut self, raw: SlotState, now: Instant, frames: u32) -> Option<Transition> {
		if self.state == Some(raw) {
			self.debounce = Debounce::default();
			return None;
		}

		if self.debounce.candidate == Some(raw) {
			self.debounce.seen += 1;
		} else {
			self.debounce = Debounce { candidate: Some(raw), seen: 1 };
		}
		if self.debounce.seen < frames.max(1) {
			return None;
		}

		let transition = Transition { from: self.state, to: raw };
		self.state = Some(raw);
		self.last_transition_time = Some(now);
		self.debounce = Debounce::default();
		Some(transition)
	}

	pub(crate) fn lock(&mut self, card: CardId, source: Source, confidence: f32) {
		self.known_card = Some(card);
		self.last_confidence = confidence;
		self.identity = Identity::Locked(source);
		// The reveal on screen is the newest one, and all of them are about to be played.
		self.reveal_counted =
			self.state == Some(SlotState::Full) && (self.revealed_at.is_some() || !self.missed_reveals.is_empty());
	}
}

/// The 8 slots, owned by the tracking loop.
#[derive(Debug, Clone)]
pub struct SlotBank {
	slots: [Slot; SLOT_COUNT],
}

impl SlotBank {
	pub fn new(regions: &[Region]) -> Self {
		Self {
			slots: std::array::from_fn(|i| {
				Slot::new(i, regions.get(i).copied().unwrap_or(Region::new(0, 0, 0, 0)))
			}),
		}
	}

	pub fn get(&self, index: usize) -> Option<&Slot> {
		self.slots.get(index)
	}

	pub fn get_mut(&mut self, index: usize) -> Option<&mut Slot> {
		self.slots.get_mut(index)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Slot> {
		self.slots.iter()
	}

	/// Slot already locked to `card`, if any.
	pub fn bound_to(&self, card: CardId) -> Option<usize> {
		self.slots.iter().find(|s| s.known_card == Some(card)).map(|s| s.index)
	}
}
