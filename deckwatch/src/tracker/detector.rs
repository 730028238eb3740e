//! Turns debounced slot transitions into plays.
//!
//! A reveal (EMPTY -> FULL) of a slot that does not know its card is a
//! discovery: the play is emitted once identification resolves it. For a
//! locked slot the card leaving (FULL -> EMPTY) is the play, unless the same
//! reveal was already counted by its discovery.

use std::time::Instant;

use data::CardId;
use ie::SlotState;

use super::slot::{Identity, Slot, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detected {
	Nothing,
	/// A locked slot's card left: a play known from memory.
	Play(CardId),
	/// A locked slot was revealed; no identification needed.
	Recognized(CardId),
	/// Identification is scheduled once the reveal settles.
	Settling,
	/// The card left before the settle delay; identify from the last FULL image now.
	IdentifyNow,
	/// Revealed while the previous reveal is still under review.
	RevealWhilePending,
}

pub fn on_transition(slot: &mut Slot, transition: Transition, now: Instant) -> Detected {
	match transition.to {
		SlotState::Full => {
			let revealed_at = transition.from.map(|_| now);
			match slot.identity {
				Identity::Locked(_) => {
					slot.reveal_counted = false;
					slot.revealed_at = revealed_at;
					slot.known_card.map_or(Detected::Nothing, Detected::Recognized)
				}
				Identity::PendingReview(_) => {
					slot.missed_reveals.extend(revealed_at);
					Detected::RevealWhilePending
				}
				Identity::Unidentified | Identity::Unresolved | Identity::Settling { .. } => {
					slot.revealed_at = revealed_at;
					slot.identity = Identity::Settling { since: now, snapshot: None };
					Detected::Settling
				}
			}
		}
		SlotState::Empty => match slot.identity {
			Identity::Locked(_) => {
				let counted = std::mem::take(&mut slot.reveal_counted);
				match slot.known_card {
					Some(card) if !counted && transition.from == Some(SlotState::Full) => Detected::Play(card),
					_ => Detected::Nothing,
				}
			}
			Identity::Settling { .. } => Detected::IdentifyNow,
			_ => Detected::Nothing,
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tracker::event::Source;
	use ie::Region;

	use SlotState::{Empty, Full};

	fn slot() -> Slot {
		Slot::new(2, Region::new(0, 0, 10, 10))
	}

	fn go(slot: &mut Slot, from: Option<SlotState>, to: SlotState) -> Detected {
		slot.state = Some(to);
		on_transition(slot, Transition { from, to }, Instant::now())
	}

	#[test]
	fn reveal_of_unknown_slot_schedules_identification() {
		let mut slot = slot();
		assert_eq!(go(&mut slot, Some(Empty), Full), Detected::Settling);
		assert!(matches!(slot.identity, Identity::Settling { .. }));
		assert!(slot.revealed_at.is_some());

		assert_eq!(go(&mut slot, Some(Full), Empty), Detected::IdentifyNow);
	}

	#[test]
	fn discovered_reveal_is_not_counted_twice() {
		let (_, cards) = crate::tracker::testing::deck();
		let mut slot = slot();
		go(&mut slot, Some(Empty), Full);
		slot.lock(cards[0], Source::Template, 0.9);

		// Same reveal ends: its play came from the discovery.
		assert_eq!(go(&mut slot, Some(Full), Empty), Detected::Nothing);
		// Next cycle is pure memory.
		assert_eq!(go(&mut slot, Some(Empty), Full), Detected::Recognized(cards[0]));
		assert_eq!(go(&mut slot, Some(Full), Empty), Detected::Play(cards[0]));
	}

	#[test]
	fn card_present_at_startup_plays_when_it_leaves() {
		let (_, cards) = crate::tracker::testing::deck();
		let mut slot = slot();
		assert_eq!(go(&mut slot, None, Full), Detected::Settling);
		assert!(slot.revealed_at.is_none());
		slot.lock(cards[4], Source::Template, 0.9);
		assert_eq!(go(&mut slot, Some(Full), Empty), Detected::Play(cards[4]));
	}

	#[test]
	fn pending_slot_is_not_rescheduled() {
		let mut slot = slot();
		let (mut desk, _link) = crate::tracker::review::ReviewDesk::channel();
		slot.identity = Identity::PendingReview(desk.open(2, None, 0.0, ie::OwnedImage::filled(1, 1, ie::Color::BLACK)));
		assert_eq!(go(&mut slot, Some(Full), Empty), Detected::Nothing);
		assert_eq!(go(&mut slot, Some(Empty), Full), Detected::RevealWhilePending);
		assert!(slot.pending_review().is_some());
		assert_eq!(slot.missed_reveals.len(), 1);
	}
}
