//! Play-order model of the opponent deck.
//!
//! The game cycles a fixed 8-card deck: the 4 front cards are the hand, a played
//! card goes to the back and the 5th card moves into the hand. The queue learns
//! the order from plays alone, so until all 8 cards have been played it only
//! holds the ones seen so far.

use data::CardId;

pub const DECK_SIZE: usize = 8;
pub const HAND_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
	/// Fewer than 4 distinct cards played.
	Bootstrapping,
	Steady,
}

/// Plays that would break the queue invariants. The play is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CycleViolation {
	#[error("queue already holds {DECK_SIZE} cards, refusing a new one")]
	DeckFull { card: CardId },
}

/// What a successful play did to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
	/// First play of a card; appended at the tail.
	Discovered,
	/// Known card moved from `from` to the tail.
	Rotated { from: usize },
}

/// The 4 playable cards as far as they are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct HandEstimate<C = CardId> {
	/// `None` for positions whose card has not been seen yet.
	pub cards: [Option<C>; HAND_SIZE],
	/// Set once the whole deck is known.
	pub certain: bool,
}

#[derive(Debug, Clone)]
pub struct CycleQueue {
	order: Vec<CardId>,
	phase: Phase,
}

impl Default for CycleQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl CycleQueue {
	pub fn new() -> Self {
		Self {
			order: Vec::with_capacity(DECK_SIZE),
			phase: Phase::Bootstrapping,
		}
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	/// Cards in rotation order, head first.
	pub fn order(&self) -> &[CardId] {
		&self.order
	}

	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	/// All 8 cards have been played at least once.
	pub fn is_complete(&self) -> bool {
		self.order.len() == DECK_SIZE
	}

	pub fn position(&self, card: CardId) -> Option<usize> {
		self.order.iter().position(|&c| c == card)
	}

	/// Apply one play. On error the queue is unchanged.
	pub fn record(&mut self, card: CardId) -> Result<Rotation, CycleViolation> {
		let rotation = match self.position(card) {
			Some(from) => {
				let card = self.order.remove(from);
				self.order.push(card);
				Rotation::Rotated { from }
			}
			None if self.is_complete() => return Err(CycleViolation::DeckFull { card }),
			None => {
				self.order.push(card);
				Rotation::Discovered
			}
		};

		if self.phase == Phase::Bootstrapping && self.order.len() >= HAND_SIZE {
			self.phase = Phase::Steady;
		}
		Ok(rotation)
	}

	pub fn hand(&self) -> HandEstimate {
		let mut cards = [None; HAND_SIZE];
		for (slot, &card) in cards.iter_mut().zip(&self.order) {
			*slot = Some(card);
		}
		HandEstimate {
			cards,
			certain: self.is_complete(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tracker::testing::deck;

	fn full_queue(cards: &[CardId]) -> CycleQueue {
		let mut queue = CycleQueue::new();
		for &card in cards {
			queue.record(card).unwrap();
		}
		queue
	}

	#[test]
	fn bootstrap_appends_and_turns_steady_on_the_fourth_card() {
		let (_, cards) = deck();
		let [a, b, c, d] = [cards[0], cards[1], cards[2], cards[3]];
		let mut queue = CycleQueue::new();

		assert_eq!(queue.record(a), Ok(Rotation::Discovered));
		assert_eq!(queue.record(b), Ok(Rotation::Discovered));
		assert_eq!(queue.record(c), Ok(Rotation::Discovered));
		assert_eq!(queue.phase(), Phase::Bootstrapping);
		assert_eq!(queue.hand().cards, [Some(a), Some(b), Some(c), None]);

		queue.record(d).unwrap();
		assert_eq!(queue.phase(), Phase::Steady);
		assert_eq!(queue.order(), &[a, b, c, d]);

		let hand = queue.hand();
		assert_eq!(hand.cards, [Some(a), Some(b), Some(c), Some(d)]);
		assert!(!hand.certain);
	}

	#[test]
	fn replaying_a_card_during_bootstrap_is_not_a_new_card() {
		let (_, cards) = deck();
		let mut queue = full_queue(&cards[..3]);
		assert_eq!(queue.record(cards[0]), Ok(Rotation::Rotated { from: 0 }));
		assert_eq!(queue.len(), 3);
		assert_eq!(queue.phase(), Phase::Bootstrapping);
		assert_eq!(queue.order(), &[cards[1], cards[2], cards[0]]);
	}

	#[test]
	fn steady_play_moves_the_card_to_the_tail() {
		let (_, cards) = deck();
		let mut queue = full_queue(&cards);
		assert!(queue.hand().certain);

		assert_eq!(queue.record(cards[0]), Ok(Rotation::Rotated { from: 0 }));
		let mut expected = cards[1..].to_vec();
		expected.push(cards[0]);
		assert_eq!(queue.order(), expected.as_slice());
		assert_eq!(queue.hand().cards, [Some(cards[1]), Some(cards[2]), Some(cards[3]), Some(cards[4])]);
	}

	#[test]
	fn playing_from_the_middle_keeps_relative_order() {
		let (_, cards) = deck();
		let mut queue = full_queue(&cards);
		queue.record(cards[2]).unwrap();

		let mut expected = cards.clone();
		let card = expected.remove(2);
		expected.push(card);
		assert_eq!(queue.order(), expected.as_slice());
	}

	#[test]
	fn eight_head_plays_restore_the_order() {
		let (_, cards) = deck();
		let mut queue = full_queue(&cards);
		let original = queue.order().to_vec();

		for _ in 0..DECK_SIZE {
			let head = queue.order()[0];
			queue.record(head).unwrap();
			assert_eq!(queue.len(), DECK_SIZE);
		}
		assert_eq!(queue.order(), original.as_slice());
	}

	#[test]
	fn queue_never_holds_duplicates_or_more_than_eight() {
		let (catalog, cards) = deck();
		let mut queue = CycleQueue::new();
		// Arbitrary interleaving of repeats and new cards.
		for i in [0, 1, 0, 2, 2, 3, 1, 4, 5, 0, 6, 7, 3, 3, 5] {
			queue.record(cards[i]).unwrap();
			let unique = queue.order().iter().collect::<std::collections::HashSet<_>>();
			assert_eq!(unique.len(), queue.len());
			assert!(queue.len() <= DECK_SIZE);
		}
		assert!(queue.is_complete());

		let stranger = catalog.find("Mega Knight").unwrap();
		let before = queue.order().to_vec();
		assert_eq!(queue.record(stranger), Err(CycleViolation::DeckFull { card: stranger }));
		assert_eq!(queue.order(), before.as_slice());
	}
}
