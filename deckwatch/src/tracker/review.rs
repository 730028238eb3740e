//! Manual review as a suspend point.
//!
//! The tracker never waits for the operator: it opens a review (getting a
//! token), sends the request to whoever holds the [`OperatorLink`] and keeps
//! going. Answers are drained once per iteration with [`ReviewDesk::poll`].

use std::{
	collections::HashMap,
	sync::mpsc::{self, Receiver, Sender, TryRecvError},
};

use data::CardId;
use ie::OwnedImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ReviewToken(pub(crate) u64);

impl std::fmt::Display for ReviewToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// What the operator sees.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
	pub token: ReviewToken,
	pub slot: usize,
	/// Best template match, if it cleared the floor.
	pub candidate: Option<CardId>,
	pub confidence: f32,
	pub image: OwnedImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	Confirm(CardId),
	Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewAnswer {
	pub token: ReviewToken,
	pub verdict: Verdict,
}

/// An answered review, matched back to its slot and image.
#[derive(Debug, Clone)]
pub struct Resolution {
	pub token: ReviewToken,
	pub slot: usize,
	pub image: OwnedImage,
	pub verdict: Verdict,
}

/// Operator requests that are not review answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
	/// Treat slot `slot` of the next frame as an empty slot and learn its colour.
	Calibrate { slot: usize },
}

/// Operator side of the review channels.
pub struct OperatorLink {
	pub requests: Receiver<ReviewRequest>,
	pub answers: Sender<ReviewAnswer>,
	pub commands: Sender<OperatorCommand>,
}

struct OpenReview {
	slot: usize,
	image: OwnedImage,
}

pub struct ReviewDesk {
	next_token: u64,
	open: HashMap<ReviewToken, OpenReview>,
	requests: Sender<ReviewRequest>,
	answers: Receiver<ReviewAnswer>,
	commands: Receiver<OperatorCommand>,
	operator_gone: bool,
}

impl ReviewDesk {
	pub fn channel() -> (Self, OperatorLink) {
		let (req_tx, req_rx) = mpsc::channel();
		let (ans_tx, ans_rx) = mpsc::channel();
		let (cmd_tx, cmd_rx) = mpsc::channel();
		let desk = Self {
			next_token: 1,
			open: HashMap::new(),
			requests: req_tx,
			answers: ans_rx,
			commands: cmd_rx,
			operator_gone: false,
		};
		(desk, OperatorLink { requests: req_rx, answers: ans_tx, commands: cmd_tx })
	}

	/// Number of reviews still waiting for an answer.
	pub fn open_count(&self) -> usize {
		self.open.len()
	}

	pub fn open(&mut self, slot: usize, candidate: Option<CardId>, confidence: f32, image: OwnedImage) -> ReviewToken {
		let token = ReviewToken(self.next_token);
		self.next_token += 1;

		let request = ReviewRequest { token, slot, candidate, confidence, image: image.clone() };
		if self.requests.send(request).is_err() && !self.operator_gone {
			self.operator_gone = true;
			tracing::warn!(slot, %token, "operator console is not running; reviews stay open");
		}
		self.open.insert(token, OpenReview { slot, image });
		token
	}

	/// Drain the answers received since the last poll, in arrival order.
	pub fn poll(&mut self) -> Vec<Resolution> {
		let mut resolved = Vec::new();
		loop {
			match self.answers.try_recv() {
				Ok(answer) => match self.open.remove(&answer.token) {
					Some(open) => resolved.push(Resolution {
						token: answer.token,
						slot: open.slot,
						image: open.image,
						verdict: answer.verdict,
					}),
					None => tracing::debug!(token = %answer.token, "answer for a review that is not open"),
				},
				Err(TryRecvError::Empty) => break,
				Err(TryRecvError::Disconnected) => {
					if !self.operator_gone {
						self.operator_gone = true;
						tracing::warn!(open = self.open.len(), "operator console closed");
					}
					break;
				}
			}
		}
		resolved
	}

	/// Drain the operator commands received since the last poll.
	pub fn poll_commands(&mut self) -> Vec<OperatorCommand> {
		self.commands.try_iter().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ie::Color;

	#[test]
	fn answers_come_back_with_their_slot_and_image() {
		let (_, cards) = crate::tracker::testing::deck();
		let (mut desk, link) = ReviewDesk::channel();
		let image = OwnedImage::filled(4, 4, Color::WHITE);

		let first = desk.open(3, Some(cards[0]), 0.6, image.clone());
		let second = desk.open(6, None, 0.1, image.clone());
		assert_ne!(first, second);
		assert_eq!(desk.open_count(), 2);

		let req = link.requests.try_recv().unwrap();
		assert_eq!((req.token, req.slot, req.candidate), (first, 3, Some(cards[0])));

		assert!(desk.poll().is_empty());
		link.answers.send(ReviewAnswer { token: second, verdict: Verdict::Skip }).unwrap();
		link.answers.send(ReviewAnswer { token: first, verdict: Verdict::Confirm(cards[1]) }).unwrap();

		let resolved = desk.poll();
		assert_eq!(resolved.len(), 2);
		assert_eq!((resolved[0].slot, resolved[0].verdict), (6, Verdict::Skip));
		assert_eq!((resolved[1].slot, resolved[1].verdict), (3, Verdict::Confirm(cards[1])));
		assert_eq!(resolved[1].image, image);
		assert_eq!(desk.open_count(), 0);
	}

	#[test]
	fn repeated_answers_are_ignored() {
		let (mut desk, link) = ReviewDesk::channel();
		let token = desk.open(0, None, 0.0, OwnedImage::filled(2, 2, Color::BLACK));
		link.answers.send(ReviewAnswer { token, verdict: Verdict::Skip }).unwrap();
		link.answers.send(ReviewAnswer { token, verdict: Verdict::Skip }).unwrap();
		assert_eq!(desk.poll().len(), 1);
	}

	#[test]
	fn missing_operator_does_not_stop_the_desk() {
		let (mut desk, link) = ReviewDesk::channel();
		drop(link);
		desk.open(1, None, 0.0, OwnedImage::filled(2, 2, Color::BLACK));
		assert_eq!(desk.open_count(), 1);
		assert!(desk.poll().is_empty());
	}
}
