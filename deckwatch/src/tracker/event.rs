use std::time::Instant;

use data::CardId;
use ie::{Color, SlotState};
use serde::{Serializer, ser::SerializeMap};

use super::{
	cycle::{CycleViolation, HandEstimate, Phase},
	review::ReviewToken,
};

/// How the card of a play was known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
	/// Auto-accepted template match.
	Template,
	/// Slot already bound to the card.
	Memory,
	/// Confirmed by the operator.
	Manual,
}

impl std::fmt::Display for Source {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Template => write!(f, "TEMPLATE"),
			Self::Memory => write!(f, "MEMORY"),
			Self::Manual => write!(f, "MANUAL"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PlayEvent<C = CardId> {
	pub slot: usize,
	pub card: C,
	#[serde(skip)]
	pub at: Instant,
	pub source: Source,
}

/// Conditions worth surfacing that do not stop tracking.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Warning {
	#[error("dropped play of slot {slot}: {violation}")]
	QueueViolation { slot: usize, violation: CycleViolation },
	#[error("elixir estimate floored at 0 (was {available:.1}, card costs {cost})")]
	ElixirFloored { card: CardId, cost: u8, available: f32 },
	#[error("slot {slot} cannot take a card already bound to slot {bound_to}")]
	DuplicateBinding { slot: usize, card: CardId, bound_to: usize },
	#[error("identification of slot {slot} failed: {error}")]
	IdentificationFailed { slot: usize, error: String },
	#[error("slot {slot} was revealed again while its review is still open; the play is counted once it is answered")]
	RevealWhilePending { slot: usize },
	#[error("cannot calibrate slot {slot}: it is not inside the frame")]
	CalibrationFailed { slot: usize },
}

fn warning_message<S: Serializer>(warning: &Warning, serializer: S) -> Result<S::Ok, S::Error> {
	let mut map = serializer.serialize_map(Some(1))?;
	map.serialize_entry("message", &warning.to_string())?;
	map.end()
}

fn hex<S: Serializer>(color: &Color, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.collect_str(color)
}

/// Everything the tracker reports, in the order it happened within an iteration.
///
/// `C` is how cards are written; the tracker uses [`CardId`], output uses
/// catalog names through [`TrackerEvent::map_cards`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackerEvent<C = CardId> {
	/// A debounced EMPTY/FULL change (`from` is `None` for the first accepted state).
	Transition { slot: usize, from: Option<SlotState>, to: SlotState },
	/// A locked slot was revealed; its card comes from memory without matching.
	Recognized { slot: usize, card: C, source: Source },
	/// A slot got its card.
	Discovery { slot: usize, card: C, source: Source, confidence: f32 },
	ReviewRequested { slot: usize, token: ReviewToken, candidate: Option<C>, confidence: f32 },
	ReviewSkipped { slot: usize, token: ReviewToken },
	Play(PlayEvent<C>),
	Hand { hand: HandEstimate<C>, phase: Phase },
	Elixir { amount: f32 },
	/// The operator marked a slot as empty; its colour joined the background palette.
	Calibrated {
		slot: usize,
		#[serde(serialize_with = "hex")]
		color: Color,
	},
	Warning(#[serde(serialize_with = "warning_message")] Warning),
	CaptureFailed { attempt: u32, error: String },
}

impl TrackerEvent {
	/// The same event with every card replaced by `f(card)`.
	pub fn map_cards<D>(&self, f: impl Fn(CardId) -> D) -> TrackerEvent<D> {
		match self {
			Self::Transition { slot, from, to } => TrackerEvent::Transition { slot: *slot, from: *from, to: *to },
			Self::Recognized { slot, card, source } => {
				TrackerEvent::Recognized { slot: *slot, card: f(*card), source: *source }
			}
			Self::Discovery { slot, card, source, confidence } => TrackerEvent::Discovery {
				slot: *slot,
				card: f(*card),
				source: *source,
				confidence: *confidence,
			},
			Self::ReviewRequested { slot, token, candidate, confidence } => TrackerEvent::ReviewRequested {
				slot: *slot,
				token: *token,
				candidate: candidate.map(&f),
				confidence: *confidence,
			},
			Self::ReviewSkipped { slot, token } => TrackerEvent::ReviewSkipped { slot: *slot, token: *token },
			Self::Play(play) => TrackerEvent::Play(PlayEvent {
				slot: play.slot,
				card: f(play.card),
				at: play.at,
				source: play.source,
			}),
			Self::Hand { hand, phase } => TrackerEvent::Hand {
				hand: HandEstimate { cards: hand.cards.map(|c| c.map(&f)), certain: hand.certain },
				phase: *phase,
			},
			Self::Elixir { amount } => TrackerEvent::Elixir { amount: *amount },
			Self::Calibrated { slot, color } => TrackerEvent::Calibrated { slot: *slot, color: *color },
			Self::Warning(warning) => TrackerEvent::Warning(warning.clone()),
			Self::CaptureFailed { attempt, error } => {
				TrackerEvent::CaptureFailed { attempt: *attempt, error: error.clone() }
			}
		}
	}
}
