//! Observable output: every tracker event goes to the log, and optionally to
//! stdout as one JSON object per line.

use std::{
	io::Write,
	sync::Arc,
	time::{Duration, Instant},
};

use data::{CardId, Catalog};
use serde_json::Value;

use crate::tracker::{TrackerEvent, Warning};

pub struct Sink {
	catalog: Arc<Catalog>,
	started: Instant,
	json: bool,
}

impl Sink {
	pub fn new(catalog: Arc<Catalog>, started: Instant, json: bool) -> Self {
		Self { catalog, started, json }
	}

	fn name(&self, card: CardId) -> &str {
		self.catalog.name(card)
	}

	fn millis(&self, at: Instant) -> u64 {
		at.saturating_duration_since(self.started).as_millis() as u64
	}

	pub fn emit(&self, events: &[TrackerEvent], now: Instant) {
		for event in events {
			self.log(event);
			if self.json {
				let line = match self.record(event, now) {
					Ok(value) => value.to_string(),
					Err(err) => {
						tracing::warn!(error = %err, "failed to encode event");
						continue;
					}
				};
				let mut stdout = std::io::stdout().lock();
				if let Err(err) = writeln!(stdout, "{line}") {
					tracing::warn!(error = %err, "failed to write event");
				}
			}
		}
	}

	fn log(&self, event: &TrackerEvent) {
		match event {
			TrackerEvent::Transition { slot, from, to } => {
				tracing::debug!(slot, from = ?from, to = %to, "transition")
			}
			TrackerEvent::Recognized { slot, card, source } => {
				tracing::info!(slot, card = self.name(*card), %source, "recognized from memory")
			}
			TrackerEvent::Discovery { slot, card, source, confidence } => {
				tracing::info!(slot, card = self.name(*card), %source, confidence, "slot identified")
			}
			TrackerEvent::ReviewRequested { slot, token, candidate, confidence } => tracing::info!(
				slot,
				%token,
				candidate = candidate.map_or("UNKNOWN", |c| self.name(c)),
				confidence,
				"review requested"
			),
			TrackerEvent::ReviewSkipped { slot, token } => tracing::info!(slot, %token, "review skipped"),
			TrackerEvent::Play(play) => tracing::info!(
				slot = play.slot,
				card = self.name(play.card),
				source = %play.source,
				at_ms = self.millis(play.at),
				"play"
			),
			TrackerEvent::Hand { hand, phase } => tracing::info!(
				hand = %hand_names(&self.catalog, &hand.cards).join(", "),
				certain = hand.certain,
				phase = ?phase,
				"hand"
			),
			TrackerEvent::Elixir { amount } => tracing::info!(elixir = amount, "elixir"),
			TrackerEvent::Calibrated { slot, color } => tracing::info!(
				slot,
				%color,
				"slot calibrated; add this colour to classifier.background.colors to keep it"
			),
			TrackerEvent::Warning(warning) => self.log_warning(warning),
			TrackerEvent::CaptureFailed { attempt, error } => tracing::warn!(attempt, error = %error, "capture failed"),
		}
	}

	fn log_warning(&self, warning: &Warning) {
		match warning {
			Warning::QueueViolation { violation: crate::tracker::CycleViolation::DeckFull { card }, .. }
			| Warning::ElixirFloored { card, .. }
			| Warning::DuplicateBinding { card, .. } => {
				tracing::warn!(card = self.name(*card), "{warning}")
			}
			_ => tracing::warn!("{warning}"),
		}
	}

	/// JSON form of an event with card names in place of ids. `t_ms` is the
	/// time since the tracker started; for plays it is when the card left.
	pub fn record(&self, event: &TrackerEvent, now: Instant) -> serde_json::Result<Value> {
		let t_ms = match event {
			TrackerEvent::Play(play) => self.millis(play.at),
			_ => self.millis(now),
		};
		let mut value = serde_json::to_value(event.map_cards(|card| self.name(card)))?;
		if let Some(fields) = value.as_object_mut() {
			fields.insert("t_ms".into(), t_ms.into());
		}
		Ok(value)
	}
}

/// Keeps the capture thread from spinning the log on a long outage.
pub fn should_log_failure(attempt: u32) -> bool {
	attempt <= 3 || attempt.is_power_of_two()
}

/// Card names for a hand, `?` where the card is not known yet.
pub fn hand_names(catalog: &Catalog, cards: &[Option<CardId>]) -> Vec<String> {
	cards.iter().map(|c| c.map_or("?".to_string(), |c| catalog.name(c).to_string())).collect()
}

/// Human summary printed at shutdown.
pub fn summary(catalog: &Catalog, plays: usize, elapsed: Duration, order: &[CardId]) -> String {
	let order = order.iter().map(|&c| catalog.name(c)).collect::<Vec<_>>().join(" > ");
	format!("{plays} plays in {:.0}s; cycle: {order}", elapsed.as_secs_f32())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	use crate::tracker::{HandEstimate, Phase, PlayEvent, Source, testing::deck};

	#[test]
	fn play_records_carry_names_and_source() {
		let (catalog, cards) = deck();
		let t0 = Instant::now();
		let sink = Sink::new(Arc::new(catalog), t0, true);

		let play = PlayEvent { slot: 3, card: cards[3], at: t0 + Duration::from_millis(1500), source: Source::Manual };
		let value = sink.record(&TrackerEvent::Play(play), t0 + Duration::from_secs(2)).unwrap();
		assert_eq!(value["event"], "play");
		assert_eq!(value["card"], "Hog Rider");
		assert_eq!(value["source"], "MANUAL");
		assert_eq!(value["t_ms"], 1500);
	}

	#[test]
	fn hand_records_show_unknown_placeholders() {
		let (catalog, cards) = deck();
		let t0 = Instant::now();
		let sink = Sink::new(Arc::new(catalog), t0, false);

		let hand = HandEstimate { cards: [Some(cards[0]), Some(cards[1]), None, None], certain: false };
		let value = sink.record(&TrackerEvent::Hand { hand, phase: Phase::Bootstrapping }, t0).unwrap();
		assert_eq!(value["event"], "hand");
		assert_eq!(value["hand"]["cards"], json!(["Knight", "Archers", null, null]));
		assert_eq!(value["hand"]["certain"], false);
		assert_eq!(value["phase"], "BOOTSTRAPPING");
	}

	#[test]
	fn warnings_and_calibration_are_readable() {
		let (catalog, _) = deck();
		let t0 = Instant::now();
		let sink = Sink::new(Arc::new(catalog), t0, true);

		let value = sink
			.record(&TrackerEvent::Warning(Warning::CalibrationFailed { slot: 9 }), t0 + Duration::from_millis(40))
			.unwrap();
		assert_eq!(value["event"], "warning");
		assert_eq!(value["message"], "cannot calibrate slot 9: it is not inside the frame");
		assert_eq!(value["t_ms"], 40);

		let calibrated = TrackerEvent::Calibrated { slot: 2, color: ie::Color::new(0x8c, 0x3c, 0x34) };
		let value = sink.record(&calibrated, t0).unwrap();
		assert_eq!(value["event"], "calibrated");
		assert_eq!(value["color"], "#8c3c34");
	}

	#[test]
	fn failure_logging_thins_out() {
		let logged = (1..=100).filter(|&a| should_log_failure(a)).collect::<Vec<_>>();
		assert_eq!(logged, vec![1, 2, 3, 4, 8, 16, 32, 64]);
	}
}
