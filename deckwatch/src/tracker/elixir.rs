use std::time::{Duration, Instant};

pub const MAX_ELIXIR: f32 = 10.0;

/// Outcome of paying for a play.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Spend {
	Paid,
	/// The estimate was below the cost and was clamped to 0, a sign of drift.
	Floored { available: f32 },
}

/// Best-effort opponent elixir: wall-clock regeneration minus the cost of every play.
#[derive(Debug, Clone)]
pub struct ElixirEstimator {
	amount: f32,
	regen_interval: Duration,
	last_tick: Instant,
}

impl ElixirEstimator {
	pub fn new(initial: f32, regen_interval: Duration, now: Instant) -> Self {
		Self {
			amount: initial.clamp(0.0, MAX_ELIXIR),
			regen_interval: regen_interval.max(Duration::from_millis(1)),
			last_tick: now,
		}
	}

	pub fn amount(&self) -> f32 {
		self.amount
	}

	pub fn regen_interval(&self) -> Duration {
		self.regen_interval
	}

	/// Credit every whole interval elapsed since the last credited one.
	///
	/// Returns whether the amount changed. The partial interval is carried over.
	pub fn tick(&mut self, now: Instant) -> bool {
		let elapsed = now.saturating_duration_since(self.last_tick);
		let whole = (elapsed.as_secs_f64() / self.regen_interval.as_secs_f64()).floor() as u32;
		if whole == 0 {
			return false;
		}

		self.last_tick += self.regen_interval * whole;
		let before = self.amount;
		self.amount = (self.amount + whole as f32).min(MAX_ELIXIR);
		self.amount != before
	}

	pub fn spend(&mut self, cost: u8) -> Spend {
		let cost = cost as f32;
		if cost > self.amount {
			let available = self.amount;
			self.amount = 0.0;
			return Spend::Floored { available };
		}
		self.amount -= cost;
		Spend::Paid
	}

	/// Switch regeneration speed (double elixir), crediting the time spent at the old speed first.
	pub fn set_regen_interval(&mut self, interval: Duration, now: Instant) {
		self.tick(now);
		self.regen_interval = interval.max(Duration::from_millis(1));
	}
}
