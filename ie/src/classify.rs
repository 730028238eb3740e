//! Per-frame EMPTY/FULL decision for a single slot region.
//!
//! The decision is an area test, not a single-pixel test: a slot is EMPTY when
//! the empty-slot background dominates a configurable fraction of the sampled
//! pixels. Partial overlays, glow and anti-aliased edges cover too little area
//! to flip it.

use crate::{BackgroundPalette, Image};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlotState {
	Empty,
	Full,
}

impl std::fmt::Display for SlotState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Empty => write!(f, "EMPTY"),
			Self::Full => write!(f, "FULL"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
	pub background: BackgroundPalette,
	/// Max RGB distance for a pixel to count as background.
	pub color_tolerance: f32,
	/// Fraction (0..=1) of sampled pixels that must be background for EMPTY.
	pub empty_fraction: f32,
	/// Fraction of the region trimmed from each side before sampling.
	pub sample_inset: f32,
	/// Sample every n-th pixel on both axes.
	pub sample_stride: u32,
	/// Regions with a mean HSV saturation (0..=255) below this are EMPTY. `0` disables the check.
	pub min_saturation: f32,
}

impl Default for ClassifierConfig {
	fn default() -> Self {
		Self {
			background: BackgroundPalette::default(),
			color_tolerance: 25.0,
			empty_fraction: 0.6,
			sample_inset: 0.15,
			sample_stride: 2,
			min_saturation: 60.0,
		}
	}
}

/// Raw measurements behind a classification, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
	pub state: SlotState,
	pub background_fraction: f32,
	pub saturation: f32,
}

impl ClassifierConfig {
	pub fn classify(&self, region: Image) -> Reading {
		let sample = region.inset(self.sample_inset);
		let sample = if sample.is_empty() { region } else { sample };

		let background_fraction =
			sample.fraction_near(&self.background.colors, self.color_tolerance, self.sample_stride);
		let saturation = sample.mean_saturation(self.sample_stride);

		let empty = background_fraction >= self.empty_fraction
			|| (self.min_saturation > 0.0 && saturation < self.min_saturation);

		Reading {
			state: if empty { SlotState::Empty } else { SlotState::Full },
			background_fraction,
			saturation,
		}
	}
}
