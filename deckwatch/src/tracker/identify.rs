use std::time::Duration;

use data::CardId;
use ie::Match;

/// Template matching policy. Higher `high_threshold` means fewer wrong
/// auto-accepts and more reviews.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct IdentifyConfig {
	/// Matches at or above this confidence lock the slot without review.
	pub high_threshold: f32,
	/// Matches below this are not offered to the operator as a candidate.
	pub floor: f32,
	/// Seconds a slot must stay FULL before it is matched (reveal animation).
	pub settle_s: f32,
	/// Gaussian blur applied to slot images and templates before correlation.
	pub blur_sigma: f32,
}

impl Default for IdentifyConfig {
	fn default() -> Self {
		Self {
			high_threshold: 0.75,
			floor: 0.35,
			settle_s: 1.5,
			blur_sigma: 1.0,
		}
	}
}

impl IdentifyConfig {
	pub fn settle(&self) -> Duration {
		crate::config::seconds(self.settle_s)
	}

	pub fn decide(&self, found: Option<Match>) -> Decision {
		match found {
			Some(m) if m.confidence >= self.high_threshold => Decision::Accept(m),
			Some(m) if m.confidence >= self.floor => Decision::Review { candidate: Some(m.card), confidence: m.confidence },
			Some(m) => Decision::Review { candidate: None, confidence: m.confidence },
			None => Decision::Review { candidate: None, confidence: 0.0 },
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
	Accept(Match),
	/// Ambiguous (`candidate` set) or unresolved (`candidate` is `None`, slot shown as UNKNOWN).
	Review { candidate: Option<CardId>, confidence: f32 },
}
