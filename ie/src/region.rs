use anyhow::{Result, bail, ensure};

use crate::Image;

/// Number of tracked deck slots on screen.
pub const SLOT_COUNT: usize = 8;

const DEFAULT_CARD_WIDTH: u32 = 61;
const DEFAULT_CARD_HEIGHT: u32 = 90;

/// Axis-aligned rectangle in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Region {
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
}

impl Region {
	pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
		Self { x, y, width, height }
	}

	/// `None` when the edge does not fit in `u32`.
	pub fn right(&self) -> Option<u32> {
		self.x.checked_add(self.width)
	}

	pub fn bottom(&self) -> Option<u32> {
		self.y.checked_add(self.height)
	}

	fn scaled(&self, sx: f32, sy: f32) -> Self {
		Self {
			x: pos(self.x, sx),
			y: pos(self.y, sy),
			width: px(self.width, sx),
			height: px(self.height, sy),
		}
	}
}

#[inline]
fn pos(base: u32, s: f32) -> u32 {
	((base as f32) * s).round() as u32
}

#[inline]
fn px(base: u32, s: f32) -> u32 {
	if base == 0 {
		0
	} else {
		((base as f32) * s).round().max(1.0) as u32
	}
}

/// The 8 slot rectangles produced by calibration, plus the resolution they were calibrated at.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RegionLayout {
	pub reference_width: u32,
	pub reference_height: u32,
	pub regions: Vec<Region>,
}

impl Default for RegionLayout {
	fn default() -> Self {
		// Opponent deck strip on a 1080p capture, slot 0 leftmost.
		Self {
			reference_width: 1920,
			reference_height: 1080,
			regions: (0..SLOT_COUNT as u32)
				.map(|i| Region::new(731 + 65 * i, 58, DEFAULT_CARD_WIDTH, DEFAULT_CARD_HEIGHT))
				.collect(),
		}
	}
}

impl RegionLayout {
	/// Fatal configuration checks: exactly 8 non-empty regions inside the reference frame.
	pub fn validate(&self) -> Result<()> {
		ensure!(
			self.reference_width > 0 && self.reference_height > 0,
			"reference resolution must be non-zero"
		);
		if self.regions.len() != SLOT_COUNT {
			bail!("expected {SLOT_COUNT} slot regions, got {}", self.regions.len());
		}
		for (i, region) in self.regions.iter().enumerate() {
			ensure!(region.width > 0 && region.height > 0, "slot {i} region has zero size");
			ensure!(
				region.right().is_some_and(|r| r <= self.reference_width)
					&& region.bottom().is_some_and(|b| b <= self.reference_height),
				"slot {i} region {region:?} lies outside the {}x{} reference frame",
				self.reference_width,
				self.reference_height
			);
		}
		Ok(())
	}

	/// Regions mapped onto a frame of the given size.
	pub fn scaled_for(&self, width: u32, height: u32) -> Vec<Region> {
		if width == self.reference_width && height == self.reference_height {
			return self.regions.clone();
		}

		let sx = width as f32 / self.reference_width.max(1) as f32;
		let sy = height as f32 / self.reference_height.max(1) as f32;
		self.regions.iter().map(|r| r.scaled(sx, sy)).collect()
	}

	/// Extract the slot views from a frame.
	///
	/// A region that does not fit inside the frame yields `None` for that slot.
	pub fn sample<'a>(&self, frame: Image<'a>) -> [Option<Image<'a>>; SLOT_COUNT] {
		let regions = self.scaled_for(frame.width(), frame.height());
		let mut out = [None; SLOT_COUNT];
		for (slot, region) in regions.iter().enumerate().take(SLOT_COUNT) {
			if region.width == 0
				|| region.height == 0
				|| region.right().is_none_or(|r| r > frame.width())
				|| region.bottom().is_none_or(|b| b > frame.height())
			{
				continue;
			}
			out[slot] = Some(frame.sub_image(region.x, region.y, region.width, region.height));
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Color, OwnedImage};

	#[test]
	fn default_layout_is_valid() {
		RegionLayout::default().validate().unwrap();
	}

	#[test]
	fn validate_rejects_wrong_count_and_empty_regions() {
		let mut layout = RegionLayout::default();
		layout.regions.pop();
		assert!(layout.validate().is_err());

		let mut layout = RegionLayout::default();
		layout.regions[3].width = 0;
		assert!(layout.validate().is_err());
	}

	#[test]
	fn regions_past_the_integer_range_are_rejected() {
		let mut layout = RegionLayout::default();
		layout.regions[5] = Region::new(u32::MAX - 2, 0, 10, 10);
		assert!(layout.validate().is_err());

		let frame = OwnedImage::filled(64, 64, Color::BLACK);
		let slots = layout.sample(frame.as_image());
		assert!(slots[5].is_none());
	}

	#[test]
	fn regions_scale_with_the_frame() {
		let layout = RegionLayout::default();
		let scaled = layout.scaled_for(960, 540);
		assert_eq!(scaled[0], Region::new(366, 29, 31, 45));
	}

	#[test]
	fn sample_reads_the_right_pixels() {
		let mut frame = OwnedImage::filled(1920, 1080, Color::BLACK);
		let r = RegionLayout::default().regions[2];
		frame.fill_rect(r.x, r.y, r.width, r.height, Color::WHITE);

		let views = RegionLayout::default().sample(frame.as_image());
		assert!(views.iter().all(|v| v.is_some()));
		assert_eq!(views[2].unwrap().average_color(), Color::WHITE);
		assert_eq!(views[1].unwrap().average_color(), Color::BLACK);
	}

	#[test]
	fn out_of_frame_regions_are_skipped() {
		let mut layout = RegionLayout::default();
		layout.reference_width = 100;
		layout.reference_height = 100;
		layout.regions = (0..SLOT_COUNT as u32).map(|i| Region::new(i * 10, 0, 10, 10)).collect();
		layout.regions[7] = Region::new(95, 95, 10, 10);

		let frame = OwnedImage::filled(100, 100, Color::WHITE);
		let views = layout.sample(frame.as_image());
		assert!(views[0].is_some());
		assert!(views[7].is_none());
	}
}
