use crate::{Color, Image};

/// Colours of an empty deck slot.
///
/// An unplayed slot shows a flat dark-red background whose exact shade varies
/// with the arena and compression; any palette entry within the classifier
/// tolerance counts as background.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct BackgroundPalette {
	pub colors: Vec<Color>,
}

impl Default for BackgroundPalette {
	fn default() -> Self {
		Self {
			colors: vec![
				Color::new(0x92, 0x46, 0x3a),
				Color::new(0x84, 0x3c, 0x32),
				Color::new(0x9c, 0x4c, 0x3c),
				Color::new(0x8c, 0x3c, 0x34),
				Color::new(0x7c, 0x34, 0x2c),
			],
		}
	}
}

impl BackgroundPalette {
	/// Sample a palette entry from a region known to show an empty slot.
	///
	/// Only the centre of the region is averaged so borders and glow do not
	/// skew the colour. Entries closer than `min_distance` to an existing one
	/// are not added twice.
	pub fn sample(&mut self, empty_slot: Image, min_distance: f32) -> Color {
		let center = empty_slot.inset(0.25);
		let color = if center.is_empty() {
			empty_slot.average_color()
		} else {
			center.average_color()
		};

		if !self.colors.iter().any(|c| c.distance(color) < min_distance) {
			tracing::info!(?color, "added empty-slot background colour");
			self.colors.push(color);
		}
		color
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::OwnedImage;

	#[test]
	fn sampling_adds_new_colours_once() {
		let mut palette = BackgroundPalette::default();
		let before = palette.colors.len();

		let slot = OwnedImage::filled(20, 30, Color::new(40, 40, 120));
		palette.sample(slot.as_image(), 10.0);
		palette.sample(slot.as_image(), 10.0);
		assert_eq!(palette.colors.len(), before + 1);

		let known = OwnedImage::filled(20, 30, Color::new(0x92, 0x46, 0x3a));
		palette.sample(known.as_image(), 10.0);
		assert_eq!(palette.colors.len(), before + 1);
	}
}
