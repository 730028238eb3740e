mod image;
pub use image::*;
mod background;
pub use background::*;
mod classify;
pub use classify::*;
mod region;
pub use region::*;
mod library;
pub use library::*;
mod store;
pub use store::*;

use std::path::PathBuf;

/// Image engine: everything the tracker needs to read deck slots from a frame.
pub struct Ie {
	layout: RegionLayout,
	classifier: ClassifierConfig,
	library: TemplateLibrary,
	store: TemplateStore,
}

impl Ie {
	/// Fails on an invalid region layout (wrong slot count, empty regions).
	pub fn try_new(
		layout: RegionLayout,
		classifier: ClassifierConfig,
		library: TemplateLibrary,
		store: TemplateStore,
	) -> anyhow::Result<Self> {
		layout.validate()?;
		Ok(Self {
			layout,
			classifier,
			library,
			store,
		})
	}

	pub fn layout(&self) -> &RegionLayout {
		&self.layout
	}

	pub fn library(&self) -> &TemplateLibrary {
		&self.library
	}

	/// Borrow the 8 slot regions of a frame; `None` for regions outside it.
	pub fn sample_slots<'a>(&self, frame: Image<'a>) -> [Option<Image<'a>>; SLOT_COUNT] {
		self.layout.sample(frame)
	}

	pub fn classify_slot(&self, region: Image) -> Reading {
		self.classifier.classify(region)
	}

	pub fn identify(&mut self, region: Image) -> anyhow::Result<Option<Match>> {
		self.library.best_match(region)
	}

	/// Learn the colour of a region the operator says shows an empty slot.
	pub fn calibrate_background(&mut self, empty_slot: Image) -> Color {
		let min_distance = self.classifier.color_tolerance / 2.0;
		self.classifier.background.sample(empty_slot, min_distance)
	}

	/// Template memory write path for operator-confirmed cards.
	pub fn remember(&mut self, catalog: &data::Catalog, card: data::CardId, image: Image) -> anyhow::Result<Option<PathBuf>> {
		self.store.remember(&mut self.library, catalog, card, image)
	}
}
