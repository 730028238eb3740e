//! Synthetic deck, frames and a tracker harness for the tracker tests.

use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use data::{CardEntry, CardId, Catalog};
use ie::{
	ClassifierConfig, Color, Ie, OwnedImage, Region, RegionLayout, SLOT_COUNT, Template, TemplateLibrary, TemplateOrigin,
	TemplateStore,
};

use super::{IdentifyConfig, OperatorLink, ReviewDesk, Tracker, TrackerConfig, TrackerEvent};

const CARD_W: u32 = 40;
const CARD_H: u32 = 60;
const PITCH: u32 = 48;
const FRAME_W: u32 = PITCH * SLOT_COUNT as u32;
const FRAME_H: u32 = 64;
const BACKGROUND: Color = Color::new(0x8c, 0x3c, 0x34);
const FRAME_STEP: Duration = Duration::from_millis(100);

/// Catalog of 9 cards; the first 8 ids form the deck.
pub fn deck() -> (Catalog, Vec<CardId>) {
	let catalog = Catalog::from_entries(
		[
			("Knight", 3),
			("Archers", 3),
			("Fireball", 4),
			("Hog Rider", 4),
			("Musketeer", 4),
			("Zap", 2),
			("Skeletons", 1),
			("Giant", 5),
			("Mega Knight", 7),
		]
		.map(|(name, elixir)| CardEntry { name: name.into(), elixir }),
	)
	.unwrap();
	let cards = catalog.iter().take(8).map(|c| c.id).collect();
	(catalog, cards)
}

/// Art seed of the deck card at `index`.
pub fn art_seed(index: usize) -> u32 {
	index as u32 + 1
}

fn draw_art(image: &mut OwnedImage, x0: u32, y0: u32, seed: u32) {
	image.fill_rect(x0, y0, CARD_W, CARD_H, Color::new(30, 60, 90));
	let x = ((seed * 17 % 50) as f32 / 100.0 * CARD_W as f32) as u32;
	let y = ((seed * 29 % 50) as f32 / 100.0 * CARD_H as f32) as u32;
	image.fill_rect(x0 + x, y0 + y, CARD_W / 3, CARD_H / 4, Color::new(240, 220, 40));
	image.fill_rect(
		x0 + CARD_W - x - CARD_W / 4,
		y0 + CARD_H - y - CARD_H / 5,
		CARD_W / 4,
		CARD_H / 5,
		Color::new(200, 30, 30),
	);
}

pub fn card_art(seed: u32) -> OwnedImage {
	let mut image = OwnedImage::filled(CARD_W, CARD_H, BACKGROUND);
	draw_art(&mut image, 0, 0, seed);
	image
}

fn layout() -> RegionLayout {
	RegionLayout {
		reference_width: FRAME_W,
		reference_height: FRAME_H,
		regions: (0..SLOT_COUNT as u32).map(|i| Region::new(i * PITCH + 4, 2, CARD_W, CARD_H)).collect(),
	}
}

/// Fill the whole region of `slot` with one colour.
pub fn paint_slot(image: &mut OwnedImage, slot: usize, color: Color) {
	if let Some(region) = layout().regions.get(slot) {
		image.fill_rect(region.x, region.y, region.width, region.height, color);
	}
}

/// A frame with the given art seeds in the slots and empty background elsewhere.
pub fn frame(shown: &[Option<u32>; SLOT_COUNT]) -> OwnedImage {
	let mut image = OwnedImage::filled(FRAME_W, FRAME_H, BACKGROUND);
	for (region, seed) in layout().regions.iter().zip(shown) {
		if let Some(seed) = seed {
			draw_art(&mut image, region.x, region.y, *seed);
		}
	}
	image
}

pub struct Bench {
	pub tracker: Tracker,
	pub link: OperatorLink,
	pub cards: Vec<CardId>,
	pub now: Instant,
	pub shown: [Option<u32>; SLOT_COUNT],
	store: tempfile::TempDir,
}

impl Bench {
	/// No settle delay, otherwise the defaults.
	pub fn config() -> TrackerConfig {
		TrackerConfig {
			identify: IdentifyConfig { settle_s: 0.0, ..IdentifyConfig::default() },
			..TrackerConfig::default()
		}
	}

	pub fn new(config: TrackerConfig) -> Self {
		Self::with_templates(config, &[])
	}

	/// Tracker whose library has reference art for the deck cards at `indices`.
	pub fn with_templates(config: TrackerConfig, indices: &[usize]) -> Self {
		let (catalog, cards) = deck();
		let store = tempfile::tempdir().unwrap();

		let mut library = TemplateLibrary::new(config.identify.blur_sigma);
		for &i in indices {
			library
				.add(Template {
					card: cards[i],
					image: card_art(art_seed(i)),
					origin: TemplateOrigin::Reference,
					path: None,
				})
				.unwrap();
		}

		let ie = Ie::try_new(layout(), ClassifierConfig::default(), library, TemplateStore::new(store.path())).unwrap();
		let (desk, link) = ReviewDesk::channel();
		let now = Instant::now();
		Self {
			tracker: Tracker::new(ie, Arc::new(catalog), desk, config, now),
			link,
			cards,
			now,
			shown: [None; SLOT_COUNT],
			store,
		}
	}

	/// Show the same slot contents for `frames` consecutive frames.
	pub fn hold(&mut self, shown: &[Option<u32>; SLOT_COUNT], frames: usize) -> Vec<TrackerEvent> {
		self.shown = *shown;
		self.hold_image(&frame(shown), frames)
	}

	pub fn hold_image(&mut self, image: &OwnedImage, frames: usize) -> Vec<TrackerEvent> {
		let mut events = Vec::new();
		for _ in 0..frames {
			self.now += FRAME_STEP;
			events.extend(self.tracker.step(image.as_image(), self.now));
		}
		events
	}

	/// Images written to the template store so far.
	pub fn stored_templates(&self) -> usize {
		std::fs::read_dir(self.store.path()).map(|dir| dir.count()).unwrap_or(0)
	}
}
