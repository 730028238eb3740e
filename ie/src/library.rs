//! Template library and card matching.
//!
//! Every reference image is compared against the slot image at the slot's own
//! size: templates are resized once per region size, converted to blurred
//! grayscale and stored as zero-mean unit vectors, so a match is a single dot
//! product (zero-mean normalized cross-correlation).

use std::{
	collections::{HashMap, HashSet},
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use data::{Catalog, CardId, TemplateName};

use crate::{Image, OwnedImage};

const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TemplateOrigin {
	/// Shipped reference art.
	Reference,
	/// Confirmed by the operator during a run.
	Reviewed,
}

#[derive(Debug, Clone)]
pub struct Template {
	pub card: CardId,
	pub image: OwnedImage,
	pub origin: TemplateOrigin,
	pub path: Option<PathBuf>,
}

/// Best catalog candidate for a slot image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
	pub card: CardId,
	/// Correlation clamped to 0..=1.
	pub confidence: f32,
}

struct Prepared {
	card: CardId,
	vector: Vec<f32>,
}

pub struct TemplateLibrary {
	templates: Vec<Template>,
	// region size -> templates prepared for it, same order as `templates`
	prepared: HashMap<(u32, u32), Vec<Prepared>>,
	blur_sigma: f32,
}

impl TemplateLibrary {
	pub fn new(blur_sigma: f32) -> Self {
		Self {
			templates: Vec::new(),
			prepared: HashMap::new(),
			blur_sigma,
		}
	}

	/// Load every image in `dirs` whose file name resolves to a catalog card.
	///
	/// Missing directories are skipped with a warning; unreadable files and
	/// names not in the catalog are skipped as well.
	pub fn load_dirs(dirs: &[PathBuf], origin: TemplateOrigin, catalog: &Catalog, blur_sigma: f32) -> Result<Self> {
		let mut library = Self::new(blur_sigma);
		for dir in dirs {
			library.load_dir(dir, origin, catalog)?;
		}

		tracing::info!(
			templates = library.len(),
			cards = library.card_count(),
			"template library ready"
		);
		Ok(library)
	}

	pub fn load_dir(&mut self, dir: &Path, origin: TemplateOrigin, catalog: &Catalog) -> Result<usize> {
		if !dir.exists() {
			tracing::warn!(dir = %dir.display(), "template directory not found");
			return Ok(0);
		}

		let mut paths = std::fs::read_dir(dir)
			.with_context(|| format!("read template dir {}", dir.display()))?
			.filter_map(|entry| entry.ok().map(|e| e.path()))
			.filter(|path| {
				path.extension()
					.map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str()))
					.unwrap_or(false)
			})
			.collect::<Vec<_>>();
		// Directory order is platform dependent; keep template order stable.
		paths.sort();

		let mut loaded = 0;
		for path in paths {
			let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
				continue;
			};
			let Some(name) = TemplateName::parse(&stem) else {
				tracing::warn!(file = %path.display(), "unrecognised template file name");
				continue;
			};
			let Some(card) = catalog.find(&name.full_name()) else {
				tracing::debug!(card = %name.full_name(), file = %path.display(), "template card not in catalog");
				continue;
			};

			match OwnedImage::load(&path) {
				Ok(image) => {
					self.templates.push(Template { card, image, origin, path: Some(path) });
					loaded += 1;
				}
				Err(err) => tracing::warn!(error = %err, file = %path.display(), "failed to load template"),
			}
		}

		// Cached preparations were built without these templates.
		self.prepared.clear();
		tracing::debug!(dir = %dir.display(), loaded, "loaded templates");
		Ok(loaded)
	}

	/// Append a template; it participates in the very next match.
	pub fn add(&mut self, template: Template) -> Result<()> {
		for (&(width, height), prepared) in self.prepared.iter_mut() {
			let vector = prepare(&template.image, width, height, self.blur_sigma)?;
			prepared.push(Prepared { card: template.card, vector });
		}
		self.templates.push(template);
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.templates.len()
	}

	pub fn is_empty(&self) -> bool {
		self.templates.is_empty()
	}

	pub fn card_count(&self) -> usize {
		self.templates.iter().map(|t| t.card).collect::<HashSet<_>>().len()
	}

	pub fn templates_for(&self, card: CardId) -> impl Iterator<Item = &Template> {
		self.templates.iter().filter(move |t| t.card == card)
	}

	/// Best matching card for a slot image, or `None` if the library is empty.
	pub fn best_match(&mut self, region: Image) -> Result<Option<Match>> {
		if self.templates.is_empty() || region.is_empty() {
			return Ok(None);
		}

		let (width, height) = (region.width(), region.height());
		let target = prepare(&region.to_owned_image(), width, height, self.blur_sigma)?;
		let prepared = self.prepared_for(width, height)?;

		let mut best: Option<Match> = None;
		for template in prepared {
			let score = correlation(&target, &template.vector);
			match best {
				Some(b) if b.confidence >= score => {}
				_ => best = Some(Match { card: template.card, confidence: score }),
			}
		}

		Ok(best)
	}

	fn prepared_for(&mut self, width: u32, height: u32) -> Result<&[Prepared]> {
		if !self.prepared.contains_key(&(width, height)) {
			let mut prepared = Vec::with_capacity(self.templates.len());
			for template in &self.templates {
				let vector = prepare(&template.image, width, height, self.blur_sigma)?;
				prepared.push(Prepared { card: template.card, vector });
			}
			tracing::debug!(width, height, templates = prepared.len(), "prepared templates for region size");
			self.prepared.insert((width, height), prepared);
		}

		Ok(self.prepared.get(&(width, height)).map(|v| v.as_slice()).unwrap_or(&[]))
	}
}

/// Resize, grayscale, blur, then centre and normalise to a unit vector.
fn prepare(image: &OwnedImage, width: u32, height: u32, blur_sigma: f32) -> Result<Vec<f32>> {
	let resized = image.resized(width, height)?;
	let mut gray = resized.to_gray_image();
	if blur_sigma > 0.0 {
		gray = imageproc::filter::gaussian_blur_f32(&gray, blur_sigma);
	}

	let mut vector = gray.pixels().map(|p| p.0[0] as f32).collect::<Vec<_>>();
	let mean = vector.iter().sum::<f32>() / vector.len().max(1) as f32;
	let mut norm = 0.0f32;
	for v in vector.iter_mut() {
		*v -= mean;
		norm += *v * *v;
	}

	let norm = norm.sqrt();
	if norm > f32::EPSILON {
		for v in vector.iter_mut() {
			*v /= norm;
		}
	}
	Ok(vector)
}

fn correlation(a: &[f32], b: &[f32]) -> f32 {
	let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
	dot.clamp(0.0, 1.0)
}
