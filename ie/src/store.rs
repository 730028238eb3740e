//! Template memory: operator-confirmed slot images are written next to the
//! reference art so later runs (and later matches in this run) recognise them.

use std::{
	path::{Path, PathBuf},
	time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use data::{Catalog, CardId, safe_file_name};

use crate::{Image, Template, TemplateLibrary, TemplateOrigin};

pub struct TemplateStore {
	dir: PathBuf,
}

impl TemplateStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Append a reviewed image to `card`'s templates.
	///
	/// The image always joins the in-memory library. Failing to write it to disk
	/// only loses it for future runs, so that is logged and the in-memory append
	/// still happens; the returned path is `None` in that case.
	pub fn remember(
		&self,
		library: &mut TemplateLibrary,
		catalog: &Catalog,
		card: CardId,
		image: Image,
	) -> Result<Option<PathBuf>> {
		let path = match self.write(catalog.name(card), image) {
			Ok(path) => Some(path),
			Err(err) => {
				tracing::error!(error = %format!("{err:#}"), card = catalog.name(card), "failed to save reviewed template");
				None
			}
		};

		library.add(Template {
			card,
			image: image.to_owned_image(),
			origin: TemplateOrigin::Reviewed,
			path: path.clone(),
		})?;
		tracing::info!(card = catalog.name(card), path = ?path, "remembered reviewed template");
		Ok(path)
	}

	fn write(&self, name: &str, image: Image) -> Result<PathBuf> {
		std::fs::create_dir_all(&self.dir).with_context(|| format!("create {}", self.dir.display()))?;

		let millis = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_millis())
			.unwrap_or_default();
		let mut path = self.dir.join(format!("{}_{millis}.png", safe_file_name(name)));
		// Two reviews of the same card within one millisecond.
		let mut n = 1;
		while path.exists() {
			path = self.dir.join(format!("{}_{millis}{n}.png", safe_file_name(name)));
			n += 1;
		}

		image.save_png(&path).with_context(|| format!("write {}", path.display()))?;
		Ok(path)
	}
}
