use std::{
	collections::HashMap,
	fs::File,
	io::BufReader,
	path::Path,
};

use anyhow::{Context, Result, bail};

mod id;
pub use id::*;
mod structs;
pub use structs::*;

/// Immutable card reference data: names and elixir costs.
pub struct Catalog {
	ids: IdManager,
	cards: HashMap<CardId, Card>,
	// insertion order, for stable listings
	order: Vec<CardId>,
}

impl std::fmt::Debug for Catalog {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Catalog").field("cards", &self.order.len()).finish()
	}
}

impl Catalog {
	/// Load `cards.json` (`[{"name": "Knight", "elixir": 3}, ...]`).
	///
	/// An empty catalog is a configuration error.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let file = File::open(path).with_context(|| format!("Open catalog {}", path.display()))?;
		let reader = BufReader::new(file);
		let entries: Vec<CardEntry> =
			serde_json::from_reader(reader).with_context(|| format!("Parse catalog {}", path.display()))?;

		let catalog = Self::from_entries(entries)?;
		tracing::info!(cards = catalog.len(), path = %path.display(), "loaded card catalog");
		Ok(catalog)
	}

	pub fn from_entries(entries: impl IntoIterator<Item = CardEntry>) -> Result<Self> {
		let mut s = Self {
			ids: IdManager::new(),
			cards: HashMap::new(),
			order: Vec::new(),
		};

		for entry in entries {
			if !(MIN_ELIXIR_COST..=MAX_ELIXIR_COST).contains(&entry.elixir) {
				tracing::warn!(card = %entry.name, elixir = entry.elixir, "skipping card with out of range elixir cost");
				continue;
			}
			if entry.name.trim().is_empty() {
				continue;
			}

			let id = s.ids.add_name(entry.name.trim());
			if s.cards.contains_key(&id) {
				tracing::warn!(card = %entry.name, "duplicate catalog entry ignored");
				continue;
			}
			s.cards.insert(id, Card { id, name: entry.name.trim().to_string(), elixir: entry.elixir });
			s.order.push(id);
		}

		if s.cards.is_empty() {
			bail!("card catalog is empty");
		}
		Ok(s)
	}

	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	pub fn get(&self, id: CardId) -> Option<&Card> {
		self.cards.get(&id)
	}

	pub fn cost(&self, id: CardId) -> Option<u8> {
		self.cards.get(&id).map(|v| v.elixir)
	}

	pub fn name(&self, id: CardId) -> &str {
		self.ids.get_name(id).unwrap_or("?")
	}

	pub fn iter(&self) -> impl Iterator<Item = &Card> {
		self.order.iter().filter_map(|id| self.cards.get(id))
	}

	/// Exact lookup (case and punctuation insensitive).
	///
	/// Evolved variants ("Knight Evo") share the cycle position and cost of
	/// their base card, so they fall back to it when not listed separately.
	pub fn find(&self, name: &str) -> Option<CardId> {
		if let Some(id) = self.ids.get_id(name) {
			return Some(id);
		}

		let trimmed = name.trim();
		let lower = trimmed.to_lowercase();
		for suffix in [" evo", " evolution"] {
			if lower.ends_with(suffix) {
				return trimmed
					.get(..trimmed.len().saturating_sub(suffix.len()))
					.and_then(|base| self.ids.get_id(base));
			}
		}
		None
	}

	/// Resolves a possibly misspelled name typed by the operator.
	///
	/// Returns `None` when the input is too short or the best match is too far
	/// away to be a typo, so a bad answer never silently binds a wrong card.
	pub fn find_closest(&self, name: &str) -> Option<CardId> {
		let name = name.trim();
		if name.len() < 3 {
			return None;
		}
		if let Some(id) = self.find(name) {
			return Some(id);
		}

		let (id, distance) = self.ids.get_closest_match(name)?;
		let best = self.name(id);
		let max_len = lookup_key(name).len().max(lookup_key(best).len());
		if distance > (max_len / 3).max(2) {
			return None;
		}
		Some(id)
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	fn entry(name: &str, elixir: u8) -> CardEntry {
		CardEntry { name: name.into(), elixir }
	}

	fn sample() -> Catalog {
		Catalog::from_entries([
			entry("Knight", 3),
			entry("Hog Rider", 4),
			entry("Mini P.E.K.K.A", 4),
			entry("Fireball", 4),
		])
		.unwrap()
	}

	#[test]
	fn empty_catalog_is_an_error() {
		assert!(Catalog::from_entries(Vec::new()).is_err());
		assert!(Catalog::from_entries([entry("Broken", 0)]).is_err());
	}

	#[test]
	fn out_of_range_costs_are_skipped() {
		let catalog = Catalog::from_entries([entry("Knight", 3), entry("Broken", 11)]).unwrap();
		assert_eq!(catalog.len(), 1);
		assert!(catalog.find("Broken").is_none());
	}

	#[test]
	fn find_handles_case_punctuation_and_evolutions() {
		let catalog = sample();
		let pekka = catalog.find("mini pekka").unwrap();
		assert_eq!(catalog.name(pekka), "Mini P.E.K.K.A");
		assert_eq!(catalog.cost(pekka), Some(4));

		let knight = catalog.find("Knight").unwrap();
		assert_eq!(catalog.find("Knight Evo"), Some(knight));
	}

	#[test]
	fn find_closest_accepts_typos_but_not_noise() {
		let catalog = sample();
		assert_eq!(catalog.find_closest("hog ridr"), catalog.find("Hog Rider"));
		assert_eq!(catalog.find_closest("xyzzy plugh"), None);
		assert_eq!(catalog.find_closest("k"), None);
	}

	#[test]
	fn loads_json_with_api_field_names() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"[{{"name": "Knight", "elixir": 3}}, {{"name": "Arrows", "elixirCost": 3}}]"#).unwrap();

		let catalog = Catalog::load(file.path()).unwrap();
		assert_eq!(catalog.len(), 2);
		assert_eq!(catalog.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), ["Knight", "Arrows"]);
	}
}
