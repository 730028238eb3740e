use std::collections::HashMap;

/// Interned card name. Cheap to copy, stable for the lifetime of the [`IdManager`] that produced it.
pub type CardId = lasso::Spur;

pub struct IdManager {
	strings: lasso::Rodeo,

	// normalized lookup key -> display name
	map_key_name: HashMap<String, CardId>,
}

impl Default for IdManager {
	fn default() -> Self {
		Self::new()
	}
}

impl IdManager {
	pub fn new() -> Self {
		Self {
			strings: lasso::Rodeo::new(),

			map_key_name: HashMap::new(),
		}
	}

	/// Interns a display name and registers its lookup key.
	///
	/// Returns the existing id if a name with the same key was already added.
	pub fn add_name(&mut self, name: impl Into<String>) -> CardId {
		let name = name.into();
		let key = lookup_key(&name);
		if let Some(id) = self.map_key_name.get(&key) {
			return *id;
		}

		let id = self.strings.get_or_intern(name);
		self.map_key_name.insert(key, id);
		id
	}

	pub fn get_id(&self, name: &str) -> Option<CardId> {
		self.map_key_name.get(&lookup_key(name)).copied()
	}

	pub fn get_name(&self, id: CardId) -> Option<&str> {
		self.strings.try_resolve(&id)
	}

	/// Closest registered name by Levenshtein distance over lookup keys.
	pub fn get_closest_match(&self, name: &str) -> Option<(CardId, usize)> {
		let check_key = lookup_key(name);
		if let Some(id) = self.map_key_name.get(&check_key) {
			return Some((*id, 0));
		}

		let mut min = None;
		for (key, id) in self.map_key_name.iter() {
			let lev = levenshtein::levenshtein(&check_key, key);
			match min {
				Some((_, best)) if best <= lev => {}
				_ => min = Some((*id, lev)),
			}
		}

		min
	}

	pub fn len(&self) -> usize {
		self.map_key_name.len()
	}

	pub fn is_empty(&self) -> bool {
		self.map_key_name.is_empty()
	}
}

/// Normalizes a card name for lookups: "Mini P.E.K.K.A" and "mini-pekka" share a key.
pub fn lookup_key(name: &str) -> String {
	name
		.chars()
		.filter(|c| c.is_alphanumeric())
		.flat_map(|c| c.to_lowercase())
		.collect()
}
