use std::sync::LazyLock;

use regex::Regex;

/// One entry of `cards.json`.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CardEntry {
	pub name: String,
	#[serde(alias = "elixirCost")]
	pub elixir: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
	pub id: crate::CardId,
	pub name: String,
	pub elixir: u8,
}

pub const MIN_ELIXIR_COST: u8 = 1;
pub const MAX_ELIXIR_COST: u8 = 10;

static FILE_SUFFIX_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)_(?:medium|evolutionmedium|\d+)$").unwrap());

static EVOLUTION_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)[_\-\s]*(?:evolution|evo)(?:medium)?[_\-\s]*").unwrap());

/// Card name parsed from a template file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateName {
	/// Title-cased base name ("Hog Rider").
	pub name: String,
	pub evolution: bool,
}

impl TemplateName {
	/// Parses stems produced by the template pipeline and by the template store:
	/// `hog-rider_medium`, `barbarians_evolutionMedium`, `knight_1699999999`.
	pub fn parse(stem: &str) -> Option<Self> {
		let evolution = EVOLUTION_REGEX.is_match(stem);

		let mut rest = stem.to_string();
		while let Some(m) = FILE_SUFFIX_REGEX.find(&rest) {
			rest.truncate(m.start());
		}
		let rest = EVOLUTION_REGEX.replace_all(&rest, " ");

		let name = rest
			.split(['-', '_', ' '])
			.filter(|word| !word.is_empty())
			.map(title_case)
			.collect::<Vec<_>>()
			.join(" ");
		if name.is_empty() {
			return None;
		}

		Some(Self { name, evolution })
	}

	/// Name including the evolution marker ("Barbarians Evo").
	pub fn full_name(&self) -> String {
		if self.evolution {
			format!("{} Evo", self.name)
		} else {
			self.name.clone()
		}
	}
}

/// File-name friendly form of a card name ("Mini P.E.K.K.A" -> "mini-p.e.k.k.a").
pub fn safe_file_name(name: &str) -> String {
	name
		.trim()
		.to_lowercase()
		.replace([' ', '_'], "-")
		.chars()
		.filter(|c| c.is_alphanumeric() || *c == '-' || *c == '.')
		.collect()
}

fn title_case(word: &str) -> String {
	let mut chars = word.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
		None => String::new(),
	}
}
