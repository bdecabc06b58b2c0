use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Categories a memory can belong to. The set is closed; unknown categories
/// are rejected at the request boundary.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
	Tweet,
	Research,
	Thought,
	Reference,
	Output,
	Quote,
}
impl MemoryType {
	pub const ALL: [Self; 6] =
		[Self::Tweet, Self::Research, Self::Thought, Self::Reference, Self::Output, Self::Quote];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Tweet => "tweet",
			Self::Research => "research",
			Self::Thought => "thought",
			Self::Reference => "reference",
			Self::Output => "output",
			Self::Quote => "quote",
		}
	}
}
impl FromStr for MemoryType {
	type Err = UnknownMemoryType;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"tweet" => Ok(Self::Tweet),
			"research" => Ok(Self::Research),
			"thought" => Ok(Self::Thought),
			"reference" => Ok(Self::Reference),
			"output" => Ok(Self::Output),
			"quote" => Ok(Self::Quote),
			_ => Err(UnknownMemoryType { raw: raw.to_string() }),
		}
	}
}
impl fmt::Display for MemoryType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug)]
pub struct UnknownMemoryType {
	pub raw: String,
}
impl fmt::Display for UnknownMemoryType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Unknown memory type: {:?}.", self.raw)
	}
}
impl std::error::Error for UnknownMemoryType {}

/// Metadata values are a closed scalar set. Nested structures are rejected so
/// the stored payload stays checkable.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
	Bool(bool),
	Number(f64),
	String(String),
}

/// The unit of persistence. The embedding vector lives only in the vector
/// store and is never part of this record.
#[derive(Clone, Debug)]
pub struct MemoryRecord {
	pub id: Uuid,
	pub content: String,
	pub memory_type: MemoryType,
	pub source: String,
	pub tags: Vec<String>,
	pub timestamp: OffsetDateTime,
	pub alignment_score: f32,
	pub matched_aspects: Vec<String>,
	pub agent_id: String,
	pub metadata: BTreeMap<String, MetadataValue>,
}

/// Trims tags, drops empties, and collapses duplicates while keeping
/// first-seen order for display.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let mut out = Vec::new();

	for tag in tags {
		let trimmed = tag.as_ref().trim();

		if trimmed.is_empty() {
			continue;
		}
		if out.iter().any(|existing: &String| existing == trimmed) {
			continue;
		}

		out.push(trimmed.to_string());
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn memory_type_round_trips_through_str() {
		for memory_type in MemoryType::ALL {
			assert_eq!(memory_type.as_str().parse::<MemoryType>().unwrap(), memory_type);
		}
	}

	#[test]
	fn unknown_memory_type_is_rejected() {
		assert!("daydream".parse::<MemoryType>().is_err());
	}

	#[test]
	fn tags_collapse_duplicates_in_first_seen_order() {
		let tags = normalize_tags(["art", " glitch ", "art", "", "batman", "glitch"]);

		assert_eq!(tags, vec!["art", "glitch", "batman"]);
	}
}
