use crate::memory::MemoryType;

/// Conjunction of optional constraints a caller can attach to `list` and
/// `search`. Conditions are translated into the vector store's filter
/// grammar by the storage layer; this type only decides which conditions
/// exist at which degradation level.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryFilter {
	pub memory_type: Option<MemoryType>,
	pub tags: Vec<String>,
	pub min_alignment: Option<f32>,
}
impl MemoryFilter {
	pub fn is_empty(&self) -> bool {
		self.memory_type.is_none() && self.tags.is_empty() && self.min_alignment.is_none()
	}

	fn has_exact_conditions(&self) -> bool {
		self.memory_type.is_some() || !self.tags.is_empty()
	}

	fn has_range_conditions(&self) -> bool {
		self.min_alignment.is_some()
	}

	/// The ordered degradation ladder for this filter. Levels that would
	/// produce the same filter as an earlier one are skipped, so the store
	/// is never asked the same question twice.
	pub fn ladder(&self) -> Vec<FilterLevel> {
		if self.is_empty() {
			return vec![FilterLevel::Unfiltered];
		}
		if !self.has_range_conditions() {
			return vec![FilterLevel::Full, FilterLevel::Unfiltered];
		}
		if !self.has_exact_conditions() {
			return vec![FilterLevel::Full, FilterLevel::Unfiltered];
		}

		vec![FilterLevel::Full, FilterLevel::ExactOnly, FilterLevel::Unfiltered]
	}
}

/// How much of the caller's filter survives at a given ladder step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterLevel {
	/// Every condition the caller asked for.
	Full,
	/// Exact-match conditions only; range conditions dropped.
	ExactOnly,
	/// No filter at all.
	Unfiltered,
}
impl FilterLevel {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Full => "full",
			Self::ExactOnly => "exact_only",
			Self::Unfiltered => "unfiltered",
		}
	}
}

/// Classification of a vector-store error, decided from its message text.
///
/// The store's client surfaces transport and response errors as opaque
/// values without a stable code taxonomy, so the markers below are the
/// closed set this adapter recognizes. Extend the lists here, nowhere else.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreErrorKind {
	/// The filter grammar was rejected; degrading the filter may succeed.
	FilterShape,
	/// Transport-level failure worth retrying at the same filter level.
	Transient,
	/// Anything else.
	Other,
}

const FILTER_SHAPE_MARKERS: [&str; 6] = [
	"invalid argument",
	"bad request",
	"index required",
	"unknown field",
	"wrong input",
	"expected some form of condition",
];

const TRANSIENT_MARKERS: [&str; 10] = [
	"timeout",
	"timed out",
	"deadline",
	"connection",
	"connect error",
	"unavailable",
	"broken pipe",
	"502",
	"503",
	"504",
];

pub fn classify_store_error(message: &str) -> StoreErrorKind {
	let lowered = message.to_lowercase();

	if FILTER_SHAPE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
		return StoreErrorKind::FilterShape;
	}
	if TRANSIENT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
		return StoreErrorKind::Transient;
	}

	StoreErrorKind::Other
}
