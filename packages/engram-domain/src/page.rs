use serde::{Deserialize, Serialize};

/// Pagination block recomputed per request from the store's live count.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Pagination {
	pub page: u32,
	pub limit: u32,
	pub total: u64,
	pub pages: u64,
}
impl Pagination {
	pub fn new(page: u32, limit: u32, total: u64) -> Self {
		let pages = if limit == 0 { 0 } else { total.div_ceil(limit as u64) };

		Self { page, limit, total, pages }
	}

	pub fn offset(page: u32, limit: u32) -> u64 {
		(page as u64 - 1) * limit as u64
	}
}
