use engram_domain::{filter::MemoryFilter, memory::normalize_tags, page::Pagination};

use crate::{EngramService, MemoryItem, ServiceError, ServiceResult, parse_memory_type};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListRequest {
	pub page: u32,
	pub limit: u32,
	#[serde(default)]
	pub memory_type: Option<String>,
	#[serde(default)]
	pub min_alignment: Option<f32>,
	#[serde(default)]
	pub tags: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListResponse {
	pub memories: Vec<MemoryItem>,
	pub pagination: Pagination,
}

impl EngramService {
	pub async fn list(&self, req: ListRequest) -> ServiceResult<ListResponse> {
		if req.page < 1 {
			return Err(ServiceError::InvalidRequest {
				message: "page must be 1 or greater.".to_string(),
			});
		}
		if req.limit < 1 || req.limit > self.cfg.memory.max_page_limit {
			return Err(ServiceError::InvalidRequest {
				message: format!(
					"limit must be between 1 and {}.",
					self.cfg.memory.max_page_limit
				),
			});
		}

		let filter = self.build_filter(req.memory_type.as_deref(), req.min_alignment, req.tags)?;
		let offset = Pagination::offset(req.page, req.limit);
		let page = self.index.list(req.limit as u64, offset, &filter).await;
		let memories = page
			.memories
			.into_iter()
			.map(|record| MemoryItem::from_record(record, None))
			.collect();

		Ok(ListResponse {
			memories,
			pagination: Pagination::new(req.page, req.limit, page.total),
		})
	}

	pub(crate) fn build_filter(
		&self,
		memory_type: Option<&str>,
		min_alignment: Option<f32>,
		tags: Vec<String>,
	) -> ServiceResult<MemoryFilter> {
		let memory_type = memory_type.map(parse_memory_type).transpose()?;

		if let Some(min_alignment) = min_alignment
			&& !(0.0..=1.0).contains(&min_alignment)
		{
			return Err(ServiceError::InvalidRequest {
				message: "min_alignment must be in the range 0.0-1.0.".to_string(),
			});
		}

		Ok(MemoryFilter { memory_type, tags: normalize_tags(&tags), min_alignment })
	}
}
