use crate::{EngramService, MemoryItem, ServiceError, ServiceResult};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub memory_type: Option<String>,
	#[serde(default)]
	pub min_alignment: Option<f32>,
	#[serde(default)]
	pub tags: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResponse {
	pub memories: Vec<MemoryItem>,
}

impl EngramService {
	/// Ranked semantic search. Zero matches is a success with an empty
	/// list; store failures degrade to the same.
	pub async fn search(&self, req: SearchRequest) -> ServiceResult<SearchResponse> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "query must be non-empty.".to_string(),
			});
		}

		let limit = req.limit.unwrap_or(self.cfg.memory.default_search_limit);

		if limit < 1 || limit > self.cfg.memory.max_page_limit {
			return Err(ServiceError::InvalidRequest {
				message: format!(
					"limit must be between 1 and {}.",
					self.cfg.memory.max_page_limit
				),
			});
		}

		let filter = self.build_filter(req.memory_type.as_deref(), req.min_alignment, req.tags)?;
		let vector = self.embed_or_zero(query).await;
		let page = self.index.search(vector, limit as u64, &filter).await;
		let memories = page
			.memories
			.into_iter()
			.map(|scored| MemoryItem::from_record(scored.record, Some(scored.similarity)))
			.collect();

		Ok(SearchResponse { memories })
	}
}
