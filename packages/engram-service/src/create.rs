use std::collections::BTreeMap;

use time::OffsetDateTime;
use uuid::Uuid;

use engram_domain::memory::{MemoryRecord, MetadataValue, normalize_tags};

use crate::{EngramService, ServiceError, ServiceResult, alignment, parse_memory_type};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateRequest {
	pub content: String,
	#[serde(rename = "type")]
	pub memory_type: String,
	pub source: String,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub metadata: BTreeMap<String, MetadataValue>,
	#[serde(default)]
	pub bypass_alignment_check: bool,
	/// Only honored together with `bypass_alignment_check`; the gated path
	/// always stores the evaluator's score.
	#[serde(default)]
	pub alignment_score: Option<f32>,
	#[serde(default)]
	pub agent_id: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreateResponse {
	Stored { id: Uuid },
	Rejected { score: f32, explanation: String },
}

impl EngramService {
	pub async fn create(&self, req: CreateRequest) -> ServiceResult<CreateResponse> {
		let content = req.content.trim().to_string();

		if content.is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "content must be non-empty.".to_string(),
			});
		}

		let memory_type = parse_memory_type(&req.memory_type)?;
		let evaluation = if req.bypass_alignment_check {
			alignment::AlignmentEvaluation {
				score: req
					.alignment_score
					.unwrap_or(self.cfg.memory.fallback_alignment_score)
					.clamp(0.0, 1.0),
				aspects: Vec::new(),
				explanation: String::new(),
			}
		} else {
			let evaluation = self.evaluate_alignment(&content).await;

			if evaluation.score < self.cfg.memory.min_alignment_score {
				tracing::info!(
					score = evaluation.score,
					threshold = self.cfg.memory.min_alignment_score,
					"Memory rejected below alignment threshold."
				);

				return Ok(CreateResponse::Rejected {
					score: evaluation.score,
					explanation: evaluation.explanation,
				});
			}

			evaluation
		};

		let vector = self.embed_or_zero(&content).await;
		let record = MemoryRecord {
			id: Uuid::new_v4(),
			content,
			memory_type,
			source: req.source,
			tags: normalize_tags(&req.tags),
			timestamp: OffsetDateTime::now_utc(),
			alignment_score: evaluation.score,
			matched_aspects: evaluation.aspects,
			agent_id: req
				.agent_id
				.unwrap_or_else(|| self.cfg.memory.default_agent_id.clone()),
			metadata: req.metadata,
		};

		self.index.upsert(&record, vector).await?;

		Ok(CreateResponse::Stored { id: record.id })
	}
}
