use std::{collections::HashMap, time::Duration};

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
		Filter, GetPointsBuilder, PointId, PointStruct, Query, QueryPointsBuilder, Range,
		ScoredPoint, UpsertPointsBuilder, Value, VectorParamsBuilder, point_id::PointIdOptions,
		value::Kind,
	},
};
use serde_json::Value as JsonValue;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::time as tokio_time;
use uuid::Uuid;

use engram_domain::{
	filter::{FilterLevel, MemoryFilter, StoreErrorKind, classify_store_error},
	memory::{MemoryRecord, MetadataValue},
};

use crate::{BoxFuture, Error, Result};

/// A memory plus the similarity score the store ranked it with.
#[derive(Clone, Debug)]
pub struct ScoredMemory {
	pub record: MemoryRecord,
	pub similarity: f32,
}

/// Result of a ranked search. `level` records which rung of the degradation
/// ladder produced the page; `None` means every rung failed and the page is
/// the empty fallback.
#[derive(Debug)]
pub struct SearchPage {
	pub memories: Vec<ScoredMemory>,
	pub level: Option<FilterLevel>,
}

/// Result of a paginated listing. `total` is counted at the same ladder
/// level that served the page, so it is consistent with the filter that
/// actually ran, not necessarily the one requested.
#[derive(Debug)]
pub struct ListPage {
	pub memories: Vec<MemoryRecord>,
	pub total: u64,
	pub level: Option<FilterLevel>,
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
}
impl RetryPolicy {
	pub fn new(cfg: &engram_config::Retry) -> Self {
		Self {
			max_attempts: cfg.max_attempts,
			base_delay: Duration::from_millis(cfg.base_delay_ms),
			max_delay: Duration::from_millis(cfg.max_delay_ms),
		}
	}

	fn delay_for_attempt(&self, attempt: u32) -> Duration {
		let exp = attempt.saturating_sub(1).min(6);

		self.base_delay.saturating_mul(1 << exp).min(self.max_delay)
	}
}

pub struct MemoryIndex {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
	retry: RetryPolicy,
}
impl MemoryIndex {
	pub fn new(cfg: &engram_config::Qdrant, retry: &engram_config::Retry) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			vector_dim: cfg.vector_dim,
			retry: RetryPolicy::new(retry),
		})
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
					VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine),
				),
			)
			.await?;

		Ok(())
	}

	pub async fn upsert(&self, record: &MemoryRecord, vector: Vec<f32>) -> Result<()> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Vector dimension {} does not match configured vector_dim {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let payload = Payload::from(memory_payload_map(record)?);
		let point = PointStruct::new(record.id.to_string(), vector, payload);

		with_retry(&self.retry, "upsert", || {
			let point = point.clone();

			Box::pin(async move {
				let upsert =
					UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true);

				self.client.upsert_points(upsert).await?;

				Ok(())
			})
		})
		.await
	}

	pub async fn search(&self, vector: Vec<f32>, limit: u64, filter: &MemoryFilter) -> SearchPage {
		let outcome = run_ladder(filter, &self.retry, "search", |_, qdrant_filter| {
			let vector = vector.clone();

			Box::pin(async move {
				let mut query = QueryPointsBuilder::new(self.collection.clone())
					.query(Query::new_nearest(vector))
					.limit(limit)
					.with_payload(true);

				if let Some(qdrant_filter) = qdrant_filter {
					query = query.filter(qdrant_filter);
				}

				let response = self.client.query(query).await?;

				Ok(response.result)
			})
		})
		.await;

		match outcome {
			Some((points, level)) =>
				SearchPage { memories: decode_scored(&points), level: Some(level) },
			None => SearchPage { memories: Vec::new(), level: None },
		}
	}

	pub async fn list(&self, limit: u64, offset: u64, filter: &MemoryFilter) -> ListPage {
		let outcome = run_ladder(filter, &self.retry, "list", |_, qdrant_filter| {
			Box::pin(async move {
				let mut query = QueryPointsBuilder::new(self.collection.clone())
					.limit(limit)
					.offset(offset)
					.with_payload(true);

				if let Some(qdrant_filter) = qdrant_filter.clone() {
					query = query.filter(qdrant_filter);
				}

				let response = self.client.query(query).await?;
				let mut count = CountPointsBuilder::new(self.collection.clone()).exact(true);

				if let Some(qdrant_filter) = qdrant_filter {
					count = count.filter(qdrant_filter);
				}

				let total =
					self.client.count(count).await?.result.map(|r| r.count).unwrap_or(0);

				Ok((response.result, total))
			})
		})
		.await;

		match outcome {
			Some(((points, total), level)) => ListPage {
				memories: decode_scored(&points).into_iter().map(|m| m.record).collect(),
				total,
				level: Some(level),
			},
			None => ListPage { memories: Vec::new(), total: 0, level: None },
		}
	}

	pub async fn delete(&self, id: Uuid) -> Result<()> {
		let existing = with_retry(&self.retry, "retrieve", || {
			Box::pin(async move {
				let get = GetPointsBuilder::new(
					self.collection.clone(),
					vec![PointId::from(id.to_string())],
				);
				let response = self.client.get_points(get).await?;

				Ok(response.result)
			})
		})
		.await?;

		if existing.is_empty() {
			return Err(Error::NotFound(format!("Memory {id} not found.")));
		}

		with_retry(&self.retry, "delete", || {
			Box::pin(async move {
				let delete = DeletePointsBuilder::new(self.collection.clone())
					.points(vec![PointId::from(id.to_string())])
					.wait(true);

				self.client.delete_points(delete).await?;

				Ok(())
			})
		})
		.await
	}
}

/// Walks the filter's degradation ladder, retrying transient failures at
/// each rung and stepping down on filter-shape rejections. Returns the first
/// successful value with the rung that produced it, or `None` when every
/// rung failed. Never returns an error: search and list callers see "no
/// matches" instead of transport or grammar failures.
pub(crate) async fn run_ladder<'a, T, F>(
	filter: &MemoryFilter,
	retry: &RetryPolicy,
	op: &'static str,
	mut attempt: F,
) -> Option<(T, FilterLevel)>
where
	F: FnMut(FilterLevel, Option<Filter>) -> BoxFuture<'a, Result<T>>,
{
	for level in filter.ladder() {
		let qdrant_filter = build_filter(filter, level);
		let mut attempt_no = 1_u32;

		loop {
			match attempt(level, qdrant_filter.clone()).await {
				Ok(value) => {
					if level != FilterLevel::Full && !filter.is_empty() {
						tracing::info!(
							op,
							level = level.as_str(),
							"Store call succeeded with a degraded filter."
						);
					}

					return Some((value, level));
				},
				Err(err) => match classify_store_error(&err.to_string()) {
					StoreErrorKind::FilterShape => {
						tracing::warn!(
							op,
							level = level.as_str(),
							error = %err,
							"Store rejected the filter shape. Degrading."
						);

						break;
					},
					kind => {
						if attempt_no >= retry.max_attempts {
							tracing::error!(
								op,
								level = level.as_str(),
								attempts = attempt_no,
								error = %err,
								"Store call failed after retries. Returning empty result."
							);

							return None;
						}

						let delay = retry.delay_for_attempt(attempt_no);

						tracing::warn!(
							op,
							level = level.as_str(),
							attempt = attempt_no,
							kind = ?kind,
							error = %err,
							"Transient store error. Retrying."
						);
						tokio_time::sleep(delay).await;

						attempt_no += 1;
					},
				},
			}
		}
	}

	None
}

async fn with_retry<'a, T, F>(retry: &RetryPolicy, op: &'static str, mut attempt: F) -> Result<T>
where
	F: FnMut() -> BoxFuture<'a, Result<T>>,
{
	let mut attempt_no = 1_u32;

	loop {
		match attempt().await {
			Ok(value) => return Ok(value),
			Err(err) => {
				let transient =
					classify_store_error(&err.to_string()) == StoreErrorKind::Transient;

				if !transient || attempt_no >= retry.max_attempts {
					return Err(err);
				}

				let delay = retry.delay_for_attempt(attempt_no);

				tracing::warn!(
					op,
					attempt = attempt_no,
					error = %err,
					"Transient store error. Retrying."
				);
				tokio_time::sleep(delay).await;

				attempt_no += 1;
			},
		}
	}
}

/// Builds the store filter for one ladder rung. Tag filtering matches the
/// first tag only; the store's keyword match covers any element of the
/// payload's tag array.
pub(crate) fn build_filter(filter: &MemoryFilter, level: FilterLevel) -> Option<Filter> {
	if level == FilterLevel::Unfiltered {
		return None;
	}

	let mut conditions = Vec::new();

	if let Some(memory_type) = filter.memory_type {
		conditions.push(Condition::matches("type", memory_type.as_str().to_string()));
	}
	if let Some(first_tag) = filter.tags.first() {
		conditions.push(Condition::matches("tags", first_tag.clone()));
	}
	if level == FilterLevel::Full
		&& let Some(min_alignment) = filter.min_alignment
	{
		conditions.push(Condition::range(
			"alignment_score",
			Range { gte: Some(min_alignment as f64), ..Default::default() },
		));
	}

	if conditions.is_empty() {
		return None;
	}

	Some(Filter::must(conditions))
}

pub(crate) fn memory_payload_map(record: &MemoryRecord) -> Result<HashMap<String, Value>> {
	let mut map = HashMap::new();

	map.insert("content".to_string(), Value::from(record.content.clone()));
	map.insert("type".to_string(), Value::from(record.memory_type.as_str().to_string()));
	map.insert("source".to_string(), Value::from(record.source.clone()));
	map.insert(
		"timestamp".to_string(),
		Value::from(JsonValue::String(format_timestamp(record.timestamp)?)),
	);
	map.insert("tags".to_string(), Value::from(JsonValue::from(record.tags.clone())));
	map.insert("alignment_score".to_string(), Value::from(record.alignment_score as f64));
	map.insert(
		"matched_aspects".to_string(),
		Value::from(JsonValue::from(record.matched_aspects.clone())),
	);
	map.insert("agent_id".to_string(), Value::from(record.agent_id.clone()));
	map.insert("metadata".to_string(), Value::from(serde_json::to_value(&record.metadata)?));

	Ok(map)
}

fn decode_scored(points: &[ScoredPoint]) -> Vec<ScoredMemory> {
	let mut out = Vec::with_capacity(points.len());

	for point in points {
		let Some(record) = memory_from_parts(point.id.as_ref(), &point.payload) else {
			tracing::warn!(point_id = ?point.id, "Skipping point with undecodable payload.");

			continue;
		};

		out.push(ScoredMemory { record, similarity: point.score });
	}

	out
}

pub(crate) fn memory_from_parts(
	id: Option<&PointId>,
	payload: &HashMap<String, Value>,
) -> Option<MemoryRecord> {
	let id = id.and_then(point_id_to_uuid)?;
	let content = payload_str(payload, "content")?;
	let memory_type = payload_str(payload, "type")?.parse().ok()?;
	let source = payload_str(payload, "source").unwrap_or_default();
	let timestamp =
		OffsetDateTime::parse(&payload_str(payload, "timestamp")?, &Rfc3339).ok()?;
	let alignment_score = payload_f64(payload, "alignment_score")? as f32;
	let agent_id = payload_str(payload, "agent_id").unwrap_or_default();
	let tags = payload_str_list(payload, "tags");
	let matched_aspects = payload_str_list(payload, "matched_aspects");
	let metadata = payload_metadata(payload);

	Some(MemoryRecord {
		id,
		content,
		memory_type,
		source,
		tags,
		timestamp,
		alignment_score,
		matched_aspects,
		agent_id,
		metadata,
	})
}

fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		_ => None,
	}
}

fn payload_f64(payload: &HashMap<String, Value>, key: &str) -> Option<f64> {
	match &payload.get(key)?.kind {
		Some(Kind::DoubleValue(value)) => Some(*value),
		Some(Kind::IntegerValue(value)) => Some(*value as f64),
		_ => None,
	}
}

fn payload_str_list(payload: &HashMap<String, Value>, key: &str) -> Vec<String> {
	let Some(value) = payload.get(key) else {
		return Vec::new();
	};
	let Some(Kind::ListValue(list)) = &value.kind else {
		return Vec::new();
	};

	list.values
		.iter()
		.filter_map(|item| match &item.kind {
			Some(Kind::StringValue(text)) => Some(text.clone()),
			_ => None,
		})
		.collect()
}

fn payload_metadata(
	payload: &HashMap<String, Value>,
) -> std::collections::BTreeMap<String, MetadataValue> {
	let mut out = std::collections::BTreeMap::new();
	let Some(value) = payload.get("metadata") else {
		return out;
	};
	let Some(Kind::StructValue(fields)) = &value.kind else {
		return out;
	};

	for (key, value) in &fields.fields {
		let decoded = match &value.kind {
			Some(Kind::StringValue(text)) => MetadataValue::String(text.clone()),
			Some(Kind::DoubleValue(number)) => MetadataValue::Number(*number),
			Some(Kind::IntegerValue(number)) => MetadataValue::Number(*number as f64),
			Some(Kind::BoolValue(flag)) => MetadataValue::Bool(*flag),
			_ => continue,
		};

		out.insert(key.clone(), decoded);
	}

	out
}

fn format_timestamp(ts: OffsetDateTime) -> Result<String> {
	ts.format(&Rfc3339).map_err(|_| Error::Message("Failed to format timestamp.".to_string()))
}
