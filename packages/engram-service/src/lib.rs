pub mod alignment;
pub mod create;
pub mod delete;
pub mod list;
pub mod persona;
pub mod processor;
pub mod research;
pub mod search;
pub mod time_serde;

use std::{collections::BTreeMap, future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

pub use alignment::AlignmentEvaluation;
pub use create::{CreateRequest, CreateResponse};
pub use delete::{DeleteRequest, DeleteResponse};
use engram_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use engram_domain::memory::{MemoryRecord, MemoryType, MetadataValue};
use engram_providers::{alignment as alignment_provider, embedding, research as research_provider};
use engram_storage::{db::Db, qdrant::MemoryIndex};
pub use list::{ListRequest, ListResponse};
pub use persona::PersonaCache;
pub use processor::{BatchReport, ProcessRequest, TweetOutcome};
pub use search::{SearchRequest, SearchResponse};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait AlignmentProvider
where
	Self: Send + Sync,
{
	fn evaluate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>>;
}

pub trait ResearchProvider
where
	Self: Send + Sync,
{
	fn query<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		question: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

#[derive(Debug)]
pub enum ServiceError {
	InvalidRequest { message: String },
	NotFound { message: String },
	Provider { message: String },
	Storage { message: String },
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub alignment: Arc<dyn AlignmentProvider>,
	pub research: Arc<dyn ResearchProvider>,
}

pub struct EngramService {
	pub cfg: Config,
	pub db: Db,
	pub index: MemoryIndex,
	pub providers: Providers,
	pub persona: PersonaCache,
}

/// A memory as returned to callers. `similarity_score` is present only on
/// ranked search results.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MemoryItem {
	pub id: uuid::Uuid,
	pub content: String,
	#[serde(rename = "type")]
	pub memory_type: MemoryType,
	pub source: String,
	pub tags: Vec<String>,
	#[serde(with = "crate::time_serde")]
	pub timestamp: time::OffsetDateTime,
	pub alignment_score: f32,
	pub matched_aspects: Vec<String>,
	pub agent_id: String,
	pub metadata: BTreeMap<String, MetadataValue>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub similarity_score: Option<f32>,
}
impl MemoryItem {
	pub(crate) fn from_record(record: MemoryRecord, similarity_score: Option<f32>) -> Self {
		Self {
			id: record.id,
			content: record.content,
			memory_type: record.memory_type,
			source: record.source,
			tags: record.tags,
			timestamp: record.timestamp,
			alignment_score: record.alignment_score,
			matched_aspects: record.matched_aspects,
			agent_id: record.agent_id,
			metadata: record.metadata,
			similarity_score,
		}
	}
}

struct DefaultProviders;

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::NotFound { message } => write!(f, "Not found: {message}"),
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::Storage { message } => write!(f, "Storage error: {message}"),
		}
	}
}

impl std::error::Error for ServiceError {}

impl From<engram_storage::Error> for ServiceError {
	fn from(err: engram_storage::Error) -> Self {
		match err {
			engram_storage::Error::NotFound(message) => Self::NotFound { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl AlignmentProvider for DefaultProviders {
	fn evaluate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(alignment_provider::evaluate(cfg, messages))
	}
}

impl ResearchProvider for DefaultProviders {
	fn query<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		question: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(research_provider::query(cfg, question))
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		alignment: Arc<dyn AlignmentProvider>,
		research: Arc<dyn ResearchProvider>,
	) -> Self {
		Self { embedding, alignment, research }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), alignment: provider.clone(), research: provider }
	}
}

impl EngramService {
	pub fn new(cfg: Config, db: Db, index: MemoryIndex) -> Self {
		Self { cfg, db, index, providers: Providers::default(), persona: PersonaCache::new() }
	}

	pub fn with_providers(cfg: Config, db: Db, index: MemoryIndex, providers: Providers) -> Self {
		Self { cfg, db, index, providers, persona: PersonaCache::new() }
	}

	/// Embeds one text, degrading to a zero vector on any provider failure
	/// so storage and search never abort because embedding generation
	/// failed. Zero-vector entries rank last or arbitrarily in cosine
	/// search; listing still returns them.
	pub(crate) async fn embed_or_zero(&self, text: &str) -> Vec<f32> {
		let dim = self.cfg.storage.qdrant.vector_dim as usize;
		let texts = [text.to_string()];

		match self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await {
			Ok(mut vectors) => {
				let Some(len) = vectors.first().map(Vec::len) else {
					tracing::warn!("Embedding provider returned no vectors. Using zero vector.");

					return vec![0.0; dim];
				};

				if len != dim {
					tracing::warn!(
						got = len,
						expected = dim,
						"Embedding dimension mismatch. Using zero vector."
					);

					return vec![0.0; dim];
				}

				vectors.swap_remove(0)
			},
			Err(err) => {
				tracing::warn!(error = %err, "Embedding failed. Using zero vector.");

				vec![0.0; dim]
			},
		}
	}
}

pub(crate) fn parse_memory_type(raw: &str) -> ServiceResult<MemoryType> {
	raw.parse().map_err(|_| ServiceError::InvalidRequest {
		message: format!(
			"Invalid memory type {raw:?}. Must be one of: {}.",
			MemoryType::ALL.map(|t| t.as_str()).join(", ")
		),
	})
}
