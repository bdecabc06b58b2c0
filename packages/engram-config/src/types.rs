use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub memory: Memory,
	pub persona: Persona,
	pub research: Research,
	pub processor: Processor,
	pub retry: Retry,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub alignment: LlmProviderConfig,
	pub research: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Memory {
	pub min_alignment_score: f32,
	/// Score assigned when alignment evaluation fails. A crude neutral
	/// default, kept configurable rather than baked in.
	#[serde(default = "default_fallback_alignment_score")]
	pub fallback_alignment_score: f32,
	pub default_agent_id: String,
	pub max_page_limit: u32,
	pub default_search_limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct Persona {
	pub profile_id: String,
	#[serde(default = "default_persona_refresh_ttl_secs")]
	pub refresh_ttl_secs: i64,
}

#[derive(Debug, Deserialize)]
pub struct Research {
	pub max_insights: u32,
	pub min_confidence: f32,
}

#[derive(Debug, Deserialize)]
pub struct Processor {
	pub enabled: bool,
	pub interval_secs: u64,
	pub batch_limit: u32,
	pub min_engagement: f32,
	#[serde(default = "default_pause_between_tweets_ms")]
	pub pause_between_tweets_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Retry {
	pub max_attempts: u32,
	pub base_delay_ms: u64,
	pub max_delay_ms: u64,
}

fn default_fallback_alignment_score() -> f32 {
	0.5
}

fn default_persona_refresh_ttl_secs() -> i64 {
	300
}

fn default_pause_between_tweets_ms() -> u64 {
	2_000
}
