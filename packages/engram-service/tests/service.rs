use std::{
	collections::VecDeque,
	sync::{Arc, Mutex},
};

use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use engram_config::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, Memory, Persona, Postgres, Processor,
	Providers as ProviderConfigs, Qdrant, Research, Retry, Service, Storage,
};
use engram_service::{
	AlignmentProvider, BoxFuture, CreateRequest, CreateResponse, DeleteRequest, EmbeddingProvider,
	EngramService, ListRequest, ProcessRequest, Providers, ResearchProvider, SearchRequest,
	ServiceError,
};
use engram_storage::{db::Db, qdrant::MemoryIndex};
use engram_testkit::TestDatabase;

const VECTOR_DIM: u32 = 4;

struct DummyEmbedding;
impl EmbeddingProvider for DummyEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		let dim = cfg.dimensions as usize;
		let vectors = texts
			.iter()
			.map(|text| {
				let seed = (text.len() % 7) as f32 + 1.0;

				(0..dim).map(|i| seed / (i as f32 + 2.0)).collect()
			})
			.collect();

		Box::pin(async move { Ok(vectors) })
	}
}

struct FailingEmbedding;
impl EmbeddingProvider for FailingEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(async { Err(color_eyre::eyre::eyre!("embedding provider unavailable")) })
	}
}

struct QueueAlignment {
	responses: Mutex<VecDeque<Value>>,
}
impl QueueAlignment {
	fn new(responses: impl IntoIterator<Item = Value>) -> Self {
		Self { responses: Mutex::new(responses.into_iter().collect()) }
	}
}
impl AlignmentProvider for QueueAlignment {
	fn evaluate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		let next = self.responses.lock().unwrap().pop_front();

		Box::pin(async move {
			next.ok_or_else(|| color_eyre::eyre::eyre!("alignment provider exhausted"))
		})
	}
}

struct FixedAlignment {
	value: Value,
}
impl AlignmentProvider for FixedAlignment {
	fn evaluate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		let value = self.value.clone();

		Box::pin(async move { Ok(value) })
	}
}

struct ScriptedResearch {
	fail_marker: &'static str,
}
impl ResearchProvider for ScriptedResearch {
	fn query<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		question: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		let fail = question.contains(self.fail_marker);

		Box::pin(async move {
			if fail {
				return Err(color_eyre::eyre::eyre!("research provider exploded"));
			}

			Ok("1. Glitch aesthetics grew out of early digital-error art experiments \
				and deliberate databending practice.\n\n\
				2. The reimagined superhero motif recurs across remix culture and \
				fan-art communities since the 2010s."
				.to_string())
		})
	}
}

struct UnusedResearch;
impl ResearchProvider for UnusedResearch {
	fn query<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_question: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async { Err(color_eyre::eyre::eyre!("research provider should not be called")) })
	}
}

fn test_config(dsn: String, qdrant_url: String, collection: String) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage {
			postgres: Postgres { dsn, pool_max_conns: 2 },
			qdrant: Qdrant { url: qdrant_url, collection, vector_dim: VECTOR_DIM },
		},
		providers: ProviderConfigs {
			embedding: dummy_embedding_provider(),
			alignment: dummy_llm_provider(),
			research: dummy_llm_provider(),
		},
		memory: Memory {
			min_alignment_score: 0.75,
			fallback_alignment_score: 0.5,
			default_agent_id: "marvin".to_string(),
			max_page_limit: 100,
			default_search_limit: 5,
		},
		persona: Persona {
			profile_id: Uuid::nil().to_string(),
			refresh_ttl_secs: 300,
		},
		research: Research { max_insights: 5, min_confidence: 0.0 },
		processor: Processor {
			enabled: false,
			interval_secs: 3_600,
			batch_limit: 10,
			min_engagement: 0.7,
			pause_between_tweets_ms: 0,
		},
		retry: Retry { max_attempts: 2, base_delay_ms: 1, max_delay_ms: 4 },
	}
}

fn dummy_embedding_provider() -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: "test-key".to_string(),
		path: "/".to_string(),
		model: "test".to_string(),
		dimensions: VECTOR_DIM,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

fn dummy_llm_provider() -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: "test-key".to_string(),
		path: "/".to_string(),
		model: "test".to_string(),
		temperature: 0.1,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

async fn test_env(prefix: &str) -> Option<(TestDatabase, Config)> {
	let Some(base_dsn) = engram_testkit::env_dsn() else {
		eprintln!("Skipping service tests; set ENGRAM_PG_DSN to run.");

		return None;
	};
	let Some(qdrant_url) = engram_testkit::env_qdrant_url() else {
		eprintln!("Skipping service tests; set ENGRAM_QDRANT_URL to run.");

		return None;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let collection = test_db.collection_name(prefix);
	let config = test_config(test_db.dsn().to_string(), qdrant_url, collection);

	Some((test_db, config))
}

async fn build_service(config: Config, providers: Providers) -> EngramService {
	let db = Db::connect(&config.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let index = MemoryIndex::new(&config.storage.qdrant, &config.retry)
		.expect("Failed to build Qdrant client.");

	index.ensure_collection().await.expect("Failed to ensure collection.");

	EngramService::with_providers(config, db, index, providers)
}

fn create_request(content: &str) -> CreateRequest {
	CreateRequest {
		content: content.to_string(),
		memory_type: "thought".to_string(),
		source: "manual".to_string(),
		tags: Vec::new(),
		metadata: Default::default(),
		bypass_alignment_check: false,
		alignment_score: None,
		agent_id: None,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set ENGRAM_PG_DSN and ENGRAM_QDRANT_URL to run."]
async fn gated_create_stores_above_threshold_and_rejects_below() {
	let Some((test_db, config)) = test_env("engram_gate").await else {
		return;
	};
	let providers = Providers::new(
		Arc::new(DummyEmbedding),
		Arc::new(QueueAlignment::new([
			serde_json::json!({ "score": 0.9, "aspects": ["wit"], "explanation": "fits" }),
			serde_json::json!({ "score": 0.4, "aspects": [], "explanation": "off-persona" }),
		])),
		Arc::new(UnusedResearch),
	);
	let service = build_service(config, providers).await;

	let stored = service.create(create_request("x")).await.expect("Create must succeed.");
	let CreateResponse::Stored { id } = stored else {
		panic!("Expected the high-scoring memory to be stored, got {stored:?}.");
	};

	let rejected = service.create(create_request("y")).await.expect("Create must succeed.");
	let CreateResponse::Rejected { score, explanation } = rejected else {
		panic!("Expected the low-scoring memory to be rejected, got {rejected:?}.");
	};

	assert_eq!(score, 0.4);
	assert_eq!(explanation, "off-persona");

	let listed = service
		.list(ListRequest {
			page: 1,
			limit: 10,
			memory_type: None,
			min_alignment: None,
			tags: Vec::new(),
		})
		.await
		.expect("List must succeed.");

	assert_eq!(listed.pagination.total, 1);
	assert_eq!(listed.pagination.pages, 1);
	assert_eq!(listed.memories.len(), 1);
	assert_eq!(listed.memories[0].id, id);
	assert_eq!(listed.memories[0].alignment_score, 0.9);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set ENGRAM_PG_DSN and ENGRAM_QDRANT_URL to run."]
async fn bypass_create_stores_without_consulting_the_evaluator() {
	let Some((test_db, config)) = test_env("engram_bypass").await else {
		return;
	};
	// An exhausted queue fails on any call; bypass must never reach it.
	let providers = Providers::new(
		Arc::new(DummyEmbedding),
		Arc::new(QueueAlignment::new([])),
		Arc::new(UnusedResearch),
	);
	let service = build_service(config, providers).await;
	let mut request = create_request("stored regardless of persona fit");

	request.bypass_alignment_check = true;
	request.alignment_score = Some(0.1);

	let response = service.create(request).await.expect("Bypass create must succeed.");
	let CreateResponse::Stored { id } = response else {
		panic!("Expected a stored memory, got {response:?}.");
	};

	let listed = service
		.list(ListRequest {
			page: 1,
			limit: 10,
			memory_type: None,
			min_alignment: None,
			tags: Vec::new(),
		})
		.await
		.expect("List must succeed.");

	assert_eq!(listed.memories.len(), 1);
	assert_eq!(listed.memories[0].id, id);
	assert_eq!(listed.memories[0].alignment_score, 0.1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set ENGRAM_PG_DSN and ENGRAM_QDRANT_URL to run."]
async fn embedding_failure_still_stores_a_listable_record() {
	let Some((test_db, config)) = test_env("engram_zero_vec").await else {
		return;
	};
	let providers = Providers::new(
		Arc::new(FailingEmbedding),
		Arc::new(QueueAlignment::new([])),
		Arc::new(UnusedResearch),
	);
	let service = build_service(config, providers).await;
	let mut request = create_request("survives embedding outage");

	request.bypass_alignment_check = true;

	let response = service.create(request).await.expect("Create must tolerate embedding failure.");
	let CreateResponse::Stored { id } = response else {
		panic!("Expected a stored memory, got {response:?}.");
	};

	let listed = service
		.list(ListRequest {
			page: 1,
			limit: 10,
			memory_type: None,
			min_alignment: None,
			tags: Vec::new(),
		})
		.await
		.expect("List must succeed.");

	assert_eq!(listed.memories.len(), 1);
	assert_eq!(listed.memories[0].id, id);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set ENGRAM_PG_DSN and ENGRAM_QDRANT_URL to run."]
async fn search_with_no_matches_returns_an_empty_list() {
	let Some((test_db, config)) = test_env("engram_empty_search").await else {
		return;
	};
	let providers = Providers::new(
		Arc::new(DummyEmbedding),
		Arc::new(QueueAlignment::new([])),
		Arc::new(UnusedResearch),
	);
	let service = build_service(config, providers).await;
	let response = service
		.search(SearchRequest {
			query: "anything at all".to_string(),
			limit: None,
			memory_type: None,
			min_alignment: None,
			tags: Vec::new(),
		})
		.await
		.expect("Search must not error on zero matches.");

	assert!(response.memories.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set ENGRAM_PG_DSN and ENGRAM_QDRANT_URL to run."]
async fn deleting_an_unknown_id_is_a_distinct_not_found() {
	let Some((test_db, config)) = test_env("engram_delete").await else {
		return;
	};
	let providers = Providers::new(
		Arc::new(DummyEmbedding),
		Arc::new(QueueAlignment::new([])),
		Arc::new(UnusedResearch),
	);
	let service = build_service(config, providers).await;
	let err = service
		.delete(DeleteRequest { id: Uuid::new_v4() })
		.await
		.expect_err("Deleting an unknown id must fail.");

	assert!(matches!(err, ServiceError::NotFound { .. }), "Expected NotFound, got {err:?}.");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set ENGRAM_PG_DSN and ENGRAM_QDRANT_URL to run."]
async fn batch_continues_past_a_failing_tweet() {
	let Some((test_db, config)) = test_env("engram_batch").await else {
		return;
	};
	let providers = Providers::new(
		Arc::new(DummyEmbedding),
		Arc::new(FixedAlignment {
			value: serde_json::json!({
				"is_worth_researching": true,
				"relevance_type": "curious",
				"research_question": null,
				"relevance_explanation": "worth a look"
			}),
		}),
		Arc::new(ScriptedResearch { fail_marker: "FAILME" }),
	);
	let service = build_service(config, providers).await;
	let now = OffsetDateTime::now_utc();
	let insert = "\
INSERT INTO tweets_cache (tweet_id, tweet_text, engagement_score, vibe_tags, created_at)
VALUES ($1, $2, $3, $4, $5)";

	for (tweet_id, text, engagement) in [
		("t-1", "Pink Batman through a glitch aesthetic lens", 10.5_f32),
		("t-2", "FAILME this one breaks the research provider", 9.0),
		("t-3", "Databending as a compositional practice", 8.0),
	] {
		sqlx::query(insert)
			.bind(tweet_id)
			.bind(text)
			.bind(engagement)
			.bind("art,glitch")
			.bind(now)
			.execute(&service.db.pool)
			.await
			.expect("Failed to insert tweet.");
	}

	let report = service
		.process_tweets(ProcessRequest { limit: Some(10), min_engagement: Some(0.5) })
		.await
		.expect("Batch must not abort on a failing item.");

	assert_eq!(report.processed_count, 2);
	assert_eq!(report.failed_count, 1);
	assert_eq!(report.processed_count + report.failed_count, 3);
	assert!(report.results.iter().all(|outcome| outcome.memory_count == 2));
	assert!(report.results.iter().any(|outcome| outcome.tweet_id == "t-1"));
	assert!(report.results.iter().any(|outcome| outcome.tweet_id == "t-3"));

	// The failed tweet stays unprocessed and is picked up again next run.
	let remaining: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM tweets_cache WHERE processed_at IS NULL",
	)
	.fetch_one(&service.db.pool)
	.await
	.expect("Failed to count unprocessed tweets.");

	assert_eq!(remaining, 1);

	// Stored insights are retrievable and tagged by the curious path.
	let listed = service
		.list(ListRequest {
			page: 1,
			limit: 20,
			memory_type: Some("research".to_string()),
			min_alignment: None,
			tags: Vec::new(),
		})
		.await
		.expect("List must succeed.");

	assert_eq!(listed.memories.len(), 4);
	assert!(listed.memories.iter().all(|memory| memory.tags.contains(&"curious".to_string())));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set ENGRAM_PG_DSN and ENGRAM_QDRANT_URL to run."]
async fn list_rejects_bad_pagination_before_any_store_call() {
	let Some((test_db, config)) = test_env("engram_pagination").await else {
		return;
	};
	let providers = Providers::new(
		Arc::new(DummyEmbedding),
		Arc::new(QueueAlignment::new([])),
		Arc::new(UnusedResearch),
	);
	let service = build_service(config, providers).await;

	for (page, limit) in [(0_u32, 10_u32), (1, 0), (1, 101)] {
		let err = service
			.list(ListRequest {
				page,
				limit,
				memory_type: None,
				min_alignment: None,
				tags: Vec::new(),
			})
			.await
			.expect_err("Out-of-bounds pagination must be rejected.");

		assert!(matches!(err, ServiceError::InvalidRequest { .. }));
	}

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
