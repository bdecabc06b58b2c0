use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct CachedTweet {
	pub id: i64,
	pub tweet_id: String,
	pub tweet_text: String,
	pub tweet_url: Option<String>,
	pub engagement_score: f32,
	pub public_metrics: Value,
	pub vibe_tags: Option<String>,
	pub created_at: OffsetDateTime,
	pub fetched_at: OffsetDateTime,
	pub processed_at: Option<OffsetDateTime>,
	pub memory_ids: Option<Value>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PersonaProfile {
	pub profile_id: Uuid,
	pub name: String,
	pub topics: Value,
	pub style: Value,
	pub version: i32,
	pub updated_at: OffsetDateTime,
}
