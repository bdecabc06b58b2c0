use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{CachedTweet, PersonaProfile},
};

/// Unprocessed tweets above the engagement threshold, hottest first. The
/// `processed_at IS NULL` guard is what makes batch runs idempotent.
pub async fn candidate_tweets(
	db: &Db,
	limit: i64,
	min_engagement: f32,
) -> Result<Vec<CachedTweet>> {
	let tweets = sqlx::query_as::<_, CachedTweet>(
		"\
SELECT id, tweet_id, tweet_text, tweet_url, engagement_score, public_metrics, vibe_tags,
	created_at, fetched_at, processed_at, memory_ids
FROM tweets_cache
WHERE processed_at IS NULL AND engagement_score >= $1
ORDER BY engagement_score DESC
LIMIT $2",
	)
	.bind(min_engagement)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(tweets)
}

pub async fn mark_tweet_processed(
	db: &Db,
	id: i64,
	memory_ids: &[Uuid],
	now: OffsetDateTime,
) -> Result<()> {
	let memory_ids_json = serde_json::to_value(memory_ids)?;

	sqlx::query("UPDATE tweets_cache SET processed_at = $1, memory_ids = $2 WHERE id = $3")
		.bind(now)
		.bind(memory_ids_json)
		.bind(id)
		.execute(&db.pool)
		.await?;

	Ok(())
}

pub async fn fetch_persona(db: &Db, profile_id: Uuid) -> Result<Option<PersonaProfile>> {
	let profile = sqlx::query_as::<_, PersonaProfile>(
		"\
SELECT profile_id, name, topics, style, version, updated_at
FROM persona_profiles
WHERE profile_id = $1",
	)
	.bind(profile_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(profile)
}
