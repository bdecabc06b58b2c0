use std::collections::BTreeMap;

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use engram_domain::memory::{MetadataValue, normalize_tags};
use engram_storage::{models::CachedTweet, queries};

use crate::{CreateRequest, CreateResponse, EngramService, ServiceResult};

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ProcessRequest {
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub min_engagement: Option<f32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TweetOutcome {
	pub tweet_id: String,
	pub memory_count: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BatchReport {
	pub status: String,
	pub processed_count: u32,
	pub failed_count: u32,
	pub results: Vec<TweetOutcome>,
}

#[derive(Debug, Clone)]
struct CuriosityVerdict {
	worth_researching: bool,
	relevance_type: String,
	research_question: Option<String>,
	relevance_explanation: String,
}

impl EngramService {
	/// Processes a batch of cached tweets: curiosity-gate, research, store
	/// insights, mark processed. One failing tweet never aborts the batch;
	/// the report counts every candidate as processed or failed.
	pub async fn process_tweets(&self, req: ProcessRequest) -> ServiceResult<BatchReport> {
		let limit = req.limit.unwrap_or(self.cfg.processor.batch_limit);
		let min_engagement = req.min_engagement.unwrap_or(self.cfg.processor.min_engagement);

		tracing::info!(limit, min_engagement, "Starting tweet batch.");

		let tweets = queries::candidate_tweets(&self.db, limit as i64, min_engagement).await?;

		if tweets.is_empty() {
			tracing::info!("No candidate tweets found.");

			return Ok(BatchReport {
				status: "success".to_string(),
				processed_count: 0,
				failed_count: 0,
				results: Vec::new(),
			});
		}

		let mut processed_count = 0;
		let mut failed_count = 0;
		let mut results = Vec::new();
		let pause = std::time::Duration::from_millis(self.cfg.processor.pause_between_tweets_ms);

		for tweet in &tweets {
			let outcome = self.process_one(tweet).await;

			match outcome {
				Ok(memory_ids) => {
					let now = OffsetDateTime::now_utc();

					match queries::mark_tweet_processed(&self.db, tweet.id, &memory_ids, now)
						.await
					{
						Ok(()) => {
							processed_count += 1;
							results.push(TweetOutcome {
								tweet_id: tweet.tweet_id.clone(),
								memory_count: memory_ids.len(),
							});
						},
						Err(err) => {
							tracing::error!(
								tweet_id = %tweet.tweet_id,
								error = %err,
								"Failed to mark tweet processed."
							);

							failed_count += 1;
						},
					}
				},
				Err(err) => {
					tracing::error!(
						tweet_id = %tweet.tweet_id,
						error = %err,
						"Tweet processing failed."
					);

					failed_count += 1;
				},
			}

			// Pace requests to the research provider.
			tokio::time::sleep(pause).await;
		}

		Ok(BatchReport {
			status: "success".to_string(),
			processed_count,
			failed_count,
			results,
		})
	}

	async fn process_one(&self, tweet: &CachedTweet) -> ServiceResult<Vec<Uuid>> {
		let verdict = self.evaluate_curiosity(&tweet.tweet_text).await?;

		if !verdict.worth_researching {
			tracing::info!(
				tweet_id = %tweet.tweet_id,
				explanation = %verdict.relevance_explanation,
				"Tweet not worth researching."
			);

			return Ok(Vec::new());
		}

		let question = verdict
			.research_question
			.clone()
			.unwrap_or_else(|| research_prompt(&tweet.tweet_text));
		let insights = self.conduct_research(&question).await?;
		let vibe_tags = split_vibe_tags(tweet.vibe_tags.as_deref());
		let mut memory_ids = Vec::new();

		for insight in insights {
			let tags = normalize_tags(
				insight
					.tags
					.iter()
					.map(String::as_str)
					.chain(vibe_tags.iter().map(String::as_str))
					.chain(["curious"]),
			);
			let content =
				format!("{}\n\nBased on tweet: \"{}\"", insight.content, tweet.tweet_text);
			let mut metadata = BTreeMap::new();

			metadata.insert(
				"confidence".to_string(),
				MetadataValue::Number(insight.confidence as f64),
			);
			metadata.insert(
				"relevance_type".to_string(),
				MetadataValue::String(verdict.relevance_type.clone()),
			);
			metadata.insert(
				"relevance_explanation".to_string(),
				MetadataValue::String(verdict.relevance_explanation.clone()),
			);
			metadata.insert(
				"research_question".to_string(),
				MetadataValue::String(question.clone()),
			);

			let request = CreateRequest {
				content,
				memory_type: "research".to_string(),
				source: format!("tweet:{}", tweet.tweet_id),
				tags,
				metadata,
				bypass_alignment_check: true,
				alignment_score: None,
				agent_id: None,
			};

			match self.create(request).await {
				Ok(CreateResponse::Stored { id }) => memory_ids.push(id),
				Ok(CreateResponse::Rejected { score, .. }) => {
					tracing::warn!(score, "Bypassed insight unexpectedly rejected.");
				},
				Err(err) => {
					tracing::warn!(error = %err, "Failed to store insight. Continuing.");
				},
			}
		}

		Ok(memory_ids)
	}

	async fn evaluate_curiosity(&self, tweet_text: &str) -> ServiceResult<CuriosityVerdict> {
		let messages = build_curiosity_messages(tweet_text);
		let json =
			self.providers.alignment.evaluate(&self.cfg.providers.alignment, &messages).await?;

		Ok(parse_curiosity(&json))
	}
}

fn research_prompt(tweet_text: &str) -> String {
	format!(
		"Can you explain the cultural or artistic context of this tweet: '{tweet_text}'\n\
		Include any relevant subcultures, art movements, or philosophies it relates to. \
		Analyze any references, metaphors, or themes present in the tweet. \
		Provide historical or contemporary context that helps understand its meaning."
	)
}

fn build_curiosity_messages(tweet_text: &str) -> Vec<Value> {
	let system = "You decide whether a tweet is worth researching for cultural or artistic \
		insight. Respond with JSON only: {\"is_worth_researching\": <bool>, \
		\"relevance_type\": <short label>, \"research_question\": <question or null>, \
		\"relevance_explanation\": <one sentence>}.";
	let user = format!("Tweet:\n{tweet_text}");

	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": user }),
	]
}

fn parse_curiosity(json: &Value) -> CuriosityVerdict {
	let worth_researching =
		json.get("is_worth_researching").and_then(|v| v.as_bool()).unwrap_or(false);
	let relevance_type = json
		.get("relevance_type")
		.and_then(|v| v.as_str())
		.unwrap_or("curious")
		.to_string();
	let research_question = json
		.get("research_question")
		.and_then(|v| v.as_str())
		.map(str::trim)
		.filter(|q| !q.is_empty())
		.map(str::to_string);
	let relevance_explanation = json
		.get("relevance_explanation")
		.and_then(|v| v.as_str())
		.unwrap_or_default()
		.to_string();

	CuriosityVerdict { worth_researching, relevance_type, research_question, relevance_explanation }
}

fn split_vibe_tags(raw: Option<&str>) -> Vec<String> {
	let Some(raw) = raw else {
		return Vec::new();
	};

	raw.split(',').map(str::trim).filter(|tag| !tag.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_a_positive_verdict() {
		let json = serde_json::json!({
			"is_worth_researching": true,
			"relevance_type": "glitch_aesthetics",
			"research_question": "What is the lineage of glitch art?",
			"relevance_explanation": "Connects to experimental digital art."
		});
		let verdict = parse_curiosity(&json);

		assert!(verdict.worth_researching);
		assert_eq!(verdict.relevance_type, "glitch_aesthetics");
		assert_eq!(
			verdict.research_question.as_deref(),
			Some("What is the lineage of glitch art?")
		);
	}

	#[test]
	fn malformed_verdict_defaults_to_not_worth_researching() {
		let verdict = parse_curiosity(&serde_json::json!({ "unexpected": true }));

		assert!(!verdict.worth_researching);
		assert_eq!(verdict.relevance_type, "curious");
		assert!(verdict.research_question.is_none());
	}

	#[test]
	fn null_research_question_falls_back_to_the_prompt() {
		let json = serde_json::json!({
			"is_worth_researching": true,
			"research_question": null
		});
		let verdict = parse_curiosity(&json);

		assert!(verdict.research_question.is_none());

		let question = verdict
			.research_question
			.unwrap_or_else(|| research_prompt("Pink Batman through a glitch lens"));

		assert!(question.contains("Pink Batman"));
	}

	#[test]
	fn vibe_tags_split_and_trim() {
		let tags = split_vibe_tags(Some("art, creative ,batman,, glitch"));

		assert_eq!(tags, vec!["art", "creative", "batman", "glitch"]);
		assert!(split_vibe_tags(None).is_empty());
	}
}
