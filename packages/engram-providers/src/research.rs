use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

const RESEARCH_SYSTEM_PROMPT: &str =
	"You are a research assistant that provides accurate, factual information with sources.";
const MIN_SECTION_CHARS: usize = 50;

/// One extracted research finding with its derived confidence and topic tags.
#[derive(Clone, Debug)]
pub struct Insight {
	pub content: String,
	pub confidence: f32,
	pub tags: Vec<String>,
}

/// Asks the research model a question and returns the prose answer.
pub async fn query(cfg: &engram_config::LlmProviderConfig, question: &str) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": [
			{ "role": "system", "content": RESEARCH_SYSTEM_PROMPT },
			{ "role": "user", "content": question },
		],
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	crate::chat_content(&json)
		.map(str::to_string)
		.ok_or_else(|| eyre::eyre!("Research response is missing message content."))
}

/// Splits a prose answer into insight-sized sections and scores each one.
///
/// Confidence starts high and decays with position; longer and more
/// number-dense sections get a small boost. Sections under the minimum
/// length or below `min_confidence` are dropped.
pub fn extract_insights(content: &str, max_insights: usize, min_confidence: f32) -> Vec<Insight> {
	let sections = split_sections(content);
	let mut insights = Vec::new();

	for (index, section) in sections.iter().take(max_insights).enumerate() {
		if section.chars().count() < MIN_SECTION_CHARS {
			continue;
		}

		let confidence = section_confidence(index, section);

		if confidence < min_confidence {
			continue;
		}

		insights.push(Insight {
			content: section.clone(),
			confidence,
			tags: extract_tags(section),
		});
	}

	insights
}

fn split_sections(content: &str) -> Vec<String> {
	let paragraphs: Vec<&str> =
		content.split("\n\n").map(str::trim).filter(|p| !p.is_empty()).collect();
	let mut sections: Vec<String> = Vec::new();
	let mut current: Vec<&str> = Vec::new();

	for paragraph in paragraphs.iter().copied() {
		if starts_new_section(paragraph) {
			if !current.is_empty() {
				sections.push(current.join(" "));
			}
			current = vec![paragraph];
		} else {
			current.push(paragraph);
		}
	}
	if !current.is_empty() {
		sections.push(current.join(" "));
	}

	if sections.is_empty() {
		return paragraphs.into_iter().map(str::to_string).collect();
	}

	sections
}

fn starts_new_section(paragraph: &str) -> bool {
	if paragraph.starts_with('•') || paragraph.starts_with('-') {
		return true;
	}

	(1..=10).any(|n| paragraph.starts_with(&format!("{n}.")))
}

fn section_confidence(index: usize, section: &str) -> f32 {
	let chars = section.chars().count().max(1);
	let base = 0.95 - index as f32 * 0.03;
	let length_factor = (chars as f32 / 1_000.0).min(0.05);
	let digit_ratio =
		section.chars().filter(|c| c.is_ascii_digit()).count() as f32 / chars as f32;
	let fact_factor = (digit_ratio * 10.0).min(0.05);

	(base + length_factor + fact_factor).min(0.99)
}

const TAG_CATEGORIES: [(&str, &[&str]); 8] = [
	("technology", &["technology", "software", "digital", "computer", "ai", "machine learning", "internet", "algorithm", "robot"]),
	("science", &["science", "research", "experiment", "physics", "chemistry", "biology", "astronomy", "quantum", "genetic"]),
	("business", &["business", "company", "startup", "market", "economy", "finance", "investment", "revenue", "industry"]),
	("health", &["health", "medical", "medicine", "doctor", "treatment", "disease", "wellness", "nutrition", "vaccine"]),
	("politics", &["politics", "government", "policy", "election", "legislation", "congress", "campaign", "nation"]),
	("environment", &["environment", "climate", "sustainability", "renewable", "pollution", "carbon", "ecosystem", "wildlife"]),
	("education", &["education", "school", "university", "student", "teacher", "academic", "curriculum", "learning"]),
	("social", &["social", "society", "community", "culture", "media", "trend", "movement", "engagement"]),
];

/// Derives up to three topic tags from keyword density, falling back to
/// a generic tag when nothing matches.
pub fn extract_tags(text: &str) -> Vec<String> {
	let lowered = text.to_lowercase();
	let mut scored: Vec<(&str, f32)> = Vec::new();

	for (category, keywords) in TAG_CATEGORIES {
		let hits: usize = keywords.iter().map(|keyword| lowered.matches(keyword).count()).sum();

		if hits > 0 {
			scored.push((category, hits as f32 / keywords.len() as f32));
		}
	}

	scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

	let tags: Vec<String> =
		scored.into_iter().take(3).map(|(category, _)| category.to_string()).collect();

	if tags.is_empty() {
		return vec!["general".to_string()];
	}

	tags
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bulleted_answer_splits_into_sections() {
		let content = "Intro paragraph that sets the stage for everything below it nicely.\n\n\
			- The glitch aesthetic emerged from early digital art experiments in the 1990s.\n\n\
			- Vaporwave and net art communities recontextualized corporate imagery online.";
		let insights = extract_insights(content, 5, 0.0);

		assert_eq!(insights.len(), 3);
		assert!(insights[1].content.starts_with("- The glitch aesthetic"));
	}

	#[test]
	fn confidence_decays_with_position() {
		let content = "First section long enough to clear the minimum length requirement easily.\n\n\
			1. Second section long enough to clear the minimum length requirement easily.\n\n\
			2. Third section long enough to clear the minimum length requirement easily.";
		let insights = extract_insights(content, 5, 0.0);

		assert!(insights.len() >= 2);
		assert!(insights[0].confidence > insights[1].confidence);
	}

	#[test]
	fn short_sections_are_dropped() {
		let insights = extract_insights("Too short.", 5, 0.0);

		assert!(insights.is_empty());
	}

	#[test]
	fn confidence_threshold_filters_insights() {
		let content = "1. A section that is definitely long enough to pass the length check here.";
		let strict = extract_insights(content, 5, 0.999);

		assert!(strict.is_empty());
	}

	#[test]
	fn tags_come_from_keyword_density() {
		let tags = extract_tags(
			"The startup raised new investment after strong market and revenue growth.",
		);

		assert_eq!(tags[0], "business");
	}

	#[test]
	fn unmatched_text_gets_generic_tag() {
		assert_eq!(extract_tags("lorem ipsum dolor"), vec!["general"]);
	}
}
