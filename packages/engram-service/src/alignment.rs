use serde_json::Value;

use engram_storage::models::PersonaProfile;

use crate::EngramService;

const FALLBACK_EXPLANATION: &str = "Alignment evaluation unavailable; neutral fallback applied.";

#[derive(Clone, Debug)]
pub struct AlignmentEvaluation {
	pub score: f32,
	pub aspects: Vec<String>,
	pub explanation: String,
}

impl EngramService {
	/// Scores how well `content` fits the current persona. Never fails:
	/// provider errors and malformed responses degrade to the configured
	/// neutral score, with the degradation noted in the explanation.
	pub(crate) async fn evaluate_alignment(&self, content: &str) -> AlignmentEvaluation {
		let persona = self.persona.current(&self.db, &self.cfg.persona).await;
		let messages = build_alignment_messages(content, persona.as_ref());

		match self.providers.alignment.evaluate(&self.cfg.providers.alignment, &messages).await {
			Ok(json) => match parse_evaluation(&json) {
				Some(evaluation) => evaluation,
				None => {
					tracing::warn!(
						"Alignment response missing score. Applying neutral fallback."
					);

					fallback_evaluation(self.cfg.memory.fallback_alignment_score)
				},
			},
			Err(err) => {
				tracing::warn!(error = %err, "Alignment evaluation failed. Applying neutral fallback.");

				fallback_evaluation(self.cfg.memory.fallback_alignment_score)
			},
		}
	}
}

pub(crate) fn fallback_evaluation(score: f32) -> AlignmentEvaluation {
	AlignmentEvaluation {
		score: score.clamp(0.0, 1.0),
		aspects: Vec::new(),
		explanation: FALLBACK_EXPLANATION.to_string(),
	}
}

fn parse_evaluation(json: &Value) -> Option<AlignmentEvaluation> {
	let score = json.get("score")?.as_f64()? as f32;

	if !score.is_finite() {
		return None;
	}

	let aspects = json
		.get("aspects")
		.and_then(|v| v.as_array())
		.map(|items| {
			items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect()
		})
		.unwrap_or_default();
	let explanation =
		json.get("explanation").and_then(|v| v.as_str()).unwrap_or_default().to_string();

	Some(AlignmentEvaluation { score: score.clamp(0.0, 1.0), aspects, explanation })
}

fn build_alignment_messages(content: &str, persona: Option<&PersonaProfile>) -> Vec<Value> {
	let persona_block = match persona {
		Some(profile) => format!(
			"Persona: {}\nTopics of interest: {}\nStyle: {}",
			profile.name, profile.topics, profile.style
		),
		None => "Persona: unspecified.".to_string(),
	};
	let system = format!(
		"You evaluate whether a piece of content fits a persona. {persona_block}\n\
		Respond with JSON only: {{\"score\": <0.0-1.0>, \"aspects\": [<matched persona aspects>], \
		\"explanation\": <one sentence>}}."
	);
	let user = format!("Content to evaluate:\n{content}");

	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": user }),
	]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_a_complete_evaluation() {
		let json = serde_json::json!({
			"score": 0.86,
			"aspects": ["dry wit", "art curiosity"],
			"explanation": "Matches the persona's interests."
		});
		let evaluation = parse_evaluation(&json).expect("Expected an evaluation.");

		assert_eq!(evaluation.score, 0.86);
		assert_eq!(evaluation.aspects, vec!["dry wit", "art curiosity"]);
	}

	#[test]
	fn clamps_out_of_range_scores() {
		let json = serde_json::json!({ "score": 1.7 });
		let evaluation = parse_evaluation(&json).expect("Expected an evaluation.");

		assert_eq!(evaluation.score, 1.0);
	}

	#[test]
	fn missing_score_is_rejected() {
		let json = serde_json::json!({ "aspects": [] });

		assert!(parse_evaluation(&json).is_none());
	}

	#[test]
	fn non_finite_score_is_rejected() {
		let json = serde_json::json!({ "score": f64::NAN });

		// NaN serializes to null, which as_f64 rejects; guard both paths.
		assert!(parse_evaluation(&json).is_none());
	}

	#[test]
	fn fallback_notes_the_degradation() {
		let evaluation = fallback_evaluation(0.5);

		assert_eq!(evaluation.score, 0.5);
		assert!(evaluation.aspects.is_empty());
		assert!(evaluation.explanation.contains("fallback"));
	}

	#[test]
	fn alignment_prompt_carries_persona_topics() {
		let profile = PersonaProfile {
			profile_id: uuid::Uuid::new_v4(),
			name: "Marvin".to_string(),
			topics: serde_json::json!(["glitch art", "androids"]),
			style: serde_json::json!({ "tone": "deadpan" }),
			version: 3,
			updated_at: time::OffsetDateTime::UNIX_EPOCH,
		};
		let messages = build_alignment_messages("content", Some(&profile));
		let system = messages[0]["content"].as_str().unwrap();

		assert!(system.contains("glitch art"));
		assert!(system.contains("deadpan"));
	}
}
