use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Sends a structured-output chat call and returns the parsed JSON object
/// from the first choice. Used for alignment scoring and the curiosity
/// evaluation, which share the same response contract.
pub async fn evaluate(cfg: &engram_config::LlmProviderConfig, messages: &[Value]) -> Result<Value> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);

	for _ in 0..3 {
		let body = serde_json::json!({
			"model": cfg.model,
			"temperature": cfg.temperature,
			"messages": messages,
		});
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;
		if let Ok(parsed) = parse_evaluation_json(json) {
			return Ok(parsed);
		}
	}

	Err(eyre::eyre!("Evaluation response is not valid JSON."))
}

fn parse_evaluation_json(json: Value) -> Result<Value> {
	if let Some(content) = crate::chat_content(&json) {
		let parsed: Value = serde_json::from_str(content)
			.map_err(|_| eyre::eyre!("Evaluation content is not valid JSON."))?;

		return Ok(parsed);
	}

	if json.is_object() {
		return Ok(json);
	}

	Err(eyre::eyre!("Evaluation response is missing JSON content."))
}
