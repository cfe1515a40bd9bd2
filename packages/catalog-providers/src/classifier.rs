use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

use crate::{Classification, is_candidate};

const SYSTEM_PROMPT: &str = "You map marketplace search queries to exactly one category. Reply \
with a JSON object {\"category\": string or null, \"confidence\": number between 0 and 1, \
\"reasoning\": string, \"alternatives\": [string]}. Only use categories from the provided list. \
Use null when none applies.";

/// Asks a chat-completions endpoint for a category.
pub async fn classify(
	cfg: &catalog_config::HttpClassifier,
	timeout_ms: u64,
	query: &str,
	candidates: &[&str],
) -> Result<Option<Classification>> {
	let client = Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": [
			{ "role": "system", "content": SYSTEM_PROMPT },
			{
				"role": "user",
				"content": serde_json::json!({ "query": query, "categories": candidates }).to_string(),
			},
		],
	});
	let res = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_classifier_json(json, candidates)
}

fn parse_classifier_json(json: Value, candidates: &[&str]) -> Result<Option<Classification>> {
	let payload = match json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
	{
		Some(content) => serde_json::from_str::<Value>(strip_code_fence(content))
			.map_err(|_| eyre::eyre!("Classifier content is not valid JSON."))?,
		None if json.is_object() => json,
		None => return Err(eyre::eyre!("Classifier response is missing JSON content.")),
	};
	let Some(category) = payload.get("category").and_then(Value::as_str).map(str::trim) else {
		return Ok(None);
	};

	if category.is_empty() || !is_candidate(category, candidates) {
		return Ok(None);
	}

	let confidence = payload.get("confidence").and_then(Value::as_f64).unwrap_or(0.0) as f32;
	let confidence = if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 };
	let reasoning =
		payload.get("reasoning").and_then(Value::as_str).unwrap_or_default().trim().to_string();
	let alternatives = payload
		.get("alternatives")
		.and_then(Value::as_array)
		.map(|values| {
			values
				.iter()
				.filter_map(Value::as_str)
				.filter(|alt| *alt != category && is_candidate(alt, candidates))
				.map(str::to_string)
				.collect()
		})
		.unwrap_or_default();

	Ok(Some(Classification { category: category.to_string(), confidence, reasoning, alternatives }))
}

fn strip_code_fence(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(inner) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let inner = inner.strip_prefix("json").unwrap_or(inner);

	inner.strip_suffix("```").unwrap_or(inner).trim()
}
