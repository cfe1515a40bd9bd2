pub mod classifier;
pub mod rules;

use color_eyre::{Result, eyre};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Category guess for a free-text query.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Classification {
	pub category: String,
	/// Always within `0.0..=1.0`.
	pub confidence: f32,
	pub reasoning: String,
	pub alternatives: Vec<String>,
}

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(eyre::eyre!("Default header values must be strings."));
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) fn is_candidate(category: &str, candidates: &[&str]) -> bool {
	candidates.is_empty() || candidates.iter().any(|candidate| *candidate == category)
}
