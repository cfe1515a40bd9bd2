use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub subscription: Subscription,
	#[serde(default)]
	pub rotation: Rotation,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub classifier: Classifier,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Subscription {
	/// Name of the remote record collection, e.g. "enquiries".
	pub collection: String,
	/// Status value the store-side filter selects on.
	#[serde(default = "default_status")]
	pub status: String,
	/// Field the preferred query sorts on, descending.
	#[serde(default = "default_order_field")]
	pub order_field: String,
	/// Page size of the one-shot fetch issued before the first subscription. Zero disables it.
	#[serde(default)]
	pub prime_page_size: u32,
	#[serde(default = "default_retry_base_backoff_ms")]
	pub retry_base_backoff_ms: u64,
	#[serde(default = "default_retry_max_backoff_ms")]
	pub retry_max_backoff_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Rotation {
	pub sample_size: u32,
	pub period_ms: u64,
	/// How long the empty "clearing" frame is held before a new window is shown.
	pub transition_ms: u64,
}
impl Default for Rotation {
	fn default() -> Self {
		Self { sample_size: 3, period_ms: 60_000, transition_ms: 300 }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Search {
	pub suggestion_limit: u32,
	pub min_suggestion_word_chars: u32,
	/// Classifier verdicts below this confidence are still applied but flagged.
	pub min_classifier_confidence: f32,
}
impl Default for Search {
	fn default() -> Self {
		Self { suggestion_limit: 5, min_suggestion_word_chars: 4, min_classifier_confidence: 0.3 }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Classifier {
	/// One of "off", "rules", or "http".
	pub mode: String,
	pub timeout_ms: u64,
	pub http: Option<HttpClassifier>,
}
impl Default for Classifier {
	fn default() -> Self {
		Self { mode: "off".to_string(), timeout_ms: 1_500, http: None }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct HttpClassifier {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	#[serde(default)]
	pub temperature: f32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

fn default_status() -> String {
	"live".to_string()
}

fn default_order_field() -> String {
	"createdAt".to_string()
}

fn default_retry_base_backoff_ms() -> u64 {
	500
}

fn default_retry_max_backoff_ms() -> u64 {
	30_000
}
