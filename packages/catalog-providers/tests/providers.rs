use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};

use catalog_domain::keywords::CATEGORIES;
use catalog_providers::rules::RuleClassifier;

#[test]
fn builds_bearer_auth_header() {
	let headers =
		catalog_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut extra = Map::new();

	extra.insert("x-retries".to_string(), Value::from(3));

	assert!(catalog_providers::auth_headers("secret", &extra).is_err());
}

#[test]
fn rule_table_covers_only_known_categories() {
	let classifier = RuleClassifier::new().expect("Pattern table must compile.");

	for category in classifier.categories() {
		assert!(CATEGORIES.contains(&category), "Unexpected rule category {category}.");
	}
}

#[tokio::test]
async fn unreachable_endpoint_reports_an_error() {
	let cfg = catalog_config::HttpClassifier {
		provider_id: "local".to_string(),
		api_base: "http://127.0.0.1:9".to_string(),
		api_key: "key".to_string(),
		path: "/v1/chat/completions".to_string(),
		model: "m".to_string(),
		temperature: 0.0,
		default_headers: Map::new(),
	};

	assert!(catalog_providers::classifier::classify(&cfg, 500, "bike", &["automobile"]).await.is_err());
}
