use std::time::Duration;

use crate::Classifier;
use catalog_domain::{keywords::CATEGORIES, overlay::ClassifierVerdict};

/// Asks the classifier for a verdict under a hard timeout. Failures fall back to keyword search.
pub async fn consult_classifier(
	classifier: Option<&dyn Classifier>,
	timeout: Duration,
	query: &str,
) -> Option<ClassifierVerdict> {
	let classifier = classifier?;
	let query = query.trim();

	if query.is_empty() {
		return None;
	}

	match tokio::time::timeout(timeout, classifier.classify(query, CATEGORIES)).await {
		Ok(Ok(verdict)) => verdict,
		Ok(Err(err)) => {
			tracing::warn!(error = %err, "Classifier failed. Using keyword search.");

			None
		},
		Err(_) => {
			tracing::warn!(
				timeout_ms = timeout.as_millis() as u64,
				"Classifier timed out. Using keyword search."
			);

			None
		},
	}
}
