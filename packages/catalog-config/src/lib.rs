mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Classifier, Config, HttpClassifier, Rotation, Search, Service, Subscription};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: Box::new(err) })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("subscription.collection", &cfg.subscription.collection),
		("subscription.status", &cfg.subscription.status),
		("subscription.order_field", &cfg.subscription.order_field),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.subscription.retry_base_backoff_ms == 0 {
		return Err(Error::Validation {
			message: "subscription.retry_base_backoff_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.subscription.retry_max_backoff_ms < cfg.subscription.retry_base_backoff_ms {
		return Err(Error::Validation {
			message:
				"subscription.retry_max_backoff_ms must be at least subscription.retry_base_backoff_ms."
					.to_string(),
		});
	}
	if cfg.rotation.sample_size == 0 {
		return Err(Error::Validation {
			message: "rotation.sample_size must be greater than zero.".to_string(),
		});
	}
	if cfg.rotation.period_ms == 0 {
		return Err(Error::Validation {
			message: "rotation.period_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.rotation.transition_ms >= cfg.rotation.period_ms {
		return Err(Error::Validation {
			message: "rotation.transition_ms must be less than rotation.period_ms.".to_string(),
		});
	}
	if cfg.search.suggestion_limit == 0 {
		return Err(Error::Validation {
			message: "search.suggestion_limit must be greater than zero.".to_string(),
		});
	}
	if !cfg.search.min_classifier_confidence.is_finite() {
		return Err(Error::Validation {
			message: "search.min_classifier_confidence must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.search.min_classifier_confidence) {
		return Err(Error::Validation {
			message: "search.min_classifier_confidence must be in the range 0.0-1.0.".to_string(),
		});
	}

	let mode = cfg.classifier.mode.as_str();

	if !matches!(mode, "off" | "rules" | "http") {
		return Err(Error::Validation {
			message: "classifier.mode must be one of off, rules, or http.".to_string(),
		});
	}
	if cfg.classifier.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "classifier.timeout_ms must be greater than zero.".to_string(),
		});
	}

	if mode == "http" {
		let Some(http) = cfg.classifier.http.as_ref() else {
			return Err(Error::Validation {
				message: "classifier.http must be present when classifier.mode is http.".to_string(),
			});
		};

		for (label, value) in [
			("classifier.http.provider_id", &http.provider_id),
			("classifier.http.api_base", &http.api_base),
			("classifier.http.api_key", &http.api_key),
			("classifier.http.model", &http.model),
		] {
			if value.trim().is_empty() {
				return Err(Error::Validation { message: format!("{label} must be non-empty.") });
			}
		}

		if !http.temperature.is_finite() || http.temperature < 0.0 {
			return Err(Error::Validation {
				message: "classifier.http.temperature must be a finite number, zero or greater."
					.to_string(),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.subscription.collection = cfg.subscription.collection.trim().to_string();
	cfg.subscription.status = cfg.subscription.status.trim().to_string();
	cfg.subscription.order_field = cfg.subscription.order_field.trim().to_string();
	cfg.classifier.mode = cfg.classifier.mode.trim().to_ascii_lowercase();

	if let Some(http) = cfg.classifier.http.as_mut() {
		http.api_key = http.api_key.trim().to_string();
		http.api_base = http.api_base.trim_end_matches('/').to_string();
	}
}
