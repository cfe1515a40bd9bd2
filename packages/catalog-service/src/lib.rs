pub mod engine;
pub mod rotation;
pub mod search;
pub mod store;
pub mod subscription;
pub mod trust;
pub mod view;

mod error;

pub use engine::{CatalogEngine, CatalogSession, SessionContext};
pub use error::{Error, Result};
pub use rotation::{RotationConfig, RotationFrame, RotationHandle};
pub use store::{ErrorKind, RecordFilter, StoreError, Subscription, SubscriptionEvent, SubscriptionSender};
pub use subscription::{ControllerState, FailureKind, QueryTier};
pub use trust::{Profile, TrustIndex};
pub use view::{SearchState, SessionStatus, ViewError, ViewState};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use time::OffsetDateTime;

use catalog_domain::{overlay::ClassifierVerdict, record::RecordDocument};
use catalog_providers::{Classification, classifier, rules::RuleClassifier};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait RecordStore
where
	Self: Send + Sync,
{
	/// Opens a live subscription. `ordered` selects the preferred, sorted query.
	fn subscribe<'a>(
		&'a self,
		filter: &'a RecordFilter,
		ordered: bool,
	) -> BoxFuture<'a, std::result::Result<Subscription, StoreError>>;

	fn fetch_once<'a>(
		&'a self,
		filter: &'a RecordFilter,
		limit: usize,
	) -> BoxFuture<'a, std::result::Result<Vec<RecordDocument>, StoreError>>;
}

pub trait ProfileLookup
where
	Self: Send + Sync,
{
	fn get_profile<'a>(
		&'a self,
		user_id: &'a str,
	) -> BoxFuture<'a, std::result::Result<Option<Profile>, StoreError>>;
}

pub trait Classifier
where
	Self: Send + Sync,
{
	fn classify<'a>(
		&'a self,
		query: &'a str,
		candidates: &'a [&'a str],
	) -> BoxFuture<'a, color_eyre::Result<Option<ClassifierVerdict>>>;
}

pub trait Clock
where
	Self: Send + Sync,
{
	fn now(&self) -> OffsetDateTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// External services an engine talks to.
#[derive(Clone)]
pub struct Collaborators {
	pub store: Arc<dyn RecordStore>,
	pub profiles: Arc<dyn ProfileLookup>,
	pub classifier: Option<Arc<dyn Classifier>>,
	pub clock: Arc<dyn Clock>,
}
impl Collaborators {
	pub fn new(store: Arc<dyn RecordStore>, profiles: Arc<dyn ProfileLookup>) -> Self {
		Self { store, profiles, classifier: None, clock: Arc::new(SystemClock) }
	}

	pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
		self.classifier = Some(classifier);

		self
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}
}

/// Pattern-table classifier, no network.
pub struct RulesClassifier {
	rules: RuleClassifier,
}
impl RulesClassifier {
	pub fn new() -> color_eyre::Result<Self> {
		Ok(Self { rules: RuleClassifier::new()? })
	}
}
impl Classifier for RulesClassifier {
	fn classify<'a>(
		&'a self,
		query: &'a str,
		candidates: &'a [&'a str],
	) -> BoxFuture<'a, color_eyre::Result<Option<ClassifierVerdict>>> {
		Box::pin(async move { Ok(self.rules.classify(query, candidates).map(into_verdict)) })
	}
}

/// Chat-completions classifier.
pub struct HttpClassifier {
	cfg: catalog_config::HttpClassifier,
	timeout: Duration,
}
impl HttpClassifier {
	pub fn new(cfg: catalog_config::HttpClassifier, timeout: Duration) -> Self {
		Self { cfg, timeout }
	}
}
impl Classifier for HttpClassifier {
	fn classify<'a>(
		&'a self,
		query: &'a str,
		candidates: &'a [&'a str],
	) -> BoxFuture<'a, color_eyre::Result<Option<ClassifierVerdict>>> {
		Box::pin(async move {
			let timeout_ms = self.timeout.as_millis() as u64;
			let classification =
				classifier::classify(&self.cfg, timeout_ms, query, candidates).await?;

			Ok(classification.map(into_verdict))
		})
	}
}

/// Builds the classifier selected by `classifier.mode`, `None` for `off`.
pub fn classifier_from_config(
	cfg: &catalog_config::Classifier,
) -> color_eyre::Result<Option<Arc<dyn Classifier>>> {
	match cfg.mode.as_str() {
		"rules" => Ok(Some(Arc::new(RulesClassifier::new()?))),
		"http" => {
			let Some(http) = cfg.http.clone() else {
				return Err(color_eyre::eyre::eyre!(
					"classifier.http must be present when classifier.mode is http."
				));
			};

			Ok(Some(Arc::new(HttpClassifier::new(http, Duration::from_millis(cfg.timeout_ms)))))
		},
		_ => Ok(None),
	}
}

fn into_verdict(classification: Classification) -> ClassifierVerdict {
	ClassifierVerdict {
		category: classification.category,
		confidence: classification.confidence,
		reasoning: classification.reasoning,
		alternatives: classification.alternatives,
	}
}
