use std::{sync::Arc, time::Duration};

use rand::{RngCore, SeedableRng, rngs::StdRng};
use time::OffsetDateTime;
use tokio::{
	sync::watch,
	task::{AbortHandle, JoinHandle},
};

use crate::{
	Classifier, Clock, Collaborators, Error, ProfileLookup, Result,
	rotation::{ActiveSource, FrameSink, RotationConfig, RotationFrame, RotationHandle},
	search,
	store::{RecordFilter, StoreError},
	subscription::{ControllerDriver, ControllerSink, FailureKind, QueryTier, RetryPolicy},
	trust::{self, TrustIndex},
	view::{SearchState, SessionStatus, ViewError, ViewState},
};
use catalog_config::Config;
use catalog_domain::{
	normalize::NormalizedCollection,
	overlay::{self, SearchOutcome, SearchPolicy},
	rank,
	record::{Record, RecordDocument},
};

/// Per-screen context a session is opened with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionContext {
	pub current_user: Option<String>,
	pub category: Option<String>,
}

/// Built once per process; opens one [`CatalogSession`] per consumer.
pub struct CatalogEngine {
	cfg: Config,
	collaborators: Collaborators,
	filter: RecordFilter,
	retry: RetryPolicy,
	policy: SearchPolicy,
	rotation: RotationConfig,
	classifier_timeout: Duration,
}
impl CatalogEngine {
	pub fn new(cfg: Config, collaborators: Collaborators) -> Result<Self> {
		catalog_config::validate(&cfg)?;

		let filter = RecordFilter::from(&cfg.subscription);
		let retry = RetryPolicy::from(&cfg.subscription);
		let policy = SearchPolicy::from(&cfg.search);
		let rotation = RotationConfig::from(&cfg.rotation);
		let classifier_timeout = Duration::from_millis(cfg.classifier.timeout_ms);

		Ok(Self { cfg, collaborators, filter, retry, policy, rotation, classifier_timeout })
	}

	/// Like [`CatalogEngine::new`], with the classifier selected by `classifier.mode`.
	pub fn with_configured_classifier(cfg: Config, collaborators: Collaborators) -> Result<Self> {
		catalog_config::validate(&cfg)?;

		let collaborators = match crate::classifier_from_config(&cfg.classifier)? {
			Some(classifier) => collaborators.with_classifier(classifier),
			None => collaborators,
		};

		Self::new(cfg, collaborators)
	}

	pub fn config(&self) -> &Config {
		&self.cfg
	}

	/// Starts a session and its subscription driver. Must be called inside a tokio runtime.
	pub fn open(&self, ctx: SessionContext) -> CatalogSession {
		let initial = ViewState {
			category: clean(ctx.category.as_deref()),
			current_user: clean(ctx.current_user.as_deref()),
			..Default::default()
		};
		let (tx, _) = watch::channel(initial);
		let core = Arc::new(SessionCore {
			tx,
			clock: self.collaborators.clock.clone(),
			policy: self.policy,
		});
		let (shutdown, shutdown_rx) = watch::channel(false);
		let driver = ControllerDriver {
			store: self.collaborators.store.clone(),
			filter: self.filter.clone(),
			retry: self.retry,
			prime_page_size: self.cfg.subscription.prime_page_size as usize,
		};
		let sink: Arc<dyn ControllerSink> = core.clone();
		let driver = tokio::spawn(driver.run(sink, shutdown_rx));

		tracing::info!(
			collection = %self.filter.collection,
			current_user = ?ctx.current_user,
			category = ?ctx.category,
			"Catalog session opened."
		);

		CatalogSession {
			core,
			shutdown,
			driver,
			rotations: Vec::new(),
			classifier: self.collaborators.classifier.clone(),
			classifier_timeout: self.classifier_timeout,
			profiles: self.collaborators.profiles.clone(),
			rotation: self.rotation,
			closed: false,
		}
	}
}

/// A live view over the catalog for one consumer.
///
/// Closing or dropping the session stops its driver and every rotation it started.
pub struct CatalogSession {
	core: Arc<SessionCore>,
	shutdown: watch::Sender<bool>,
	driver: JoinHandle<()>,
	rotations: Vec<AbortHandle>,
	classifier: Option<Arc<dyn Classifier>>,
	classifier_timeout: Duration,
	profiles: Arc<dyn ProfileLookup>,
	rotation: RotationConfig,
	closed: bool,
}
impl CatalogSession {
	pub fn view(&self) -> watch::Receiver<ViewState> {
		self.core.tx.subscribe()
	}

	pub fn snapshot(&self) -> ViewState {
		self.core.tx.borrow().clone()
	}

	pub fn is_closed(&self) -> bool {
		self.closed
	}

	pub fn set_category(&self, category: Option<&str>) -> Result<()> {
		self.ensure_open()?;

		let category = clean(category);

		self.core.update(|view, now| {
			if view.category == category {
				return false;
			}

			view.category = category;
			view.refresh(now, &self.core.policy);

			true
		});

		Ok(())
	}

	/// Re-evaluates partitions against the clock without waiting for a snapshot.
	pub fn refresh(&self) -> Result<()> {
		self.ensure_open()?;
		self.core.update(|view, now| {
			view.refresh(now, &self.core.policy);

			true
		});

		Ok(())
	}

	/// Rotation using the configured size and period.
	pub fn start_configured_rotation(&mut self) -> Result<RotationHandle> {
		let RotationConfig { size, period, .. } = self.rotation;

		self.start_rotation(size, period)
	}

	pub fn start_rotation(&mut self, size: usize, period: Duration) -> Result<RotationHandle> {
		self.start_rotation_with_rng(size, period, Box::new(StdRng::from_os_rng()))
	}

	pub fn start_rotation_with_rng(
		&mut self,
		size: usize,
		period: Duration,
		rng: Box<dyn RngCore + Send>,
	) -> Result<RotationHandle> {
		self.ensure_open()?;

		let cfg = RotationConfig {
			size,
			period,
			transition: self.rotation.transition.min(period / 2),
		};
		let source: Arc<dyn ActiveSource> = self.core.clone();
		let sink: Arc<dyn FrameSink> = self.core.clone();
		let handle = RotationHandle::start(cfg, source, Some(sink), rng);

		self.rotations.retain(|task| !task.is_finished());
		self.rotations.push(handle.abort_handle());

		Ok(handle)
	}

	/// Runs a free-text search and stores it so later snapshots re-apply it.
	pub async fn search(&self, query: &str) -> Result<SearchOutcome> {
		self.ensure_open()?;

		let query = query.trim().to_string();
		let verdict = search::consult_classifier(
			self.classifier.as_deref(),
			self.classifier_timeout,
			&query,
		)
		.await;
		let mut outcome = None;

		self.core.update(|view, _| {
			let derived = overlay::search(&query, &view.ranked, verdict.as_ref(), &self.core.policy);

			view.search = Some(SearchState { query, verdict, outcome: derived.clone() });
			outcome = Some(derived);

			true
		});

		outcome.ok_or(Error::SessionClosed)
	}

	pub fn clear_search(&self) -> Result<()> {
		self.ensure_open()?;
		self.core.update(|view, _| view.search.take().is_some());

		Ok(())
	}

	/// Verification badges for every owner in the current view.
	pub async fn trust_badges(&self) -> TrustIndex {
		let ranked = self.core.tx.borrow().ranked.clone();

		trust::resolve_trust(self.profiles.as_ref(), ranked.full_list()).await
	}

	pub fn close(&mut self) {
		if self.closed {
			return;
		}

		self.closed = true;
		self.shutdown.send_replace(true);

		for task in self.rotations.drain(..) {
			task.abort();
		}

		self.core.tx.send_modify(|view| {
			view.status = SessionStatus::Closed;
			view.sample = RotationFrame::Idle;
			view.version += 1;
		});

		tracing::info!("Catalog session closed.");
	}

	fn ensure_open(&self) -> Result<()> {
		if self.closed { Err(Error::SessionClosed) } else { Ok(()) }
	}
}
impl Drop for CatalogSession {
	fn drop(&mut self) {
		self.close();
		self.driver.abort();
	}
}

/// State shared by the session handle, its driver, and its rotations.
struct SessionCore {
	tx: watch::Sender<ViewState>,
	clock: Arc<dyn Clock>,
	policy: SearchPolicy,
}
impl SessionCore {
	/// Applies `modify` unless the session is closed. Bumps the version when it reports a change.
	fn update<F>(&self, modify: F) -> bool
	where
		F: FnOnce(&mut ViewState, OffsetDateTime) -> bool,
	{
		let now = self.clock.now();

		self.tx.send_if_modified(|view| {
			if view.is_closed() || !modify(view, now) {
				return false;
			}

			view.version += 1;

			true
		})
	}

	fn decode(docs: &[RecordDocument]) -> NormalizedCollection {
		let (collection, rejected) = NormalizedCollection::from_documents(docs);

		for err in &rejected {
			tracing::warn!(error = %err, "Rejected record document.");
		}

		collection
	}
}
impl ControllerSink for SessionCore {
	fn prime(&self, docs: Vec<RecordDocument>) {
		let collection = Self::decode(&docs);

		self.update(|view, now| {
			if view.status != SessionStatus::Loading {
				return false;
			}

			view.collection = collection;
			view.refresh(now, &self.policy);

			true
		});
	}

	fn publish(&self, tier: QueryTier, docs: Vec<RecordDocument>) {
		let collection = Self::decode(&docs);

		self.update(|view, now| {
			if view.status != (SessionStatus::Live { tier }) {
				tracing::info!(?tier, "Catalog session is live.");
			}

			view.status = SessionStatus::Live { tier };
			view.error = None;
			view.collection = collection;
			view.refresh(now, &self.policy);

			true
		});
	}

	fn fail(&self, kind: FailureKind, error: &StoreError) {
		self.update(|view, now| {
			view.status = SessionStatus::Failed { kind };
			view.error = Some(ViewError { kind, message: error.to_string() });
			view.collection = NormalizedCollection::default();
			view.refresh(now, &self.policy);

			true
		});
	}
}
impl ActiveSource for SessionCore {
	fn active(&self) -> Vec<Record> {
		let now = self.clock.now();
		let view = self.tx.borrow();

		rank::rank(&view.collection, now, view.category.as_deref(), view.current_user.as_deref())
			.active
	}
}
impl FrameSink for SessionCore {
	fn publish_frame(&self, frame: &RotationFrame) {
		// Re-rank with the same clock so `ranked` agrees with the sample.
		self.update(|view, now| {
			view.sample = frame.clone();
			view.refresh(now, &self.policy);

			true
		});
	}
}

fn clean(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}
