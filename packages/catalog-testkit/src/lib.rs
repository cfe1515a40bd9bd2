mod error;

pub use error::{Error, Result};

use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Arc, Mutex, MutexGuard,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::Notify;

use catalog_domain::{
	overlay::ClassifierVerdict,
	record::{Record, RecordDocument},
};
use catalog_service::{
	BoxFuture, Classifier, Clock, Collaborators, Profile, ProfileLookup, RecordFilter,
	RecordStore, StoreError, Subscription, SubscriptionSender,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}

/// One `subscribe` call seen by a [`ScriptedStore`].
#[derive(Clone, Debug)]
pub struct OpenedSubscription {
	pub filter: RecordFilter,
	pub ordered: bool,
	/// `None` when the open was scripted to fail.
	pub sender: Option<SubscriptionSender>,
}
impl OpenedSubscription {
	pub fn is_live(&self) -> bool {
		self.sender.as_ref().is_some_and(|sender| !sender.is_closed())
	}
}

#[derive(Default)]
struct ScriptedState {
	open_failures: VecDeque<StoreError>,
	opened: Vec<OpenedSubscription>,
	prime: Option<std::result::Result<Vec<RecordDocument>, StoreError>>,
	fetches: Vec<usize>,
}

/// In-memory record store driven by the test.
#[derive(Default)]
pub struct ScriptedStore {
	state: Mutex<ScriptedState>,
	opened: Notify,
}
impl ScriptedStore {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// The next `subscribe` call fails with `err` instead of opening.
	pub fn fail_next_open(&self, err: StoreError) {
		lock(&self.state).open_failures.push_back(err);
	}

	pub fn set_prime(&self, result: std::result::Result<Vec<RecordDocument>, StoreError>) {
		lock(&self.state).prime = Some(result);
	}

	pub fn opened(&self) -> Vec<OpenedSubscription> {
		lock(&self.state).opened.clone()
	}

	/// `ordered` flag of every `subscribe` call, in order.
	pub fn open_tiers(&self) -> Vec<bool> {
		lock(&self.state).opened.iter().map(|opened| opened.ordered).collect()
	}

	pub fn open_count(&self) -> usize {
		lock(&self.state).opened.len()
	}

	pub fn live_count(&self) -> usize {
		lock(&self.state).opened.iter().filter(|opened| opened.is_live()).count()
	}

	/// Limits passed to `fetch_once`.
	pub fn fetches(&self) -> Vec<usize> {
		lock(&self.state).fetches.clone()
	}

	pub fn push(&self, docs: Vec<RecordDocument>) -> bool {
		self.latest_sender().is_some_and(|sender| sender.push_snapshot(docs))
	}

	pub fn fail(&self, err: StoreError) -> bool {
		self.latest_sender().is_some_and(|sender| sender.fail(err))
	}

	/// Ends the latest subscription without an error.
	pub fn end(&self) {
		if let Some(last) = lock(&self.state).opened.last_mut() {
			last.sender = None;
		}
	}

	pub async fn wait_for_opens(&self, count: usize) {
		loop {
			let notified = self.opened.notified();

			if self.open_count() >= count {
				return;
			}

			notified.await;
		}
	}

	fn latest_sender(&self) -> Option<SubscriptionSender> {
		lock(&self.state).opened.last().and_then(|opened| opened.sender.clone())
	}
}
impl RecordStore for ScriptedStore {
	fn subscribe<'a>(
		&'a self,
		filter: &'a RecordFilter,
		ordered: bool,
	) -> BoxFuture<'a, std::result::Result<Subscription, StoreError>> {
		Box::pin(async move {
			let result = {
				let mut state = lock(&self.state);

				match state.open_failures.pop_front() {
					Some(err) => {
						state.opened.push(OpenedSubscription {
							filter: filter.clone(),
							ordered,
							sender: None,
						});

						Err(err)
					},
					None => {
						let (sender, subscription) = Subscription::channel();

						state.opened.push(OpenedSubscription {
							filter: filter.clone(),
							ordered,
							sender: Some(sender),
						});

						Ok(subscription)
					},
				}
			};

			self.opened.notify_waiters();

			result
		})
	}

	fn fetch_once<'a>(
		&'a self,
		_filter: &'a RecordFilter,
		limit: usize,
	) -> BoxFuture<'a, std::result::Result<Vec<RecordDocument>, StoreError>> {
		Box::pin(async move {
			let mut state = lock(&self.state);

			state.fetches.push(limit);

			match state.prime.clone() {
				Some(Ok(docs)) => Ok(docs.into_iter().take(limit).collect()),
				Some(Err(err)) => Err(err),
				None => Ok(Vec::new()),
			}
		})
	}
}

/// Clock that only moves when told to.
pub struct FixedClock {
	now: Mutex<OffsetDateTime>,
}
impl FixedClock {
	pub fn new(now: OffsetDateTime) -> Arc<Self> {
		Arc::new(Self { now: Mutex::new(now) })
	}

	pub fn set(&self, now: OffsetDateTime) {
		*lock(&self.now) = now;
	}

	pub fn advance(&self, by: time::Duration) {
		let mut now = lock(&self.now);

		*now += by;
	}
}
impl Clock for FixedClock {
	fn now(&self) -> OffsetDateTime {
		*lock(&self.now)
	}
}

/// Profile lookup backed by a map. Unknown users resolve to `None`.
#[derive(Default)]
pub struct StaticProfiles {
	profiles: HashMap<String, Profile>,
	failures: HashMap<String, StoreError>,
	lookups: AtomicUsize,
}
impl StaticProfiles {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_profile(mut self, user_id: &str, verified: bool) -> Self {
		self.profiles.insert(
			user_id.to_string(),
			Profile { user_id: user_id.to_string(), display_name: user_id.to_string(), verified },
		);

		self
	}

	pub fn with_failure(mut self, user_id: &str, err: StoreError) -> Self {
		self.failures.insert(user_id.to_string(), err);

		self
	}

	pub fn lookups(&self) -> usize {
		self.lookups.load(Ordering::SeqCst)
	}
}
impl ProfileLookup for StaticProfiles {
	fn get_profile<'a>(
		&'a self,
		user_id: &'a str,
	) -> BoxFuture<'a, std::result::Result<Option<Profile>, StoreError>> {
		Box::pin(async move {
			self.lookups.fetch_add(1, Ordering::SeqCst);

			if let Some(err) = self.failures.get(user_id) {
				return Err(err.clone());
			}

			Ok(self.profiles.get(user_id).cloned())
		})
	}
}

/// Classifier returning a canned verdict, optionally after a delay or with an error.
#[derive(Default)]
pub struct StubClassifier {
	verdict: Option<ClassifierVerdict>,
	delay: Option<Duration>,
	fail: bool,
	calls: AtomicUsize,
}
impl StubClassifier {
	pub fn returning(category: &str, confidence: f32) -> Self {
		Self {
			verdict: Some(ClassifierVerdict {
				category: category.to_string(),
				confidence,
				reasoning: format!("Stub picked {category}."),
				alternatives: Vec::new(),
			}),
			..Default::default()
		}
	}

	pub fn failing() -> Self {
		Self { fail: true, ..Default::default() }
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl Classifier for StubClassifier {
	fn classify<'a>(
		&'a self,
		_query: &'a str,
		_candidates: &'a [&'a str],
	) -> BoxFuture<'a, color_eyre::Result<Option<ClassifierVerdict>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
			if self.fail {
				return Err(color_eyre::eyre::eyre!("Stub classifier failure."));
			}

			Ok(self.verdict.clone())
		})
	}
}

/// Fluent builder for store documents.
#[derive(Clone, Debug)]
pub struct RecordBuilder {
	id: String,
	fields: Map<String, Value>,
}
impl RecordBuilder {
	pub fn new(id: &str) -> Self {
		let mut fields = Map::new();

		fields.insert("title".to_string(), Value::from(format!("Enquiry {id}")));
		fields.insert("status".to_string(), Value::from("live"));

		Self { id: id.to_string(), fields }
	}

	pub fn title(self, title: &str) -> Self {
		self.field("title", Value::from(title))
	}

	pub fn description(self, description: &str) -> Self {
		self.field("description", Value::from(description))
	}

	pub fn category(self, category: &str) -> Self {
		self.field("category", Value::from(category))
	}

	pub fn owner(self, user_id: &str) -> Self {
		self.field("userId", Value::from(user_id))
	}

	pub fn status(self, status: &str) -> Self {
		self.field("status", Value::from(status))
	}

	pub fn budget(self, budget: f64) -> Self {
		self.field("budget", Value::from(budget))
	}

	pub fn created_at(self, at: OffsetDateTime) -> Self {
		self.timestamp("createdAt", at)
	}

	pub fn deadline(self, at: OffsetDateTime) -> Self {
		self.timestamp("deadline", at)
	}

	pub fn field(mut self, name: &str, value: Value) -> Self {
		self.fields.insert(name.to_string(), value);

		self
	}

	pub fn build(&self) -> RecordDocument {
		RecordDocument { id: self.id.clone(), fields: self.fields.clone() }
	}

	pub fn record(&self) -> Result<Record> {
		Ok(self.build().decode()?)
	}

	fn timestamp(self, name: &str, at: OffsetDateTime) -> Self {
		match at.format(&Rfc3339) {
			Ok(raw) => self.field(name, Value::from(raw)),
			Err(_) => self,
		}
	}
}

/// Scripted store, empty profiles, no classifier, fixed clock.
pub fn collaborators(store: Arc<ScriptedStore>, clock: Arc<FixedClock>) -> Collaborators {
	Collaborators::new(store, Arc::new(StaticProfiles::new())).with_clock(clock)
}

/// Smallest valid configuration for engine tests.
pub fn test_config() -> Result<catalog_config::Config> {
	let raw = r#"
[service]
log_level = "debug"

[subscription]
collection = "enquiries"
retry_base_backoff_ms = 500
retry_max_backoff_ms = 4000

[rotation]
sample_size = 3
period_ms = 60000
transition_ms = 300

[classifier]
mode = "off"
timeout_ms = 200
"#;

	toml::from_str(raw).map_err(|err| Error::Message(format!("Failed to parse test config: {err}.")))
}
