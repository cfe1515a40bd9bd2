//! JSONL-scripted record store.
//!
//! Each line is one step:
//!
//! ```text
//! {"kind":"snapshot","docs":[{"id":"e1","fields":{"status":"live"}}]}
//! {"kind":"error","code":"unavailable","message":"Connection reset."}
//! {"kind":"end"}
//! ```
//!
//! An `error` step at the head of the script fails the next `subscribe` call. Otherwise the
//! subscription consumes steps until it reaches an `error` (delivered on the stream) or an `end`
//! (stream closes), one step per tick.

use std::{
	collections::{HashMap, VecDeque},
	fs,
	path::Path,
	sync::{Arc, Mutex, MutexGuard},
	time::Duration,
};

use color_eyre::eyre::{self, WrapErr};
use serde::Deserialize;
use tokio::sync::watch;

use catalog_domain::record::RecordDocument;
use catalog_service::{
	BoxFuture, Profile, ProfileLookup, RecordFilter, RecordStore, StoreError, Subscription,
	SubscriptionSender,
};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptStep {
	Snapshot {
		docs: Vec<RecordDocument>,
	},
	Error {
		code: String,
		#[serde(default)]
		message: String,
	},
	End,
}

/// Parses a JSONL script. Blank lines are skipped.
pub fn load_script(path: &Path) -> color_eyre::Result<Vec<ScriptStep>> {
	let raw = fs::read_to_string(path)
		.wrap_err_with(|| format!("Failed to read script {}.", path.display()))?;

	parse_script(&raw)
}

pub fn parse_script(raw: &str) -> color_eyre::Result<Vec<ScriptStep>> {
	let mut steps = Vec::new();

	for (idx, line) in raw.lines().enumerate() {
		let line = line.trim();

		if line.is_empty() {
			continue;
		}

		let step = serde_json::from_str(line)
			.wrap_err_with(|| format!("Invalid script step on line {}.", idx + 1))?;

		steps.push(step);
	}

	if steps.is_empty() {
		return Err(eyre::eyre!("Script has no steps."));
	}

	Ok(steps)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}

pub struct ReplayStore {
	script: Mutex<VecDeque<ScriptStep>>,
	step: Duration,
	exhausted: Arc<watch::Sender<bool>>,
}
impl ReplayStore {
	pub fn new(steps: Vec<ScriptStep>, step: Duration) -> Arc<Self> {
		let (exhausted, _) = watch::channel(false);

		Arc::new(Self { script: Mutex::new(steps.into()), step, exhausted: Arc::new(exhausted) })
	}

	/// Flips to `true` once every step has been delivered.
	pub fn exhausted(&self) -> watch::Receiver<bool> {
		self.exhausted.subscribe()
	}

	/// Takes the steps the next subscription will deliver.
	fn take_run(script: &mut VecDeque<ScriptStep>) -> Vec<ScriptStep> {
		let mut run = Vec::new();

		while let Some(step) = script.pop_front() {
			let terminal = !matches!(step, ScriptStep::Snapshot { .. });

			run.push(step);

			if terminal {
				break;
			}
		}

		run
	}
}
impl RecordStore for ReplayStore {
	fn subscribe<'a>(
		&'a self,
		filter: &'a RecordFilter,
		ordered: bool,
	) -> BoxFuture<'a, Result<Subscription, StoreError>> {
		Box::pin(async move {
			let (run, drained) = {
				let mut script = lock(&self.script);

				if matches!(script.front(), Some(ScriptStep::Error { .. }))
					&& let Some(ScriptStep::Error { code, message }) = script.pop_front()
				{
					tracing::debug!(%code, "Replay open fails.");

					return Err(StoreError::new(code, message));
				}

				let run = Self::take_run(&mut script);

				(run, script.is_empty())
			};

			tracing::debug!(
				collection = %filter.collection,
				ordered,
				steps = run.len(),
				"Replay subscription opened."
			);

			let (sender, subscription) = Subscription::channel();
			let exhausted = drained.then(|| self.exhausted.clone());

			tokio::spawn(feed(run, sender, self.step, exhausted));

			Ok(subscription)
		})
	}

	/// Serves the first scripted snapshot without consuming it.
	fn fetch_once<'a>(
		&'a self,
		_filter: &'a RecordFilter,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<RecordDocument>, StoreError>> {
		Box::pin(async move {
			let script = lock(&self.script);
			let docs = script
				.iter()
				.find_map(|step| match step {
					ScriptStep::Snapshot { docs } => Some(docs.iter().take(limit).cloned().collect()),
					_ => None,
				})
				.unwrap_or_default();

			Ok(docs)
		})
	}
}

async fn feed(
	run: Vec<ScriptStep>,
	sender: SubscriptionSender,
	step: Duration,
	exhausted: Option<Arc<watch::Sender<bool>>>,
) {
	for next in run {
		tokio::time::sleep(step).await;

		match next {
			ScriptStep::Snapshot { docs } =>
				if !sender.push_snapshot(docs) {
					return;
				},
			ScriptStep::Error { code, message } => {
				if let Some(exhausted) = exhausted {
					exhausted.send_replace(true);
				}

				sender.fail(StoreError::new(code, message));

				return;
			},
			ScriptStep::End => {
				if let Some(exhausted) = exhausted {
					exhausted.send_replace(true);
				}

				return;
			},
		}
	}

	if let Some(exhausted) = exhausted {
		exhausted.send_replace(true);
	}

	// Nothing left to deliver; keep the stream open until the session lets go.
	sender.closed().await;
}

/// Profiles loaded from a JSON array.
#[derive(Default)]
pub struct FileProfiles {
	profiles: HashMap<String, Profile>,
}
impl FileProfiles {
	pub fn load(path: &Path) -> color_eyre::Result<Self> {
		let raw = fs::read_to_string(path)
			.wrap_err_with(|| format!("Failed to read profiles {}.", path.display()))?;
		let profiles: Vec<Profile> = serde_json::from_str(&raw)?;

		Ok(Self::from(profiles))
	}
}
impl From<Vec<Profile>> for FileProfiles {
	fn from(profiles: Vec<Profile>) -> Self {
		Self {
			profiles: profiles.into_iter().map(|profile| (profile.user_id.clone(), profile)).collect(),
		}
	}
}
impl ProfileLookup for FileProfiles {
	fn get_profile<'a>(
		&'a self,
		user_id: &'a str,
	) -> BoxFuture<'a, Result<Option<Profile>, StoreError>> {
		Box::pin(async move { Ok(self.profiles.get(user_id).cloned()) })
	}
}
