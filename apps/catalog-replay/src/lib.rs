pub mod script;

use std::{io::Write, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use serde::Serialize;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use catalog_config::Config;
use catalog_domain::{
	overlay::{MatchSource, SearchOutcome},
	record::Record,
};
use catalog_service::{
	CatalogEngine, Collaborators, RotationFrame, SessionContext, SessionStatus, TrustIndex,
	ViewState,
};
use script::{FileProfiles, ReplayStore};

#[derive(Debug, Parser)]
#[command(
	version = catalog_cli::VERSION,
	rename_all = "kebab",
	styles = catalog_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// JSONL script of snapshots and errors to feed the session.
	#[arg(long, short = 's', value_name = "FILE")]
	pub script: PathBuf,
	/// JSON array of owner profiles used for trust badges.
	#[arg(long, value_name = "FILE")]
	pub profiles: Option<PathBuf>,
	#[arg(long, value_name = "ID")]
	pub user: Option<String>,
	#[arg(long, value_name = "NAME")]
	pub category: Option<String>,
	/// Searches run once the script is exhausted. Repeatable.
	#[arg(long = "query", short = 'q', value_name = "TEXT")]
	pub queries: Vec<String>,
	/// Start the configured rotation alongside the subscription.
	#[arg(long)]
	pub rotate: bool,
	#[arg(long, value_name = "MS", default_value_t = 250)]
	pub step_ms: u64,
	/// Keep observing for this long even after the script is exhausted.
	#[arg(long, value_name = "MS")]
	pub duration_ms: Option<u64>,
}

/// One line of replay output.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
	Frame(FrameReport),
	Search(SearchReport),
	Trust { owners: TrustIndex },
}

#[derive(Debug, Serialize)]
pub struct FrameReport {
	pub version: u64,
	pub status: SessionStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	pub active: Vec<String>,
	pub expired: Vec<String>,
	pub matching: usize,
	pub category_fallback: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sample: Option<Vec<String>>,
}
impl From<&ViewState> for FrameReport {
	fn from(view: &ViewState) -> Self {
		Self {
			version: view.version,
			status: view.status,
			error: view.error.as_ref().map(|error| error.message.clone()),
			active: ids(&view.ranked.active),
			expired: ids(&view.ranked.expired),
			matching: view.ranked.matching,
			category_fallback: view.ranked.category_fallback,
			sample: match &view.sample {
				RotationFrame::Idle => None,
				frame => Some(frame.window().map(|window| ids(&window.records)).unwrap_or_default()),
			},
		}
	}
}

#[derive(Debug, Serialize)]
pub struct SearchReport {
	pub query: String,
	pub source: MatchSource,
	pub resolved_category: Option<String>,
	pub results: Vec<String>,
	pub low_confidence_or_no_match: bool,
	pub suggestions: Vec<String>,
}
impl From<&SearchOutcome> for SearchReport {
	fn from(outcome: &SearchOutcome) -> Self {
		Self {
			query: outcome.query.clone(),
			source: outcome.source,
			resolved_category: outcome.resolved_category.clone(),
			results: ids(&outcome.results),
			low_confidence_or_no_match: outcome.low_confidence_or_no_match,
			suggestions: outcome.suggestions.clone(),
		}
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = catalog_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&cfg.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let mut stdout = std::io::stdout().lock();

	replay(&args, cfg, &mut stdout).await
}

/// Drives one session through the script and writes JSON lines to `out`.
pub async fn replay<W>(args: &Args, cfg: Config, out: &mut W) -> color_eyre::Result<()>
where
	W: Write,
{
	let steps = script::load_script(&args.script)?;
	let step = Duration::from_millis(args.step_ms.max(1));
	let store = ReplayStore::new(steps, step);
	let profiles = match args.profiles.as_deref() {
		Some(path) => FileProfiles::load(path)?,
		None => FileProfiles::default(),
	};
	let collaborators = Collaborators::new(store.clone(), Arc::new(profiles));
	let engine = CatalogEngine::with_configured_classifier(cfg, collaborators)?;
	let mut session = engine.open(SessionContext {
		current_user: args.user.clone(),
		category: args.category.clone(),
	});
	let _rotation = if args.rotate { Some(session.start_configured_rotation()?) } else { None };
	let mut view = session.view();
	let mut exhausted = store.exhausted();
	let deadline =
		args.duration_ms.map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));
	let mut printed = None;

	loop {
		let current = view.borrow_and_update().clone();

		if printed != Some(current.version) {
			emit(out, &ReplayEvent::Frame(FrameReport::from(&current)))?;

			printed = Some(current.version);
		}
		if matches!(current.status, SessionStatus::Failed { .. } | SessionStatus::Closed) {
			break;
		}

		tokio::select! {
			changed = view.changed() => if changed.is_err() {
				break;
			},
			_ = wait_exhausted(&mut exhausted), if deadline.is_none() => {
				// Let the last delivered snapshot land before reporting.
				tokio::time::sleep(step).await;

				let settled = view.borrow_and_update().clone();

				if printed != Some(settled.version) {
					emit(out, &ReplayEvent::Frame(FrameReport::from(&settled)))?;
				}

				break;
			},
			_ = sleep_until(deadline) => break,
		}
	}

	for query in &args.queries {
		let outcome = session.search(query).await?;

		emit(out, &ReplayEvent::Search(SearchReport::from(&outcome)))?;
	}

	emit(out, &ReplayEvent::Trust { owners: session.trust_badges().await })?;

	session.close();

	Ok(())
}

async fn wait_exhausted(exhausted: &mut watch::Receiver<bool>) {
	if exhausted.wait_for(|done| *done).await.is_err() {
		std::future::pending::<()>().await;
	}
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
	match deadline {
		Some(deadline) => tokio::time::sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}

fn emit<W>(out: &mut W, event: &ReplayEvent) -> color_eyre::Result<()>
where
	W: Write,
{
	let line = serde_json::to_string(event)?;

	writeln!(out, "{line}")?;

	Ok(())
}

fn ids(records: &[Record]) -> Vec<String> {
	records.iter().map(|record| record.id.clone()).collect()
}
