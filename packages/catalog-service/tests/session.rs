use std::{collections::HashSet, sync::Arc, time::Duration};

use rand::{SeedableRng, rngs::StdRng};
use time::{OffsetDateTime, macros::datetime};
use tokio::sync::watch;

use catalog_domain::{overlay::MatchSource, record::RecordDocument};
use catalog_service::{
	CatalogEngine, CatalogSession, Collaborators, Error, FailureKind, QueryTier, RotationFrame,
	SessionContext, SessionStatus, StoreError, ViewState,
};
use catalog_testkit::{FixedClock, RecordBuilder, ScriptedStore, StaticProfiles, StubClassifier};

const NOW: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

fn at(secs: i64) -> OffsetDateTime {
	OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(secs)
}

fn config() -> catalog_config::Config {
	catalog_testkit::test_config().expect("Test config must parse.")
}

fn open(
	cfg: catalog_config::Config,
	collaborators: Collaborators,
	ctx: SessionContext,
) -> CatalogSession {
	CatalogEngine::new(cfg, collaborators).expect("Engine must build.").open(ctx)
}

fn open_default(store: &Arc<ScriptedStore>) -> CatalogSession {
	open(
		config(),
		catalog_testkit::collaborators(store.clone(), FixedClock::new(NOW)),
		SessionContext::default(),
	)
}

fn abc_snapshot() -> Vec<RecordDocument> {
	vec![
		RecordBuilder::new("A").category("art").owner("U1").created_at(at(5)).build(),
		RecordBuilder::new("B").category("books").owner("U2").created_at(at(10)).build(),
		RecordBuilder::new("C").category("art").owner("U3").created_at(at(1)).build(),
	]
}

fn many(count: usize) -> Vec<RecordDocument> {
	(0..count)
		.map(|idx| {
			RecordBuilder::new(&format!("r{idx}"))
				.category("other")
				.owner("U9")
				.created_at(at(idx as i64))
				.build()
		})
		.collect()
}

fn ids(records: &[catalog_domain::record::Record]) -> Vec<&str> {
	records.iter().map(|record| record.id.as_str()).collect()
}

async fn wait_until<F>(rx: &mut watch::Receiver<ViewState>, mut pred: F) -> ViewState
where
	F: FnMut(&ViewState) -> bool,
{
	tokio::time::timeout(Duration::from_secs(600), rx.wait_for(|view| pred(view)))
		.await
		.expect("Timed out waiting for the view.")
		.expect("View channel closed.")
		.clone()
}

#[tokio::test(start_paused = true)]
async fn preferred_snapshot_goes_live() {
	let store = ScriptedStore::new();
	let session = open_default(&store);
	let mut view = session.view();

	assert_eq!(session.snapshot().status, SessionStatus::Loading);

	store.wait_for_opens(1).await;

	assert!(store.push(abc_snapshot()));

	let live = wait_until(&mut view, |view| view.status != SessionStatus::Loading).await;

	assert_eq!(live.status, SessionStatus::Live { tier: QueryTier::Preferred });
	assert_eq!(ids(&live.ranked.active), vec!["B", "A", "C"]);
	assert_eq!(store.open_tiers(), vec![true]);
	assert_eq!(store.opened()[0].filter.collection, "enquiries");
}

#[tokio::test(start_paused = true)]
async fn capability_error_falls_back_exactly_once() {
	let store = ScriptedStore::new();
	let session = open_default(&store);
	let mut view = session.view();

	store.wait_for_opens(1).await;
	store.fail(StoreError::new("failed-precondition", "The query requires an index."));
	store.wait_for_opens(2).await;

	assert_eq!(store.open_tiers(), vec![true, false]);
	assert!(!store.opened()[0].is_live());

	store.push(abc_snapshot());

	let live = wait_until(&mut view, |view| view.status != SessionStatus::Loading).await;

	assert_eq!(live.status, SessionStatus::Live { tier: QueryTier::Degraded });
	assert_eq!(ids(&live.ranked.active), vec!["B", "A", "C"]);

	store.fail(StoreError::new("failed-precondition", "Still no index."));

	let failed = wait_until(&mut view, |view| matches!(view.status, SessionStatus::Failed { .. })).await;

	assert_eq!(failed.status, SessionStatus::Failed { kind: FailureKind::Unknown });

	tokio::time::sleep(Duration::from_secs(600)).await;

	assert_eq!(store.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_open_on_preferred_tier_also_falls_back() {
	let store = ScriptedStore::new();

	store.fail_next_open(StoreError::new("unknown", "This query requires an index."));

	let _session = open_default(&store);

	store.wait_for_opens(2).await;

	assert_eq!(store.open_tiers(), vec![true, false]);
	assert_eq!(store.live_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn access_denied_surfaces_an_empty_failed_view() {
	let store = ScriptedStore::new();

	store.fail_next_open(StoreError::new("permission-denied", "Missing or insufficient permissions."));

	let session = open_default(&store);
	let mut view = session.view();
	let failed = wait_until(&mut view, |view| matches!(view.status, SessionStatus::Failed { .. })).await;

	assert_eq!(failed.status, SessionStatus::Failed { kind: FailureKind::AccessDenied });
	assert_eq!(failed.error.as_ref().map(|error| error.kind), Some(FailureKind::AccessDenied));
	assert!(failed.ranked.is_empty());

	tokio::time::sleep(Duration::from_secs(600)).await;

	assert_eq!(store.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_error_keeps_the_view_and_resubscribes_after_backoff() {
	let store = ScriptedStore::new();
	let session = open_default(&store);
	let mut view = session.view();

	store.wait_for_opens(1).await;
	store.push(abc_snapshot());
	wait_until(&mut view, |view| view.collection.len() == 3).await;

	store.fail(StoreError::new("unavailable", "The service is currently unavailable."));
	tokio::time::sleep(Duration::from_millis(400)).await;

	assert_eq!(store.open_count(), 1);

	let kept = session.snapshot();

	assert_eq!(kept.status, SessionStatus::Live { tier: QueryTier::Preferred });
	assert_eq!(kept.collection.len(), 3);

	store.wait_for_opens(2).await;

	assert_eq!(store.open_tiers(), vec![true, true]);

	store.push(many(2));

	let refreshed = wait_until(&mut view, |view| view.collection.len() == 2).await;

	assert_eq!(refreshed.status, SessionStatus::Live { tier: QueryTier::Preferred });
}

#[tokio::test(start_paused = true)]
async fn ended_stream_is_retried_on_the_same_tier() {
	let store = ScriptedStore::new();
	let _session = open_default(&store);

	store.wait_for_opens(1).await;
	store.end();
	store.wait_for_opens(2).await;

	assert_eq!(store.open_tiers(), vec![true, true]);
}

#[tokio::test(start_paused = true)]
async fn consecutive_transient_failures_back_off_exponentially() {
	let store = ScriptedStore::new();

	for _ in 0..5 {
		store.fail_next_open(StoreError::new("unavailable", "The service is currently unavailable."));
	}

	let start = tokio::time::Instant::now();
	let session = open_default(&store);
	let mut view = session.view();
	let mut opened_at = Vec::new();

	for count in 1..=6 {
		store.wait_for_opens(count).await;
		opened_at.push(start.elapsed().as_millis());
	}

	// 500 doubling per failure, capped at 4000.
	assert_eq!(opened_at, vec![0, 500, 1_500, 3_500, 7_500, 11_500]);
	assert_eq!(store.open_tiers(), vec![true; 6]);

	store.push(abc_snapshot());
	wait_until(&mut view, |view| view.collection.len() == 3).await;

	let recovered = tokio::time::Instant::now();

	store.fail(StoreError::new("unavailable", "The service is currently unavailable."));
	store.wait_for_opens(7).await;

	assert_eq!(recovered.elapsed().as_millis(), 500);
}

#[tokio::test(start_paused = true)]
async fn snapshots_replace_rather_than_merge() {
	let store = ScriptedStore::new();
	let session = open_default(&store);
	let mut view = session.view();
	let x = RecordBuilder::new("X").created_at(at(1)).build();
	let y = RecordBuilder::new("Y").created_at(at(2)).build();
	let z = RecordBuilder::new("Z").created_at(at(3)).build();

	store.wait_for_opens(1).await;
	store.push(vec![x, y.clone(), y.clone()]);
	wait_until(&mut view, |view| view.collection.len() == 2).await;
	store.push(vec![y, z]);

	let second = wait_until(&mut view, |view| view.collection.contains("Z")).await;

	assert_eq!(second.collection.ids().collect::<Vec<_>>(), vec!["Y", "Z"]);
}

#[tokio::test(start_paused = true)]
async fn prime_fetch_fills_the_loading_view() {
	let store = ScriptedStore::new();
	let mut cfg = config();

	cfg.subscription.prime_page_size = 2;
	store.set_prime(Ok(many(5)));

	let session =
		open(cfg, catalog_testkit::collaborators(store.clone(), FixedClock::new(NOW)), SessionContext::default());

	store.wait_for_opens(1).await;

	let primed = session.snapshot();

	assert_eq!(store.fetches(), vec![2]);
	assert_eq!(primed.status, SessionStatus::Loading);
	assert_eq!(primed.collection.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn category_filter_ranks_owned_matches_first() {
	let store = ScriptedStore::new();
	let session = open(
		config(),
		catalog_testkit::collaborators(store.clone(), FixedClock::new(NOW)),
		SessionContext { current_user: Some("U1".to_string()), category: Some("art".to_string()) },
	);
	let mut view = session.view();

	store.wait_for_opens(1).await;
	store.push(abc_snapshot());

	let ranked = wait_until(&mut view, |view| view.collection.len() == 3).await.ranked;

	assert_eq!(ids(ranked.matching()), vec!["A", "C"]);
	assert_eq!(ids(&ranked.active), vec!["A", "C", "B"]);

	session.set_category(Some("pets")).expect("Session is open.");

	let fallback = session.snapshot().ranked;

	assert!(fallback.category_fallback);
	assert_eq!(fallback.active.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn clock_decides_partitions() {
	let store = ScriptedStore::new();
	let clock = FixedClock::new(NOW);
	let session =
		open(config(), catalog_testkit::collaborators(store.clone(), clock.clone()), SessionContext::default());
	let mut view = session.view();

	store.wait_for_opens(1).await;
	store.push(vec![
		RecordBuilder::new("soon").deadline(NOW + time::Duration::hours(1)).build(),
		RecordBuilder::new("open").build(),
		RecordBuilder::new("old").deadline(NOW - time::Duration::hours(1)).build(),
	]);

	let first = wait_until(&mut view, |view| view.collection.len() == 3).await;

	assert_eq!(first.ranked.expired.len(), 1);

	clock.advance(time::Duration::hours(2));
	session.refresh().expect("Session is open.");

	assert_eq!(session.snapshot().ranked.expired.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn rotation_frames_rerank_against_the_same_clock() {
	let store = ScriptedStore::new();
	let clock = FixedClock::new(NOW);
	let mut session =
		open(config(), catalog_testkit::collaborators(store.clone(), clock.clone()), SessionContext::default());
	let mut view = session.view();

	store.wait_for_opens(1).await;
	store.push(vec![
		RecordBuilder::new("soon")
			.created_at(at(2))
			.deadline(NOW + time::Duration::hours(1))
			.build(),
		RecordBuilder::new("open").created_at(at(1)).build(),
	]);
	wait_until(&mut view, |view| view.collection.len() == 2).await;

	let _handle = session
		.start_rotation_with_rng(3, Duration::from_secs(60), Box::new(StdRng::seed_from_u64(4)))
		.expect("Session is open.");
	let first =
		wait_until(&mut view, |view| matches!(view.sample, RotationFrame::Showing { tick: 1, .. })).await;

	assert_eq!(ids(&first.ranked.active), vec!["soon", "open"]);

	clock.advance(time::Duration::hours(2));

	let second =
		wait_until(&mut view, |view| matches!(view.sample, RotationFrame::Showing { tick: 2, .. })).await;
	let window = second.sample.window().cloned().unwrap_or_default();

	assert_eq!(window.ids().collect::<Vec<_>>(), vec!["open"]);
	assert_eq!(ids(&second.ranked.active), vec!["open"]);
	assert_eq!(ids(&second.ranked.expired), vec!["soon"]);
}

#[tokio::test(start_paused = true)]
async fn rotation_draws_bounded_distinct_windows() {
	let store = ScriptedStore::new();
	let mut session = open_default(&store);
	let mut view = session.view();

	store.wait_for_opens(1).await;
	store.push(many(10));
	wait_until(&mut view, |view| view.collection.len() == 10).await;

	let handle = session
		.start_rotation_with_rng(3, Duration::from_secs(60), Box::new(StdRng::seed_from_u64(9)))
		.expect("Session is open.");
	let shown = wait_until(&mut view, |view| matches!(view.sample, RotationFrame::Showing { .. })).await;
	let window = shown.sample.window().cloned().unwrap_or_default();

	assert_eq!(window.len(), 3);
	assert_eq!(window.ids().collect::<HashSet<_>>().len(), 3);
	assert!(window.ids().all(|id| shown.collection.contains(id)));
	assert_eq!(handle.current(), window);

	let next =
		wait_until(&mut view, |view| matches!(view.sample, RotationFrame::Showing { tick: 2, .. })).await;

	assert_eq!(next.sample.window().map(|window| window.len()), Some(3));
}

#[tokio::test(start_paused = true)]
async fn rotation_over_empty_active_keeps_ticking() {
	let store = ScriptedStore::new();
	let mut session = open_default(&store);
	let mut view = session.view();
	let _handle = session.start_rotation(3, Duration::from_secs(60)).expect("Session is open.");
	let third =
		wait_until(&mut view, |view| matches!(view.sample, RotationFrame::Showing { tick: 3, .. })).await;

	assert_eq!(third.sample.window().map(|window| window.len()), Some(0));
}

#[tokio::test(start_paused = true)]
async fn closing_stops_rotation_and_subscription() {
	let store = ScriptedStore::new();
	let mut session = open_default(&store);

	store.wait_for_opens(1).await;
	store.push(many(4));

	let handle = session.start_rotation(3, Duration::from_secs(60)).expect("Session is open.");

	tokio::time::sleep(Duration::from_secs(1)).await;
	session.close();

	let closed = session.snapshot();
	let frame = handle.frame();

	tokio::time::sleep(Duration::from_secs(600)).await;

	assert_eq!(closed.status, SessionStatus::Closed);
	assert_eq!(session.snapshot().version, closed.version);
	assert_eq!(handle.frame(), frame);
	assert!(!handle.is_running());
	assert_eq!(store.live_count(), 0);
	assert!(!store.push(many(1)));
	assert!(matches!(session.set_category(Some("art")), Err(Error::SessionClosed)));
}

#[tokio::test(start_paused = true)]
async fn unmatched_search_returns_everything_flagged() {
	let store = ScriptedStore::new();
	let session = open_default(&store);
	let mut view = session.view();

	store.wait_for_opens(1).await;
	store.push(abc_snapshot());
	wait_until(&mut view, |view| view.collection.len() == 3).await;

	let outcome = session.search("zeppelin").await.expect("Session is open.");

	assert_eq!(outcome.results.len(), 3);
	assert!(outcome.low_confidence_or_no_match);
	assert_eq!(session.snapshot().search.map(|search| search.query), Some("zeppelin".to_string()));

	session.clear_search().expect("Session is open.");

	assert!(session.snapshot().search.is_none());
}

#[tokio::test(start_paused = true)]
async fn slow_classifier_times_out_to_keywords() {
	let store = ScriptedStore::new();
	let classifier =
		Arc::new(StubClassifier::returning("pets", 0.9).with_delay(Duration::from_secs(5)));
	let collaborators = catalog_testkit::collaborators(store.clone(), FixedClock::new(NOW))
		.with_classifier(classifier.clone());
	let session = open(config(), collaborators, SessionContext::default());
	let mut view = session.view();

	store.wait_for_opens(1).await;
	store.push(vec![
		RecordBuilder::new("laptop").category("electronics-gadgets").build(),
		RecordBuilder::new("dog").category("pets").build(),
	]);
	wait_until(&mut view, |view| view.collection.len() == 2).await;

	let outcome = session.search("laptop").await.expect("Session is open.");

	assert_eq!(classifier.calls(), 1);
	assert_eq!(outcome.source, MatchSource::Keyword);
	assert!(!outcome.used_classifier);
	assert_eq!(ids(&outcome.results), vec!["laptop"]);
}

#[tokio::test(start_paused = true)]
async fn failing_classifier_falls_back_silently() {
	let store = ScriptedStore::new();
	let collaborators = catalog_testkit::collaborators(store.clone(), FixedClock::new(NOW))
		.with_classifier(Arc::new(StubClassifier::failing()));
	let session = open(config(), collaborators, SessionContext::default());
	let mut view = session.view();

	store.wait_for_opens(1).await;
	store.push(vec![
		RecordBuilder::new("laptop").title("Gaming laptop").category("electronics-gadgets").build(),
		RecordBuilder::new("sofa").title("Sofa").category("home-furniture").build(),
	]);
	wait_until(&mut view, |view| view.collection.len() == 2).await;

	let outcome = session.search("laptop").await.expect("Session is open.");

	assert_eq!(outcome.source, MatchSource::Keyword);
	assert_eq!(outcome.resolved_category.as_deref(), Some("electronics-gadgets"));
	assert_eq!(ids(&outcome.results), vec!["laptop"]);
	assert!(!outcome.low_confidence_or_no_match);
}

#[tokio::test(start_paused = true)]
async fn classifier_verdict_is_reapplied_to_new_snapshots() {
	let store = ScriptedStore::new();
	let classifier = Arc::new(StubClassifier::returning("automobile", 0.9));
	let collaborators = catalog_testkit::collaborators(store.clone(), FixedClock::new(NOW))
		.with_classifier(classifier.clone());
	let session = open(config(), collaborators, SessionContext::default());
	let mut view = session.view();
	let bike = RecordBuilder::new("bike").category("automobile").created_at(at(1)).build();

	store.wait_for_opens(1).await;
	store.push(vec![bike.clone(), RecordBuilder::new("sofa").category("home-furniture").build()]);
	wait_until(&mut view, |view| view.collection.len() == 2).await;

	let outcome = session.search("wheels").await.expect("Session is open.");

	assert!(outcome.used_classifier);
	assert_eq!(ids(&outcome.results), vec!["bike"]);

	store.push(vec![bike, RecordBuilder::new("car").category("automobile").created_at(at(2)).build()]);

	let updated = wait_until(&mut view, |view| view.collection.contains("car")).await;
	let search = updated.search.expect("Search must persist across snapshots.");

	assert_eq!(ids(&search.outcome.results), vec!["car", "bike"]);
	assert_eq!(classifier.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn trust_badges_degrade_on_lookup_failures() {
	let store = ScriptedStore::new();
	let profiles = Arc::new(
		StaticProfiles::new()
			.with_profile("U1", true)
			.with_failure("U2", StoreError::new("unavailable", "offline"))
			.with_failure("U3", StoreError::new("not-found", "no profile")),
	);
	let collaborators =
		Collaborators::new(store.clone(), profiles.clone()).with_clock(FixedClock::new(NOW));
	let session = open(config(), collaborators, SessionContext::default());
	let mut view = session.view();

	store.wait_for_opens(1).await;
	store.push(abc_snapshot());
	wait_until(&mut view, |view| view.collection.len() == 3).await;

	let trust = session.trust_badges().await;

	assert_eq!(trust.get("U1"), Some(true));
	assert_eq!(trust.get("U2"), None);
	assert_eq!(trust.get("U3"), None);
	assert_eq!(profiles.lookups(), 3);
}

#[tokio::test(start_paused = true)]
async fn rejected_documents_do_not_break_the_view() {
	let store = ScriptedStore::new();
	let session = open_default(&store);
	let mut view = session.view();

	store.wait_for_opens(1).await;
	store.push(vec![
		RecordBuilder::new("good").build(),
		RecordBuilder::new("bad").status("archived").build(),
	]);

	let live = wait_until(&mut view, |view| view.status != SessionStatus::Loading).await;

	assert_eq!(live.collection.ids().collect::<Vec<_>>(), vec!["good"]);
}

#[test]
fn invalid_config_is_rejected() {
	let mut cfg = config();

	cfg.rotation.sample_size = 0;

	let store = ScriptedStore::new();
	let result = CatalogEngine::new(
		cfg,
		catalog_testkit::collaborators(store, FixedClock::new(NOW)),
	);

	assert!(matches!(result, Err(Error::InvalidConfig { .. })));
}

#[tokio::test(start_paused = true)]
async fn configured_rules_classifier_drives_search() {
	let store = ScriptedStore::new();
	let mut cfg = config();

	cfg.classifier.mode = "rules".to_string();

	let engine = CatalogEngine::with_configured_classifier(
		cfg,
		catalog_testkit::collaborators(store.clone(), FixedClock::new(NOW)),
	)
	.expect("Engine must build.");
	let session = engine.open(SessionContext::default());
	let mut view = session.view();

	store.wait_for_opens(1).await;
	store.push(vec![
		RecordBuilder::new("shaadi").category("wedding-events").build(),
		RecordBuilder::new("flat").category("real-estate").build(),
	]);
	wait_until(&mut view, |view| view.collection.len() == 2).await;

	let outcome =
		session.search("bridal wedding party catering food near a rented house").await.expect("open");

	assert_eq!(outcome.source, MatchSource::Classifier);
	assert_eq!(outcome.resolved_category.as_deref(), Some("wedding-events"));
	assert_eq!(ids(&outcome.results), vec!["shaadi"]);
}

#[test]
fn http_mode_without_endpoint_is_rejected() {
	let mut cfg = config();

	cfg.classifier.mode = "http".to_string();

	let result = CatalogEngine::with_configured_classifier(
		cfg,
		catalog_testkit::collaborators(ScriptedStore::new(), FixedClock::new(NOW)),
	);

	assert!(matches!(result, Err(Error::InvalidConfig { .. })));
}
