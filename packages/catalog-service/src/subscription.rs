//! Two-tier live subscription: a preferred sorted query, a one-way fallback to an unsorted query,
//! and backoff retries on transient failures.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::sync::watch;

use crate::{
	RecordStore,
	store::{ErrorKind, RecordFilter, StoreError, Subscription, SubscriptionEvent},
};
use catalog_domain::record::RecordDocument;

const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryTier {
	/// Filtered and sorted by creation time, descending.
	Preferred,
	/// Filtered only. Ordering happens downstream.
	Degraded,
}
impl QueryTier {
	pub fn is_ordered(self) -> bool {
		matches!(self, Self::Preferred)
	}
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	AccessDenied,
	Unknown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControllerState {
	Opening(QueryTier),
	Active(QueryTier),
	Retrying { tier: QueryTier, attempt: u32 },
	Closed,
	Failed(FailureKind),
}
impl ControllerState {
	pub fn tier(self) -> Option<QueryTier> {
		match self {
			Self::Opening(tier) | Self::Active(tier) | Self::Retrying { tier, .. } => Some(tier),
			Self::Closed | Self::Failed(_) => None,
		}
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Closed | Self::Failed(_))
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControllerEvent {
	Snapshot,
	Error(ErrorKind),
	RetryElapsed,
	Close,
}

/// What the driver must do after an event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transition {
	Publish,
	Reopen(QueryTier),
	RetryAfter { tier: QueryTier, attempt: u32 },
	Fail(FailureKind),
	Close,
	Ignore,
}

/// Pure state machine behind the subscription driver.
#[derive(Clone, Debug)]
pub struct ControllerMachine {
	state: ControllerState,
	fallback_used: bool,
	// Consecutive transient failures since the last snapshot.
	attempts: u32,
}
impl ControllerMachine {
	pub fn new() -> Self {
		Self {
			state: ControllerState::Opening(QueryTier::Preferred),
			fallback_used: false,
			attempts: 0,
		}
	}

	pub fn state(&self) -> ControllerState {
		self.state
	}

	pub fn fallback_used(&self) -> bool {
		self.fallback_used
	}

	pub fn handle(&mut self, event: ControllerEvent) -> Transition {
		if self.state.is_terminal() {
			return Transition::Ignore;
		}
		if event == ControllerEvent::Close {
			self.state = ControllerState::Closed;

			return Transition::Close;
		}

		let Some(tier) = self.state.tier() else {
			return Transition::Ignore;
		};

		match (self.state, event) {
			(ControllerState::Opening(_) | ControllerState::Active(_), ControllerEvent::Snapshot) => {
				self.state = ControllerState::Active(tier);
				self.attempts = 0;

				Transition::Publish
			},
			(ControllerState::Retrying { .. }, ControllerEvent::RetryElapsed) => {
				self.state = ControllerState::Opening(tier);

				Transition::Reopen(tier)
			},
			(_, ControllerEvent::Error(kind)) => self.on_error(tier, kind),
			_ => Transition::Ignore,
		}
	}

	fn on_error(&mut self, tier: QueryTier, kind: ErrorKind) -> Transition {
		match kind {
			ErrorKind::CapabilityUnavailable if tier == QueryTier::Preferred && !self.fallback_used => {
				self.fallback_used = true;
				self.state = ControllerState::Opening(QueryTier::Degraded);

				Transition::Reopen(QueryTier::Degraded)
			},
			ErrorKind::TransientNetwork => {
				self.attempts = self.attempts.saturating_add(1);

				let attempt = self.attempts;

				self.state = ControllerState::Retrying { tier, attempt };

				Transition::RetryAfter { tier, attempt }
			},
			ErrorKind::AccessDenied => self.fail(FailureKind::AccessDenied),
			ErrorKind::CapabilityUnavailable | ErrorKind::NotFound | ErrorKind::Unknown =>
				self.fail(FailureKind::Unknown),
		}
	}

	fn fail(&mut self, kind: FailureKind) -> Transition {
		self.state = ControllerState::Failed(kind);

		Transition::Fail(kind)
	}
}
impl Default for ControllerMachine {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
	pub base_backoff: Duration,
	pub max_backoff: Duration,
}
impl RetryPolicy {
	/// `base * 2^(attempt - 1)`, capped at `max_backoff`.
	pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
		let exp = attempt.max(1).saturating_sub(1).min(MAX_BACKOFF_EXPONENT);

		self.base_backoff.saturating_mul(1 << exp).min(self.max_backoff)
	}
}
impl From<&catalog_config::Subscription> for RetryPolicy {
	fn from(cfg: &catalog_config::Subscription) -> Self {
		Self {
			base_backoff: Duration::from_millis(cfg.retry_base_backoff_ms),
			max_backoff: Duration::from_millis(cfg.retry_max_backoff_ms),
		}
	}
}

/// Receives the driver's output.
pub trait ControllerSink
where
	Self: Send + Sync,
{
	/// One-shot page fetched before the first subscription opens.
	fn prime(&self, docs: Vec<RecordDocument>);

	fn publish(&self, tier: QueryTier, docs: Vec<RecordDocument>);

	fn fail(&self, kind: FailureKind, error: &StoreError);
}

pub struct ControllerDriver {
	pub store: Arc<dyn RecordStore>,
	pub filter: RecordFilter,
	pub retry: RetryPolicy,
	pub prime_page_size: usize,
}
impl ControllerDriver {
	/// Runs until the controller fails or `shutdown` flips. Only one subscription is held at a
	/// time; the previous one is dropped before the next is opened.
	pub async fn run(self, sink: Arc<dyn ControllerSink>, mut shutdown: watch::Receiver<bool>) {
		let mut machine = ControllerMachine::new();

		if self.prime_page_size > 0 {
			tokio::select! {
				biased;
				_ = shutdown.changed() => return,
				fetched = self.store.fetch_once(&self.filter, self.prime_page_size) => match fetched {
					Ok(docs) => sink.prime(docs),
					Err(err) => tracing::warn!(error = %err, "Prime fetch failed. Waiting for the subscription."),
				},
			}
		}

		let mut tier = QueryTier::Preferred;

		loop {
			tracing::info!(collection = %self.filter.collection, ?tier, "Opening record subscription.");

			let opened = tokio::select! {
				biased;
				_ = shutdown.changed() => {
					machine.handle(ControllerEvent::Close);

					return;
				},
				opened = self.store.subscribe(&self.filter, tier.is_ordered()) => opened,
			};
			let (transition, error) = match opened {
				Ok(subscription) => {
					match pump(&mut machine, subscription, tier, sink.as_ref(), &mut shutdown).await {
						Some(outcome) => outcome,
						None => return,
					}
				},
				Err(err) => (machine.handle(ControllerEvent::Error(err.kind())), Some(err)),
			};

			let reason = error.as_ref().map(ToString::to_string).unwrap_or_default();

			match transition {
				Transition::Reopen(next) => {
					tracing::warn!(
						error = %reason,
						"Preferred query unavailable. Falling back to the unsorted query."
					);

					tier = next;
				},
				Transition::RetryAfter { attempt, .. } => {
					let delay = self.retry.backoff_for_attempt(attempt);

					tracing::warn!(
						error = %reason,
						attempt,
						delay_ms = delay.as_millis() as u64,
						"Record subscription interrupted. Retrying."
					);

					tokio::select! {
						biased;
						_ = shutdown.changed() => {
							machine.handle(ControllerEvent::Close);

							return;
						},
						_ = tokio::time::sleep(delay) => {},
					}

					if let Transition::Reopen(next) = machine.handle(ControllerEvent::RetryElapsed) {
						tier = next;
					}
				},
				Transition::Fail(kind) => {
					let error = error.unwrap_or_else(|| StoreError::new("unknown", "Subscription failed."));

					tracing::warn!(error = %error, ?kind, "Record subscription failed.");

					sink.fail(kind, &error);

					return;
				},
				Transition::Publish | Transition::Close | Transition::Ignore => return,
			}
		}
	}
}

/// Forwards snapshots until the subscription errors or ends. Returns `None` on shutdown.
async fn pump(
	machine: &mut ControllerMachine,
	mut subscription: Subscription,
	tier: QueryTier,
	sink: &dyn ControllerSink,
	shutdown: &mut watch::Receiver<bool>,
) -> Option<(Transition, Option<StoreError>)> {
	loop {
		let event = tokio::select! {
			biased;
			_ = shutdown.changed() => {
				subscription.close();
				machine.handle(ControllerEvent::Close);

				return None;
			},
			event = subscription.next() => event,
		};

		match event {
			Some(SubscriptionEvent::Snapshot(docs)) => {
				if machine.handle(ControllerEvent::Snapshot) == Transition::Publish {
					sink.publish(tier, docs);
				}
			},
			Some(SubscriptionEvent::Failed(err)) => {
				subscription.close();

				return Some((machine.handle(ControllerEvent::Error(err.kind())), Some(err)));
			},
			None => {
				let err = StoreError::new("aborted", "Subscription stream ended.");

				return Some((machine.handle(ControllerEvent::Error(ErrorKind::TransientNetwork)), Some(err)));
			},
		}
	}
}
