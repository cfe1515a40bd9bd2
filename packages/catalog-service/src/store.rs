//! Record store wire types: filters, error classification, and the subscription stream.

use serde::Serialize;
use tokio::sync::mpsc;

use catalog_domain::record::RecordDocument;

const CAPABILITY_MESSAGES: [&str; 2] = ["requires an index", "index"];
const ACCESS_DENIED_MESSAGES: [&str; 3] =
	["permission denied", "permission-denied", "insufficient permissions"];
const TRANSIENT_MESSAGES: [&str; 8] = [
	"network",
	"unavailable",
	"timeout",
	"timed out",
	"cors",
	"access-control-allow-origin",
	"offline",
	"connection",
];

/// Store-side selection for a subscription.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RecordFilter {
	pub collection: String,
	/// Status value records must carry.
	pub status: String,
	/// Field the preferred query sorts on, descending.
	pub order_field: String,
}
impl From<&catalog_config::Subscription> for RecordFilter {
	fn from(cfg: &catalog_config::Subscription) -> Self {
		Self {
			collection: cfg.collection.clone(),
			status: cfg.status.clone(),
			order_field: cfg.order_field.clone(),
		}
	}
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// The backend cannot serve the query as asked, typically a missing sort index.
	CapabilityUnavailable,
	AccessDenied,
	TransientNetwork,
	NotFound,
	Unknown,
}

/// Error reported by the record store or a profile lookup.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("Store error {code}: {message}")]
pub struct StoreError {
	pub code: String,
	pub message: String,
}
impl StoreError {
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { code: code.into(), message: message.into() }
	}

	pub fn kind(&self) -> ErrorKind {
		classify(&self.code, &self.message)
	}
}

/// Maps a backend code and message to an [`ErrorKind`]. Codes win over message heuristics.
pub fn classify(code: &str, message: &str) -> ErrorKind {
	let code = code.trim().to_ascii_lowercase();
	let code = code.rsplit('/').next().unwrap_or_default();

	match code {
		"failed-precondition" => return ErrorKind::CapabilityUnavailable,
		"permission-denied" | "unauthenticated" => return ErrorKind::AccessDenied,
		"unavailable" | "deadline-exceeded" | "resource-exhausted" | "aborted" =>
			return ErrorKind::TransientNetwork,
		"not-found" => return ErrorKind::NotFound,
		_ => {},
	}

	let message = message.to_lowercase();
	let mentions = |needles: &[&str]| needles.iter().any(|needle| message.contains(needle));

	if mentions(&ACCESS_DENIED_MESSAGES) {
		ErrorKind::AccessDenied
	} else if mentions(&CAPABILITY_MESSAGES) {
		ErrorKind::CapabilityUnavailable
	} else if mentions(&TRANSIENT_MESSAGES) {
		ErrorKind::TransientNetwork
	} else if message.contains("not found") || message.contains("not-found") {
		ErrorKind::NotFound
	} else {
		ErrorKind::Unknown
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubscriptionEvent {
	/// Full replacement of the filtered collection.
	Snapshot(Vec<RecordDocument>),
	/// Terminal. Nothing follows a failure.
	Failed(StoreError),
}

/// Receiving half of a live subscription. Dropping it closes the subscription.
#[derive(Debug)]
pub struct Subscription {
	rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
}
impl Subscription {
	pub fn channel() -> (SubscriptionSender, Self) {
		let (tx, rx) = mpsc::unbounded_channel();

		(SubscriptionSender { tx }, Self { rx })
	}

	/// `None` once the store side has gone away.
	pub async fn next(&mut self) -> Option<SubscriptionEvent> {
		self.rx.recv().await
	}

	pub fn close(&mut self) {
		self.rx.close();
	}
}

/// Store-side half of a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionSender {
	tx: mpsc::UnboundedSender<SubscriptionEvent>,
}
impl SubscriptionSender {
	/// Returns `false` when the subscriber has closed.
	pub fn push_snapshot(&self, docs: Vec<RecordDocument>) -> bool {
		self.tx.send(SubscriptionEvent::Snapshot(docs)).is_ok()
	}

	pub fn fail(&self, err: StoreError) -> bool {
		self.tx.send(SubscriptionEvent::Failed(err)).is_ok()
	}

	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}

	/// Resolves once the subscriber closes or drops its half.
	pub async fn closed(&self) {
		self.tx.closed().await
	}
}
