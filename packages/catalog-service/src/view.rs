use serde::Serialize;
use time::OffsetDateTime;

use crate::{
	rotation::RotationFrame,
	subscription::{FailureKind, QueryTier},
};
use catalog_domain::{
	normalize::NormalizedCollection,
	overlay::{self, ClassifierVerdict, SearchOutcome, SearchPolicy},
	rank::{self, RankedView},
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
	#[default]
	Loading,
	Live {
		tier: QueryTier,
	},
	Failed {
		kind: FailureKind,
	},
	Closed,
}

/// Only failures that end the session are surfaced here.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ViewError {
	pub kind: FailureKind,
	pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchState {
	pub query: String,
	pub verdict: Option<ClassifierVerdict>,
	pub outcome: SearchOutcome,
}

/// Everything a consumer needs to render one screen. `version` grows with every change.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ViewState {
	pub version: u64,
	pub status: SessionStatus,
	pub error: Option<ViewError>,
	pub category: Option<String>,
	pub current_user: Option<String>,
	pub collection: NormalizedCollection,
	pub ranked: RankedView,
	pub sample: RotationFrame,
	pub search: Option<SearchState>,
}
impl ViewState {
	pub fn is_closed(&self) -> bool {
		self.status == SessionStatus::Closed
	}

	/// Recomputes ranking and the stored search from the current collection.
	pub fn refresh(&mut self, now: OffsetDateTime, policy: &SearchPolicy) {
		self.ranked = rank::rank(
			&self.collection,
			now,
			self.category.as_deref(),
			self.current_user.as_deref(),
		);

		if let Some(search) = self.search.as_mut() {
			search.outcome =
				overlay::search(&search.query, &self.ranked, search.verdict.as_ref(), policy);
		}
	}
}
