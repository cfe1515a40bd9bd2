use std::cmp::Reverse;

use serde::Serialize;
use time::OffsetDateTime;

use crate::{normalize::NormalizedCollection, record::Record};

/// Composite sort key used while a category filter is active.
///
/// Field order is significant: the derived `Ord` compares owned matches first, then matches,
/// then recency.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct RankingKey {
	owned_and_matching: Reverse<bool>,
	matching: Reverse<bool>,
	created_at: Reverse<OffsetDateTime>,
}
impl RankingKey {
	pub fn for_record(record: &Record, category: &str, current_user: Option<&str>) -> Self {
		let matching = record.matches_category(category);
		let owned = current_user.map(|user| record.is_owned_by(user)).unwrap_or(false);

		Self {
			owned_and_matching: Reverse(owned && matching),
			matching: Reverse(matching),
			created_at: Reverse(record.created_at),
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RankedView {
	pub active: Vec<Record>,
	pub expired: Vec<Record>,
	/// Length of the leading run of `active` that matches the category filter. Equals
	/// `active.len()` when no filter is set.
	pub matching: usize,
	/// Set when a category filter is active and no active record matches it. The caller decides
	/// whether to show the full active list instead.
	pub category_fallback: bool,
}
impl RankedView {
	pub fn matching(&self) -> &[Record] {
		&self.active[..self.matching]
	}

	pub fn full_list(&self) -> impl Iterator<Item = &Record> {
		self.active.iter().chain(self.expired.iter())
	}

	pub fn len(&self) -> usize {
		self.active.len() + self.expired.len()
	}

	pub fn is_empty(&self) -> bool {
		self.active.is_empty() && self.expired.is_empty()
	}
}

/// Splits live records into `(active, expired)` in collection order.
pub fn partition(
	collection: &NormalizedCollection,
	now: OffsetDateTime,
) -> (Vec<Record>, Vec<Record>) {
	collection.iter().filter(|record| record.is_live()).cloned().partition(|record| !record.is_expired_at(now))
}

pub fn rank(
	collection: &NormalizedCollection,
	now: OffsetDateTime,
	category: Option<&str>,
	current_user: Option<&str>,
) -> RankedView {
	let (mut active, mut expired) = partition(collection, now);
	let category = category.map(str::trim).filter(|value| !value.is_empty());

	expired.sort_by_key(|record| Reverse(record.created_at));

	let Some(category) = category else {
		active.sort_by_key(|record| Reverse(record.created_at));

		let matching = active.len();

		return RankedView { active, expired, matching, category_fallback: false };
	};

	active.sort_by_key(|record| RankingKey::for_record(record, category, current_user));

	let matching = active.iter().take_while(|record| record.matches_category(category)).count();

	RankedView { active, expired, matching, category_fallback: matching == 0 }
}

#[cfg(test)]
mod tests {
	use time::{Duration, OffsetDateTime, macros::datetime};

	use crate::{
		normalize::normalize,
		rank::rank,
		record::{Record, RecordStatus},
	};

	const NOW: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

	fn record(id: &str, created_secs: i64, category: &str, owner: &str) -> Record {
		Record {
			id: id.to_string(),
			title: id.to_string(),
			description: String::new(),
			categories: vec![category.to_string()],
			budget: 100.0,
			location: "Delhi".to_string(),
			deadline: None,
			created_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(created_secs),
			owner_id: owner.to_string(),
			status: RecordStatus::Live,
		}
	}

	fn ids(records: &[Record]) -> Vec<&str> {
		records.iter().map(|record| record.id.as_str()).collect()
	}

	#[test]
	fn owned_matching_records_rank_first() {
		let collection = normalize(vec![
			record("A", 5, "art", "U1"),
			record("B", 10, "books", "U2"),
			record("C", 1, "art", "U3"),
		]);
		let view = rank(&collection, NOW, Some("art"), Some("U1"));

		assert_eq!(ids(view.matching()), vec!["A", "C"]);
		assert_eq!(ids(&view.active), vec!["A", "C", "B"]);
		assert!(!view.category_fallback);
	}

	#[test]
	fn without_filter_sorts_by_recency() {
		let collection = normalize(vec![
			record("A", 5, "art", "U1"),
			record("B", 10, "books", "U2"),
			record("C", 1, "art", "U3"),
		]);
		let view = rank(&collection, NOW, None, Some("U1"));

		assert_eq!(ids(&view.active), vec!["B", "A", "C"]);
		assert_eq!(view.matching, 3);
	}

	#[test]
	fn partitions_on_deadline() {
		let mut past = record("past", 3, "art", "U1");
		let mut future = record("future", 2, "art", "U1");
		let mut boundary = record("boundary", 1, "art", "U1");
		let open = record("open", 4, "art", "U1");

		past.deadline = Some(NOW - Duration::minutes(1));
		future.deadline = Some(NOW + Duration::days(1));
		boundary.deadline = Some(NOW);

		let view = rank(&normalize(vec![past, future, boundary, open]), NOW, None, None);

		assert_eq!(ids(&view.active), vec!["open", "future", "boundary"]);
		assert_eq!(ids(&view.expired), vec!["past"]);
	}

	#[test]
	fn expired_ignores_category_filter() {
		let mut old_art = record("old-art", 1, "art", "U1");
		let mut old_books = record("old-books", 9, "books", "U2");

		old_art.deadline = Some(NOW - Duration::days(2));
		old_books.deadline = Some(NOW - Duration::days(2));

		let view = rank(&normalize(vec![old_art, old_books]), NOW, Some("art"), Some("U1"));

		assert_eq!(ids(&view.expired), vec!["old-books", "old-art"]);
		assert!(view.active.is_empty());
		assert!(view.category_fallback);
	}

	#[test]
	fn only_live_records_are_ranked() {
		let mut pending = record("pending", 1, "art", "U1");

		pending.status = RecordStatus::Pending;

		let view = rank(&normalize(vec![pending, record("live", 2, "art", "U1")]), NOW, None, None);

		assert_eq!(ids(&view.active), vec!["live"]);
	}

	#[test]
	fn empty_category_match_raises_fallback_flag() {
		let collection = normalize(vec![record("A", 5, "art", "U1"), record("B", 4, "books", "U1")]);
		let view = rank(&collection, NOW, Some("pets"), Some("U1"));

		assert!(view.category_fallback);
		assert!(view.matching().is_empty());
		assert_eq!(ids(&view.active), vec!["A", "B"]);
	}

	#[test]
	fn ranking_is_deterministic_and_ignores_unrelated_fields() {
		let base = vec![
			record("A", 5, "art", "U2"),
			record("B", 5, "art", "U2"),
			record("C", 7, "books", "U2"),
			record("D", 5, "art", "U1"),
		];
		let first = rank(&normalize(base.clone()), NOW, Some("art"), Some("U1"));
		let second = rank(&normalize(base.clone()), NOW, Some("art"), Some("U1"));

		assert_eq!(first, second);
		assert_eq!(ids(first.matching()), vec!["D", "A", "B"]);

		let mut changed = base;

		changed[2].title = "Completely different".to_string();
		changed[2].budget = 1.0;
		changed[2].created_at = OffsetDateTime::UNIX_EPOCH + Duration::seconds(99);

		let third = rank(&normalize(changed), NOW, Some("art"), Some("U1"));

		assert_eq!(ids(third.matching()), ids(first.matching()));
	}
}
