use indexmap::IndexMap;
use serde::Serialize;

use crate::{
	Error,
	record::{Record, RecordDocument},
};

/// Identity-keyed view of one snapshot.
///
/// Built fresh from every snapshot; a later delivery of an identity replaces the earlier one in
/// place, so iteration follows first-arrival order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedCollection {
	records: IndexMap<String, Record>,
}
impl NormalizedCollection {
	pub fn from_snapshot<I>(records: I) -> Self
	where
		I: IntoIterator<Item = Record>,
	{
		let mut map = IndexMap::new();

		for record in records {
			map.insert(record.id.clone(), record);
		}

		Self { records: map }
	}

	/// Decodes then normalizes. Documents that fail to decode are returned, not dropped silently.
	pub fn from_documents(docs: &[RecordDocument]) -> (Self, Vec<Error>) {
		let mut rejected = Vec::new();
		let records = docs
			.iter()
			.filter_map(|doc| match doc.decode() {
				Ok(record) => Some(record),
				Err(err) => {
					rejected.push(err);

					None
				},
			})
			.collect::<Vec<_>>();

		(Self::from_snapshot(records), rejected)
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn get(&self, id: &str) -> Option<&Record> {
		self.records.get(id)
	}

	pub fn contains(&self, id: &str) -> bool {
		self.records.contains_key(id)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Record> {
		self.records.values()
	}

	pub fn ids(&self) -> impl Iterator<Item = &str> {
		self.records.keys().map(String::as_str)
	}
}

/// Normalizes a raw record list.
pub fn normalize<I>(records: I) -> NormalizedCollection
where
	I: IntoIterator<Item = Record>,
{
	NormalizedCollection::from_snapshot(records)
}
