use rand::{Rng, seq::index};
use serde::Serialize;

use crate::record::Record;

/// Records currently shown by the rotation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SampleWindow {
	pub records: Vec<Record>,
}
impl SampleWindow {
	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn ids(&self) -> impl Iterator<Item = &str> {
		self.records.iter().map(|record| record.id.as_str())
	}
}

/// Draws `min(size, active.len())` distinct records uniformly at random.
pub fn draw<R>(active: &[Record], size: usize, rng: &mut R) -> SampleWindow
where
	R: Rng + ?Sized,
{
	let amount = size.min(active.len());

	if amount == 0 {
		return SampleWindow::default();
	}

	let records = index::sample(rng, active.len(), amount)
		.into_iter()
		.map(|position| active[position].clone())
		.collect();

	SampleWindow { records }
}
