use indexmap::IndexSet;
use unicode_segmentation::UnicodeSegmentation;

use crate::{keywords, record::Record};

/// Type-ahead suggestions drawn from the records currently in view.
///
/// Category labels that contain or are contained in the query come first, then title words, then
/// description words. Words must be at least `min_word_chars` long and contain the query.
pub fn suggestions<'a, I>(query: &str, records: I, limit: usize, min_word_chars: usize) -> Vec<String>
where
	I: IntoIterator<Item = &'a Record>,
{
	let needle = query.trim().to_lowercase();

	if needle.is_empty() || limit == 0 {
		return Vec::new();
	}

	let records = records.into_iter().collect::<Vec<_>>();
	let mut out = IndexSet::new();
	let labels = records
		.iter()
		.flat_map(|record| record.categories.iter())
		.map(|category| keywords::category_label(category).to_lowercase())
		.collect::<IndexSet<_>>();

	for label in labels {
		if label.contains(&needle) || needle.contains(&label) {
			out.insert(label);
		}
	}

	let title_words = matching_words(records.iter().map(|record| record.title.as_str()), &needle, min_word_chars);
	let description_words =
		matching_words(records.iter().map(|record| record.description.as_str()), &needle, min_word_chars);

	for word in title_words.into_iter().chain(description_words) {
		if out.len() >= limit {
			break;
		}

		out.insert(word);
	}

	out.into_iter().take(limit).collect()
}

fn matching_words<'a, I>(texts: I, needle: &str, min_word_chars: usize) -> IndexSet<String>
where
	I: Iterator<Item = &'a str>,
{
	texts
		.flat_map(|text| text.unicode_words())
		.map(str::to_lowercase)
		.filter(|word| word.chars().count() >= min_word_chars && word.contains(needle))
		.collect()
}
