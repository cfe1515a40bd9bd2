use serde::{Deserialize, Serialize};

use crate::{keywords, rank::RankedView, record::Record, suggest};

/// External classifier hint for a query.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ClassifierVerdict {
	pub category: String,
	pub confidence: f32,
	#[serde(default)]
	pub reasoning: String,
	#[serde(default)]
	pub alternatives: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchPolicy {
	pub suggestion_limit: usize,
	pub min_suggestion_word_chars: usize,
	pub min_classifier_confidence: f32,
}
impl From<&catalog_config::Search> for SearchPolicy {
	fn from(cfg: &catalog_config::Search) -> Self {
		Self {
			suggestion_limit: cfg.suggestion_limit as usize,
			min_suggestion_word_chars: cfg.min_suggestion_word_chars as usize,
			min_classifier_confidence: cfg.min_classifier_confidence,
		}
	}
}
impl Default for SearchPolicy {
	fn default() -> Self {
		Self::from(&catalog_config::Search::default())
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
	/// Empty query, nothing filtered.
	None,
	Keyword,
	Text,
	Classifier,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchOutcome {
	pub query: String,
	pub results: Vec<Record>,
	pub resolved_category: Option<String>,
	pub source: MatchSource,
	pub used_classifier: bool,
	/// Set when the filter matched nothing (results fall back to the full active list) or the
	/// classifier verdict was below the confidence floor.
	pub low_confidence_or_no_match: bool,
	pub suggestions: Vec<String>,
	pub reasoning: Option<String>,
}

/// Applies a free-text query to the ranked active list.
///
/// A classifier verdict, when given, replaces keyword and text matching. A keyword category with
/// no active records falls through to text matching. Results are never empty while the active
/// list is not.
pub fn search(
	query: &str,
	view: &RankedView,
	verdict: Option<&ClassifierVerdict>,
	policy: &SearchPolicy,
) -> SearchOutcome {
	let trimmed = query.trim();

	if trimmed.is_empty() {
		return SearchOutcome {
			query: String::new(),
			results: view.active.clone(),
			resolved_category: None,
			source: MatchSource::None,
			used_classifier: false,
			low_confidence_or_no_match: false,
			suggestions: Vec::new(),
			reasoning: None,
		};
	}

	let (filtered, resolved_category, source, low_confidence, reasoning) = match verdict {
		Some(verdict) => (
			filter_category(&view.active, &verdict.category),
			Some(verdict.category.clone()),
			MatchSource::Classifier,
			verdict.confidence < policy.min_classifier_confidence,
			Some(verdict.reasoning.clone()).filter(|reasoning| !reasoning.is_empty()),
		),
		None => {
			let keyword = keywords::category_for_query(trimmed)
				.map(|category| (category, filter_category(&view.active, category)))
				.filter(|(_, matched)| !matched.is_empty());

			match keyword {
				Some((category, matched)) =>
					(matched, Some(category.to_string()), MatchSource::Keyword, false, None),
				// A keyword category nobody posted under still gets a text pass.
				None => (filter_text(&view.active, trimmed), None, MatchSource::Text, false, None),
			}
		},
	};
	let no_match = filtered.is_empty();
	let results = if no_match { view.active.clone() } else { filtered };

	SearchOutcome {
		query: trimmed.to_string(),
		results,
		resolved_category,
		source,
		used_classifier: source == MatchSource::Classifier,
		low_confidence_or_no_match: no_match || low_confidence,
		suggestions: suggest::suggestions(
			trimmed,
			&view.active,
			policy.suggestion_limit,
			policy.min_suggestion_word_chars,
		),
		reasoning,
	}
}

fn filter_category(active: &[Record], category: &str) -> Vec<Record> {
	active.iter().filter(|record| record.matches_category(category)).cloned().collect()
}

fn filter_text(active: &[Record], query: &str) -> Vec<Record> {
	let needle = query.to_lowercase();

	active.iter().filter(|record| text_matches(record, &needle)).cloned().collect()
}

fn text_matches(record: &Record, needle: &str) -> bool {
	let budget = budget_text(record.budget);

	[record.title.as_str(), record.description.as_str(), record.location.as_str(), budget.as_str()]
		.into_iter()
		.chain(record.categories.iter().map(String::as_str))
		.any(|field| field.to_lowercase().contains(needle))
}

fn budget_text(budget: f64) -> String {
	if budget.fract() == 0.0 { format!("{budget:.0}") } else { budget.to_string() }
}
