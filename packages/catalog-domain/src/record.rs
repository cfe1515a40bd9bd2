use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{Error, Result};

const FIELD_TITLE: &str = "title";
const FIELD_DESCRIPTION: &str = "description";
const FIELD_CATEGORY: &str = "category";
const FIELD_CATEGORIES: &str = "categories";
const FIELD_BUDGET: &str = "budget";
const FIELD_LOCATION: &str = "location";
const FIELD_DEADLINE: &str = "deadline";
const FIELD_CREATED_AT: &str = "createdAt";
const FIELD_USER_ID: &str = "userId";
const FIELD_STATUS: &str = "status";

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
	Pending,
	Live,
	Rejected,
	Completed,
}
impl RecordStatus {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"pending" => Some(Self::Pending),
			"live" => Some(Self::Live),
			"rejected" => Some(Self::Rejected),
			"completed" | "deal_closed" => Some(Self::Completed),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Live => "live",
			Self::Rejected => "rejected",
			Self::Completed => "completed",
		}
	}
}

/// A single enquiry as the engine sees it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Record {
	pub id: String,
	pub title: String,
	pub description: String,
	/// Category tags, de-duplicated, in document order.
	pub categories: Vec<String>,
	pub budget: f64,
	pub location: String,
	#[serde(with = "crate::time_serde::option")]
	pub deadline: Option<OffsetDateTime>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	pub owner_id: String,
	pub status: RecordStatus,
}
impl Record {
	pub fn is_live(&self) -> bool {
		self.status == RecordStatus::Live
	}

	/// A deadline equal to `now` has not passed yet.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		matches!(self.deadline, Some(deadline) if deadline < now)
	}

	pub fn matches_category(&self, category: &str) -> bool {
		self.categories.iter().any(|tag| tag == category)
	}

	pub fn is_owned_by(&self, user_id: &str) -> bool {
		!user_id.is_empty() && self.owner_id == user_id
	}
}

/// Raw document as delivered by the record store.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RecordDocument {
	pub id: String,
	#[serde(default)]
	pub fields: Map<String, Value>,
}
impl RecordDocument {
	pub fn decode(&self) -> Result<Record> {
		let id = self.id.trim();

		if id.is_empty() {
			return Err(Error::MissingId);
		}

		let status = match self.fields.get(FIELD_STATUS) {
			None | Some(Value::Null) =>
				return Err(Error::MissingField { id: id.to_string(), field: FIELD_STATUS }),
			Some(Value::String(raw)) => RecordStatus::parse(raw).ok_or_else(|| {
				Error::UnknownStatus { id: id.to_string(), status: raw.clone() }
			})?,
			Some(other) => {
				return Err(Error::InvalidField {
					id: id.to_string(),
					field: FIELD_STATUS,
					message: format!("expected a string, got {other}"),
				});
			},
		};

		Ok(Record {
			id: id.to_string(),
			title: self.string_field(FIELD_TITLE),
			description: self.string_field(FIELD_DESCRIPTION),
			categories: self.categories(),
			budget: self.fields.get(FIELD_BUDGET).map(parse_budget).unwrap_or(0.0),
			location: self.string_field(FIELD_LOCATION),
			deadline: self.fields.get(FIELD_DEADLINE).and_then(parse_timestamp),
			created_at: self
				.fields
				.get(FIELD_CREATED_AT)
				.and_then(parse_timestamp)
				.unwrap_or(OffsetDateTime::UNIX_EPOCH),
			owner_id: self.string_field(FIELD_USER_ID),
			status,
		})
	}

	fn string_field(&self, name: &str) -> String {
		self.fields.get(name).and_then(Value::as_str).map(|value| value.trim().to_string()).unwrap_or_default()
	}

	fn categories(&self) -> Vec<String> {
		let single = self.fields.get(FIELD_CATEGORY).and_then(Value::as_str);
		let many = self
			.fields
			.get(FIELD_CATEGORIES)
			.and_then(Value::as_array)
			.map(|values| values.iter().filter_map(Value::as_str).collect::<Vec<_>>())
			.unwrap_or_default();
		let mut out: Vec<String> = Vec::new();

		for tag in single.into_iter().chain(many) {
			let tag = tag.trim();

			if tag.is_empty() || out.iter().any(|existing| existing == tag) {
				continue;
			}

			out.push(tag.to_string());
		}

		out
	}
}
impl From<&Record> for RecordDocument {
	fn from(record: &Record) -> Self {
		let mut fields = Map::new();

		fields.insert(FIELD_TITLE.to_string(), Value::from(record.title.clone()));
		fields.insert(FIELD_DESCRIPTION.to_string(), Value::from(record.description.clone()));

		if let Some(first) = record.categories.first() {
			fields.insert(FIELD_CATEGORY.to_string(), Value::from(first.clone()));
		}

		fields.insert(FIELD_CATEGORIES.to_string(), Value::from(record.categories.clone()));
		fields.insert(FIELD_BUDGET.to_string(), Value::from(record.budget));
		fields.insert(FIELD_LOCATION.to_string(), Value::from(record.location.clone()));

		if let Some(deadline) = record.deadline.and_then(|value| value.format(&Rfc3339).ok()) {
			fields.insert(FIELD_DEADLINE.to_string(), Value::from(deadline));
		}
		if let Ok(created_at) = record.created_at.format(&Rfc3339) {
			fields.insert(FIELD_CREATED_AT.to_string(), Value::from(created_at));
		}

		fields.insert(FIELD_USER_ID.to_string(), Value::from(record.owner_id.clone()));
		fields.insert(FIELD_STATUS.to_string(), Value::from(record.status.as_str()));

		Self { id: record.id.clone(), fields }
	}
}

/// Accepts `{seconds, nanoseconds}` objects (with or without a leading underscore), RFC 3339
/// strings, and epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<OffsetDateTime> {
	match value {
		Value::Object(map) => {
			let seconds = map.get("seconds").or_else(|| map.get("_seconds")).and_then(as_i64)?;
			let nanos = map
				.get("nanoseconds")
				.or_else(|| map.get("_nanoseconds"))
				.and_then(as_i64)
				.unwrap_or(0);

			OffsetDateTime::from_unix_timestamp_nanos(
				i128::from(seconds) * 1_000_000_000 + i128::from(nanos),
			)
			.ok()
		},
		Value::String(raw) => OffsetDateTime::parse(raw.trim(), &Rfc3339).ok(),
		Value::Number(_) => {
			let millis = as_i64(value)?;

			OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
		},
		_ => None,
	}
}

fn as_i64(value: &Value) -> Option<i64> {
	value.as_i64().or_else(|| value.as_f64().filter(|raw| raw.is_finite()).map(|raw| raw as i64))
}

fn parse_budget(value: &Value) -> f64 {
	match value {
		Value::Number(number) => number.as_f64().unwrap_or(0.0),
		Value::String(raw) => parse_budget_text(raw),
		_ => 0.0,
	}
}

/// Strips currency symbols and grouping. A `-` ahead of the first digit negates; more than one
/// decimal point is unreadable and yields zero.
fn parse_budget_text(raw: &str) -> f64 {
	let Some(start) = raw.find(|ch: char| ch.is_ascii_digit()) else {
		return 0.0;
	};
	let negative = raw[..start].contains('-');
	let cleaned: String =
		raw[start..].chars().filter(|ch| ch.is_ascii_digit() || *ch == '.').collect();

	if cleaned.matches('.').count() > 1 {
		return 0.0;
	}

	let amount = cleaned.parse::<f64>().unwrap_or(0.0);

	if negative { -amount } else { amount }
}
