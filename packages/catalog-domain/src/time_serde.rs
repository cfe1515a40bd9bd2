//! Record timestamps as RFC 3339 on the way out. Reads accept every form the store delivers.

use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::record;

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_str(&value.format(&Rfc3339).map_err(S::Error::custom)?)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Value::deserialize(deserializer)?;

	record::parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp {raw}")))
}

pub mod option {
	use serde::{Deserialize, Deserializer, Serializer};
	use serde_json::Value;
	use time::OffsetDateTime;

	use crate::record;

	pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(value) => super::serialize(value, serializer),
			None => serializer.serialize_none(),
		}
	}

	/// Unparseable values read as `None`, matching how documents treat a bad deadline.
	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(Option::<Value>::deserialize(deserializer)?.as_ref().and_then(record::parse_timestamp))
	}
}
