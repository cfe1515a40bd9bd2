use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{ProfileLookup, store::ErrorKind};
use catalog_domain::record::Record;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Profile {
	pub user_id: String,
	#[serde(default)]
	pub display_name: String,
	#[serde(default)]
	pub verified: bool,
}

/// Verification state per owner. Owners without an entry show no indicator.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TrustIndex {
	owners: BTreeMap<String, bool>,
}
impl TrustIndex {
	pub fn get(&self, owner_id: &str) -> Option<bool> {
		self.owners.get(owner_id).copied()
	}

	pub fn is_verified(&self, owner_id: &str) -> bool {
		self.get(owner_id).unwrap_or(false)
	}

	pub fn len(&self) -> usize {
		self.owners.len()
	}

	pub fn is_empty(&self) -> bool {
		self.owners.is_empty()
	}
}

/// Looks up each distinct owner once. Lookup failures leave the owner out.
pub async fn resolve_trust<'a, I>(profiles: &dyn ProfileLookup, records: I) -> TrustIndex
where
	I: IntoIterator<Item = &'a Record>,
{
	let owners = records
		.into_iter()
		.map(|record| record.owner_id.as_str())
		.filter(|owner| !owner.is_empty())
		.collect::<BTreeSet<_>>();
	let mut index = TrustIndex::default();

	for owner in owners {
		match profiles.get_profile(owner).await {
			Ok(Some(profile)) => {
				index.owners.insert(owner.to_string(), profile.verified);
			},
			Ok(None) => {},
			Err(err) if err.kind() == ErrorKind::NotFound => {},
			Err(err) => {
				tracing::warn!(error = %err, owner_id = owner, "Profile lookup failed.");
			},
		}
	}

	index
}
