use std::{io, path::PathBuf};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read catalog config at {}: {source}", path.display())]
	ReadConfig {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("Failed to parse catalog config at {}: {source}", path.display())]
	ParseConfig {
		path: PathBuf,
		#[source]
		source: Box<toml::de::Error>,
	},
	/// Message names the offending key, e.g. `rotation.sample_size`.
	#[error("{message}")]
	Validation { message: String },
}
