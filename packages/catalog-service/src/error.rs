pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid configuration: {message}")]
	InvalidConfig { message: String },
	#[error("Session is closed.")]
	SessionClosed,
	#[error("Provider error: {message}")]
	Provider { message: String },
}
impl From<catalog_config::Error> for Error {
	fn from(err: catalog_config::Error) -> Self {
		Self::InvalidConfig { message: err.to_string() }
	}
}
impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
