pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
	#[error("Document is missing an identity.")]
	MissingId,
	#[error("Document {id} is missing field {field}.")]
	MissingField { id: String, field: &'static str },
	#[error("Document {id} has an invalid {field}: {message}")]
	InvalidField { id: String, field: &'static str, message: String },
	#[error("Document {id} has an unknown status {status:?}.")]
	UnknownStatus { id: String, status: String },
}
