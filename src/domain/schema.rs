// Schema errors raised at trust boundaries (storage, transport, generators)
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("field {field} out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}
