use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid classifier tables: {0}")]
    InvalidTables(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
