use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("Schema creation failed: {0}")]
    SchemaCreationFailed(String),

    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    #[error("Storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
