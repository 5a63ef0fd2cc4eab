pub mod config;
pub mod db;
pub mod error;
pub mod ingestion;
pub mod metadata;

pub use config::LoaderConfig;
pub use error::{LoaderError, Result};
pub use ingestion::{run, LoadSummary, StreamingLoader};
pub use metadata::{DatasetMetadata, FileMetadataSource, MetadataSource, SocrataMetadataSource};
