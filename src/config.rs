//! Loader configuration
//!
//! Defaults, overlaid by environment variables, overlaid by CLI flags.

use crate::error::{LoaderError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_DATASET_URL: &str = "https://data.ny.gov/resource/jsu2-fbtj.json";
pub const DEFAULT_CSV_PATH: &str = "out.csv";
pub const DEFAULT_DATABASE_PATH: &str = "data.sqlite";
pub const DEFAULT_TABLE_NAME: &str = "data";
pub const DEFAULT_FLUSH_THRESHOLD: usize = 50_000;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Dataset resource URL; the metadata URL is derived from it
    pub dataset_url: String,

    /// Saved metadata document to use instead of fetching it
    pub metadata_file: Option<PathBuf>,

    /// Socrata application token sent with metadata requests
    pub app_token: Option<String>,

    pub csv_path: PathBuf,
    pub database_path: PathBuf,
    pub table_name: String,

    /// Rows per insert statement
    pub flush_threshold: usize,

    /// Put the database in WAL journal mode before loading
    pub write_ahead_log: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            dataset_url: DEFAULT_DATASET_URL.to_string(),
            metadata_file: None,
            app_token: None,
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            write_ahead_log: true,
        }
    }
}

impl LoaderConfig {
    /// Defaults overlaid with environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("SOCRATA_DATASET_URL") {
            config.dataset_url = url;
        }
        if let Some(path) = lookup("SOCRATA_METADATA_FILE") {
            config.metadata_file = Some(PathBuf::from(path));
        }
        config.app_token = lookup("APP_TOKEN").filter(|t| !t.trim().is_empty());
        if let Some(path) = lookup("LOADER_CSV_PATH") {
            config.csv_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("LOADER_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(table) = lookup("LOADER_TABLE") {
            config.table_name = table;
        }
        if let Some(threshold) = lookup("LOADER_FLUSH_THRESHOLD") {
            config.flush_threshold = threshold.trim().parse().map_err(|_| {
                LoaderError::Config(format!(
                    "LOADER_FLUSH_THRESHOLD must be a positive integer, got {:?}",
                    threshold
                ))
            })?;
        }
        if let Some(wal) = lookup("LOADER_WAL") {
            config.write_ahead_log = parse_flag(&wal).ok_or_else(|| {
                LoaderError::Config(format!("LOADER_WAL must be true or false, got {:?}", wal))
            })?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            return Err(LoaderError::Config(
                "Flush threshold must be at least 1".to_string(),
            ));
        }
        if self.table_name.trim().is_empty() {
            return Err(LoaderError::Config("Table name must not be empty".to_string()));
        }
        if self.metadata_file.is_none() && self.dataset_url.trim().is_empty() {
            return Err(LoaderError::Config(
                "Either a dataset URL or a metadata file is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
