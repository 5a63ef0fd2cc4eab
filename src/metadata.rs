//! Dataset metadata - column list and row count for the dataset being loaded
//!
//! The metadata comes from the Socrata views endpoint
//! (`/api/views/<id>.json`), either fetched over HTTP or read from a saved copy.

use crate::error::{LoaderError, Result};
use crate::ingestion::type_registry::{ColumnDescriptor, ColumnKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// What the loader needs to know before streaming starts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub total_row_count: u64,
    pub columns: Vec<ColumnDescriptor>,
}

/// Views document, reduced to the fields the loader reads
#[derive(Debug, Clone, Deserialize)]
pub struct ViewDescription {
    #[serde(default)]
    pub columns: Vec<ViewColumn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewColumn {
    #[serde(rename = "fieldName")]
    pub field_name: String,

    #[serde(rename = "dataTypeName", default)]
    pub data_type_name: String,

    #[serde(rename = "cachedContents", default)]
    pub cached_contents: Option<CachedContents>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CachedContents {
    /// Non-null row count; Socrata sends it as a string
    #[serde(default)]
    pub count: Option<serde_json::Value>,
}

impl ViewDescription {
    pub fn into_metadata(self) -> Result<DatasetMetadata> {
        let first = self.columns.first().ok_or_else(|| {
            LoaderError::MetadataUnavailable("Metadata lists no columns".to_string())
        })?;

        let count = first
            .cached_contents
            .as_ref()
            .and_then(|c| c.count.as_ref())
            .ok_or_else(|| {
                LoaderError::MetadataUnavailable(format!(
                    "No cached row count on column {}",
                    first.field_name
                ))
            })?;
        let total_row_count = parse_count(count)?;

        let columns = self
            .columns
            .into_iter()
            .map(|col| {
                let kind = ColumnKind::from_type_name(&col.data_type_name);
                if kind == ColumnKind::Other {
                    warn!(
                        "Column {} has unrecognized type {:?}, storing as TEXT",
                        col.field_name, col.data_type_name
                    );
                }
                ColumnDescriptor::new(col.field_name, kind)
            })
            .collect();

        Ok(DatasetMetadata {
            total_row_count,
            columns,
        })
    }
}

fn parse_count(value: &serde_json::Value) -> Result<u64> {
    let parsed = match value {
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        serde_json::Value::Number(n) => n.as_u64(),
        _ => None,
    };

    parsed.ok_or_else(|| {
        LoaderError::MetadataUnavailable(format!("Row count is not a number: {}", value))
    })
}

/// Source of dataset metadata, consulted once at startup
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_metadata(&self) -> Result<DatasetMetadata>;

    /// Where the metadata comes from, for logs
    fn describe(&self) -> String;
}

/// Fetches metadata from the Socrata views API
pub struct SocrataMetadataSource {
    client: Client,
    views_url: String,
    app_token: Option<String>,
}

impl SocrataMetadataSource {
    pub fn new(dataset_url: &str, app_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                LoaderError::MetadataUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            views_url: views_url(dataset_url),
            app_token,
        })
    }
}

/// `https://host/resource/<id>.json` -> `https://host/api/views/<id>.json?$limit=0&$offset=0`
pub fn views_url(dataset_url: &str) -> String {
    format!(
        "{}?$limit=0&$offset=0",
        dataset_url.trim().replacen("resource", "api/views", 1)
    )
}

#[async_trait]
impl MetadataSource for SocrataMetadataSource {
    async fn fetch_metadata(&self) -> Result<DatasetMetadata> {
        info!("Fetching metadata from {}", self.views_url);

        let mut request = self.client.get(&self.views_url);
        if let Some(token) = &self.app_token {
            request = request.header("X-App-Token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LoaderError::MetadataUnavailable(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::MetadataUnavailable(format!(
                "Metadata endpoint returned {}",
                status
            )));
        }

        let view: ViewDescription = response.json().await.map_err(|e| {
            LoaderError::MetadataUnavailable(format!("Failed to decode metadata: {}", e))
        })?;

        view.into_metadata()
    }

    fn describe(&self) -> String {
        self.views_url.clone()
    }
}

/// Reads a saved views document from disk
pub struct FileMetadataSource {
    path: PathBuf,
}

impl FileMetadataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MetadataSource for FileMetadataSource {
    async fn fetch_metadata(&self) -> Result<DatasetMetadata> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            LoaderError::MetadataUnavailable(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let view: ViewDescription = serde_json::from_str(&content).map_err(|e| {
            LoaderError::MetadataUnavailable(format!(
                "Failed to parse {}: {}",
                self.path.display(),
                e
            ))
        })?;

        view.into_metadata()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
