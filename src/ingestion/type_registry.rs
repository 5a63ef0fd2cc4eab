//! Type Registry - Maps declared column types to storage types and literal encoders
//!
//! Every column resolves to a `ColumnKind`. Storage type mapping and value
//! coercion are single exhaustive matches over that kind.

use crate::error::{LoaderError, Result};
use crate::ingestion::literal::{escape_string_literal, is_numeric_literal, NULL_LITERAL};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Semantic type declared for a source column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Text,
    DateLike,
    /// Anything the registry does not recognize
    Other,
}

impl ColumnKind {
    /// Classify a declared type name (`dataTypeName` in the dataset metadata).
    /// Unrecognized names resolve to `Other`; this never fails.
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name {
            "number" => ColumnKind::Numeric,
            "text" => ColumnKind::Text,
            "calendar_date" => ColumnKind::DateLike,
            _ => ColumnKind::Other,
        }
    }

    pub fn storage_type(self) -> StorageType {
        match self {
            ColumnKind::Numeric => StorageType::Real,
            ColumnKind::Text | ColumnKind::DateLike | ColumnKind::Other => StorageType::Text,
        }
    }

    /// Encode a raw value as a SQL literal for this kind.
    pub fn coerce(self, raw: Option<&str>) -> String {
        let Some(raw) = raw else {
            return NULL_LITERAL.to_string();
        };

        match self {
            ColumnKind::Numeric => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    NULL_LITERAL.to_string()
                } else if is_numeric_literal(trimmed) {
                    trimmed.to_string()
                } else {
                    // REAL affinity keeps non-numeric text as TEXT
                    escape_string_literal(raw)
                }
            }
            ColumnKind::Text | ColumnKind::DateLike => escape_string_literal(raw),
            ColumnKind::Other => {
                let serialized = serde_json::Value::String(raw.to_string()).to_string();
                escape_string_literal(&serialized)
            }
        }
    }
}

/// Column type used in the generated table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageType {
    Real,
    Text,
}

impl StorageType {
    pub fn as_sql(self) -> &'static str {
        match self {
            StorageType::Real => "REAL",
            StorageType::Text => "TEXT",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Source column as described by the dataset metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// `fieldName` in the metadata
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A descriptor after resolution against the registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedColumn {
    /// Column name as it appears in the CSV header and the table
    pub name: String,
    /// Declared kind, drives literal coercion
    pub kind: ColumnKind,
    /// Column type used in the DDL
    pub storage_type: StorageType,
}

impl ResolvedColumn {
    pub fn coerce(&self, raw: Option<&str>) -> String {
        self.kind.coerce(raw)
    }
}

/// Resolve one descriptor to its storage type and coercion.
pub fn resolve(descriptor: &ColumnDescriptor) -> ResolvedColumn {
    ResolvedColumn {
        name: descriptor.name.clone(),
        kind: descriptor.kind,
        storage_type: descriptor.kind.storage_type(),
    }
}

/// One entry per column, kept in canonical order
#[derive(Clone, Debug)]
pub struct TypeRegistry {
    columns: Vec<ResolvedColumn>,
    by_name: HashMap<String, usize>,
}

impl TypeRegistry {
    /// Build the registry from the descriptor list. Column names must be unique.
    pub fn from_descriptors(descriptors: &[ColumnDescriptor]) -> Result<Self> {
        let mut columns = Vec::with_capacity(descriptors.len());
        let mut by_name = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if by_name.insert(descriptor.name.clone(), columns.len()).is_some() {
                return Err(LoaderError::SchemaCreationFailed(format!(
                    "Duplicate column name: {}",
                    descriptor.name
                )));
            }
            columns.push(resolve(descriptor));
        }

        Ok(Self { columns, by_name })
    }

    /// Columns in canonical order
    pub fn columns(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.columns.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedColumn> {
        self.by_name.get(name).map(|&idx| &self.columns[idx])
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
