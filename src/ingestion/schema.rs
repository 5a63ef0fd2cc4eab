//! Schema Resolver - Builds the type registry and table DDL from column descriptors

use crate::db::Storage;
use crate::error::{LoaderError, Result};
use crate::ingestion::literal::quote_identifier;
use crate::ingestion::type_registry::{ColumnDescriptor, TypeRegistry};
use itertools::Itertools;
use tracing::info;

/// Resolves descriptor lists into table schemas for one target table
pub struct SchemaResolver {
    table_name: String,
}

/// Registry, canonical order and DDL for the target table.
/// Fixed for the lifetime of a run.
#[derive(Clone, Debug)]
pub struct ResolvedSchema {
    table_name: String,
    registry: TypeRegistry,
    ddl: String,
}

impl SchemaResolver {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }

    pub fn build_schema(&self, descriptors: &[ColumnDescriptor]) -> Result<ResolvedSchema> {
        if self.table_name.trim().is_empty() {
            return Err(LoaderError::SchemaCreationFailed(
                "Table name must not be empty".to_string(),
            ));
        }
        if descriptors.is_empty() {
            return Err(LoaderError::SchemaCreationFailed(format!(
                "No columns to create for table {}",
                self.table_name
            )));
        }

        let registry = TypeRegistry::from_descriptors(descriptors)?;
        let column_defs = registry
            .columns()
            .map(|col| format!("  {} {}", quote_identifier(&col.name), col.storage_type))
            .join(",\n");
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            quote_identifier(&self.table_name),
            column_defs
        );

        Ok(ResolvedSchema {
            table_name: self.table_name.clone(),
            registry,
            ddl,
        })
    }
}

impl ResolvedSchema {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Column names in the order used for DDL, coercion and inserts
    pub fn canonical_order(&self) -> impl Iterator<Item = &str> {
        self.registry.columns().map(|col| col.name.as_str())
    }

    pub fn ddl(&self) -> &str {
        &self.ddl
    }

    /// `INSERT INTO "table" ("a","b",...) VALUES ` bound to the canonical order
    pub fn insert_prefix(&self) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ",
            quote_identifier(&self.table_name),
            self.canonical_order().map(quote_identifier).join(",")
        )
    }

    /// Create the table if it does not exist yet. Existing rows are untouched.
    pub fn provision<S: Storage + ?Sized>(&self, storage: &mut S) -> Result<()> {
        storage.execute_ddl(&self.ddl)?;
        info!(
            "Table {} ready with {} columns",
            self.table_name,
            self.registry.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::ingestion::type_registry::ColumnKind;

    fn descriptors() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("year", ColumnKind::Numeric),
            ColumnDescriptor::new("county", ColumnKind::Text),
            ColumnDescriptor::new("as_of", ColumnKind::DateLike),
            ColumnDescriptor::new("location", ColumnKind::Other),
        ]
    }

    #[test]
    fn test_ddl_follows_descriptor_order() {
        let schema = SchemaResolver::new("data").build_schema(&descriptors()).unwrap();
        assert_eq!(
            schema.ddl(),
            "CREATE TABLE IF NOT EXISTS \"data\" (\n  \"year\" REAL,\n  \"county\" TEXT,\n  \"as_of\" TEXT,\n  \"location\" TEXT\n)"
        );
        assert_eq!(
            schema.canonical_order().collect::<Vec<_>>(),
            vec!["year", "county", "as_of", "location"]
        );
        assert_eq!(
            schema.insert_prefix(),
            "INSERT INTO \"data\" (\"year\",\"county\",\"as_of\",\"location\") VALUES "
        );
    }

    #[test]
    fn test_empty_descriptor_list_is_rejected() {
        let err = SchemaResolver::new("data").build_schema(&[]).unwrap_err();
        assert!(matches!(err, LoaderError::SchemaCreationFailed(_)));

        let err = SchemaResolver::new("  ").build_schema(&descriptors()).unwrap_err();
        assert!(matches!(err, LoaderError::SchemaCreationFailed(_)));
    }

    #[test]
    fn test_provision_is_idempotent() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let schema = SchemaResolver::new("data").build_schema(&descriptors()).unwrap();

        schema.provision(&mut store).unwrap();
        store
            .write_batch(&format!("{}(2024,'Kings','2024-01-01','\"x\"')", schema.insert_prefix()))
            .unwrap();

        schema.provision(&mut store).unwrap();
        assert_eq!(store.row_count("data").unwrap(), 1);
    }
}
