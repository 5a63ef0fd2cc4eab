//! Row Coercer - Turns one parsed record into a tuple literal

use crate::ingestion::type_registry::TypeRegistry;
use csv::StringRecord;
use itertools::Itertools;
use std::collections::HashMap;

/// Raw values of one source row keyed by column name.
/// Borrowed from the parser's buffers and dropped right after coercion.
#[derive(Debug, Default)]
pub struct RawRecord<'r> {
    fields: HashMap<&'r str, &'r str>,
}

impl<'r> RawRecord<'r> {
    /// Pair a CSV record with its header row. Trailing columns missing from a
    /// short record are simply absent.
    pub fn from_csv(headers: &'r StringRecord, record: &'r StringRecord) -> Self {
        Self {
            fields: headers.iter().zip(record.iter()).collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&'r str> {
        self.fields.get(column).copied()
    }
}

impl<'r> FromIterator<(&'r str, &'r str)> for RawRecord<'r> {
    fn from_iter<I: IntoIterator<Item = (&'r str, &'r str)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Encode `record` as `(lit1,lit2,...)` in canonical column order.
pub fn coerce_row(record: &RawRecord<'_>, registry: &TypeRegistry) -> String {
    format!(
        "({})",
        registry
            .columns()
            .map(|col| col.coerce(record.get(&col.name)))
            .join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::type_registry::{ColumnDescriptor, ColumnKind};

    fn registry() -> TypeRegistry {
        TypeRegistry::from_descriptors(&[
            ColumnDescriptor::new("year", ColumnKind::Numeric),
            ColumnDescriptor::new("county", ColumnKind::Text),
            ColumnDescriptor::new("location", ColumnKind::Other),
        ])
        .unwrap()
    }

    #[test]
    fn test_tuple_is_in_canonical_order() {
        let record: RawRecord = vec![
            ("location", "POINT (1 2)"),
            ("county", "Albany"),
            ("year", "2021"),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            coerce_row(&record, &registry()),
            "(2021,'Albany','\"POINT (1 2)\"')"
        );
    }

    #[test]
    fn test_missing_column_becomes_null() {
        let record: RawRecord = vec![("year", "2021")].into_iter().collect();
        assert_eq!(coerce_row(&record, &registry()), "(2021,NULL,NULL)");
    }

    #[test]
    fn test_unknown_columns_are_ignored() {
        let record: RawRecord = vec![("year", "1999"), ("county", "Erie"), ("extra", "zzz")]
            .into_iter()
            .collect();
        assert_eq!(coerce_row(&record, &registry()), "(1999,'Erie',NULL)");
    }

    #[test]
    fn test_from_csv_short_record() {
        let headers = StringRecord::from(vec!["year", "county", "location"]);
        let record = StringRecord::from(vec!["2020", "Bronx"]);
        let raw = RawRecord::from_csv(&headers, &record);

        assert_eq!(raw.get("year"), Some("2020"));
        assert_eq!(raw.get("county"), Some("Bronx"));
        assert_eq!(raw.get("location"), None);
        assert_eq!(coerce_row(&raw, &registry()), "(2020,'Bronx',NULL)");
    }

    #[test]
    fn test_coercion_is_deterministic() {
        let record: RawRecord = vec![("year", "7"), ("county", "Q'ns")].into_iter().collect();
        let reg = registry();
        assert_eq!(coerce_row(&record, &reg), coerce_row(&record, &reg));
    }
}
