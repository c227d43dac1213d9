// 🔍 Deduplication Resolver - Collapse duplicate raw records
// One record survives per duplicate key: the most complete one, first on ties

use crate::config::RunContext;
use crate::identity::IdentityKey;
use crate::record::{Record, RecordSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Normalised key tuple; `None` is a null cell and never equals `""`
pub type DuplicateKey = Vec<Option<String>>;

// ============================================================================
// DUPLICATE GROUP
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Key values shared by every member
    pub key: DuplicateKey,

    /// Input positions of the members, in input order
    pub indices: Vec<usize>,

    /// Input position of the member that survives
    pub retained: usize,
}

impl DuplicateGroup {
    /// Positions dropped by resolution
    pub fn dropped(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied().filter(move |i| *i != self.retained)
    }
}

// ============================================================================
// DEDUPLICATION RESOLVER
// ============================================================================

pub struct DeduplicationResolver {
    /// Key column compared on its decimal-stripped identity form
    identity_column: Option<String>,
}

impl DeduplicationResolver {
    pub fn new() -> Self {
        DeduplicationResolver {
            identity_column: None,
        }
    }

    /// Resolver keyed on the run's identity column
    pub fn from_context(ctx: &RunContext) -> Self {
        Self::new().with_identity_column(&ctx.identity_column)
    }

    /// Builder pattern: `"1042"` and `1042.0` share a key in this column
    pub fn with_identity_column(mut self, column: &str) -> Self {
        self.identity_column = Some(column.to_string());
        self
    }

    /// Key cells rendered to strings; type differences vanish, case is kept
    fn key_of(&self, record: &Record, key_columns: &[String]) -> DuplicateKey {
        key_columns
            .iter()
            .map(|column| {
                let value = record.get(column);
                if self.identity_column.as_deref() == Some(column.as_str()) {
                    IdentityKey::from_value(value).map(|key| key.as_str().to_string())
                } else {
                    value.render()
                }
            })
            .collect()
    }

    /// Every key shared by more than one record, with the surviving member
    pub fn find_duplicate_groups(
        &self,
        records: &RecordSet,
        key_columns: &[String],
    ) -> Vec<DuplicateGroup> {
        let mut order: Vec<DuplicateKey> = Vec::new();
        let mut members: HashMap<DuplicateKey, Vec<usize>> = HashMap::new();

        for (i, record) in records.iter().enumerate() {
            let key = self.key_of(record, key_columns);
            let entry = members.entry(key.clone()).or_default();
            if entry.is_empty() {
                order.push(key);
            }
            entry.push(i);
        }

        let columns = records.columns();
        order
            .into_iter()
            .filter_map(|key| {
                let indices = members.remove(&key)?;
                if indices.len() < 2 {
                    return None;
                }

                // Strictly fewer nulls wins, so the first member keeps ties
                let mut retained = indices[0];
                let mut fewest = records.records()[retained].null_count(columns);
                for &i in &indices[1..] {
                    let nulls = records.records()[i].null_count(columns);
                    if nulls < fewest {
                        retained = i;
                        fewest = nulls;
                    }
                }

                Some(DuplicateGroup {
                    key,
                    indices,
                    retained,
                })
            })
            .collect()
    }

    /// Collapse each duplicate-key group to its most complete record
    ///
    /// Survivors keep their input order. The input is never modified, and
    /// resolving an already resolved set returns it unchanged.
    pub fn resolve(&self, records: &RecordSet, key_columns: &[String]) -> RecordSet {
        let groups = self.find_duplicate_groups(records, key_columns);
        if groups.is_empty() {
            return records.clone();
        }

        let dropped: Vec<usize> = groups.iter().flat_map(|g| g.dropped()).collect();
        for group in &groups {
            debug!(key = ?group.key, members = group.indices.len(), retained = group.retained, "Duplicate group");
        }
        info!(
            groups = groups.len(),
            dropped = dropped.len(),
            "Removed duplicate records"
        );

        let mut keep = vec![true; records.len()];
        for i in dropped {
            keep[i] = false;
        }

        let mut resolved = RecordSet::new(records.columns().to_vec());
        for (record, kept) in records.iter().zip(keep) {
            if kept {
                resolved.push(record.clone());
            }
        }
        resolved
    }
}

impl Default for DeduplicationResolver {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    fn key() -> Vec<String> {
        vec!["UNIQUE ID".to_string(), "Project Name".to_string()]
    }

    fn create_test_record(id: Value, project: &str, email: Option<&str>) -> Record {
        Record::new()
            .with("UNIQUE ID", id)
            .with("Project Name", project)
            .with("Email", email)
    }

    #[test]
    fn test_keeps_record_with_fewest_nulls() {
        let resolver = DeduplicationResolver::new();
        let sparse = create_test_record(Value::text("7"), "Alpha", None);
        let complete = create_test_record(Value::text("7"), "Alpha", Some("a@b.c"));

        for input in [
            vec![sparse.clone(), complete.clone()],
            vec![complete.clone(), sparse.clone()],
        ] {
            let resolved = resolver.resolve(&RecordSet::from_records(input), &key());
            assert_eq!(resolved.len(), 1);
            assert_eq!(resolved.records()[0].get("Email"), &Value::text("a@b.c"));
        }
        println!("✅ Fewest-null record retained regardless of order");
    }

    #[test]
    fn test_ties_keep_first_and_preserve_order() {
        let resolver = DeduplicationResolver::new();
        let records = RecordSet::from_records(vec![
            create_test_record(Value::text("1"), "A", Some("first@x")),
            create_test_record(Value::text("2"), "B", Some("other@x")),
            create_test_record(Value::text("1"), "A", Some("second@x")),
        ]);

        let resolved = resolver.resolve(&records, &key());
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved.records()[0].get("Email"), &Value::text("first@x"));
        assert_eq!(resolved.records()[1].get("UNIQUE ID"), &Value::text("2"));
    }

    #[test]
    fn test_keys_normalise_type_but_not_null() {
        let resolver = DeduplicationResolver::new();
        let records = RecordSet::from_records(vec![
            create_test_record(Value::Float(5.0), "A", None),
            create_test_record(Value::text("5.0"), "A", Some("x@y")),
            create_test_record(Value::Null, "A", None),
            create_test_record(Value::text(""), "A", None),
        ]);

        let groups = resolver.find_duplicate_groups(&records, &key());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].indices, vec![0, 1]);
        assert_eq!(groups[0].retained, 1);

        assert_eq!(resolver.resolve(&records, &key()).len(), 3);
    }

    #[test]
    fn test_identity_column_groups_decimal_variants() {
        let key = vec!["SAP ID".to_string()];
        let records = RecordSet::from_records(vec![
            Record::new().with("SAP ID", "1042").with("Email", Value::Null),
            Record::new().with("SAP ID", Value::Float(1042.0)).with("Email", "db@clinic.test"),
            Record::new().with("SAP ID", "1042.0").with("Email", "csv@clinic.test"),
            Record::new().with("SAP ID", Value::Null).with("Email", "none@clinic.test"),
        ]);

        let resolver = DeduplicationResolver::new().with_identity_column("SAP ID");
        let groups = resolver.find_duplicate_groups(&records, &key);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, vec![Some("1042".to_string())]);
        assert_eq!(groups[0].indices, vec![0, 1, 2]);
        assert_eq!(groups[0].retained, 1);

        let resolved = resolver.resolve(&records, &key);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved.records()[0].get("Email"), &Value::text("db@clinic.test"));
        assert!(resolved.records()[1].get("SAP ID").is_null());

        // Without an identity column the raw renderings stay apart
        assert_eq!(DeduplicationResolver::new().resolve(&records, &key).len(), 3);
        println!("✅ 1042, 1042.0 and \"1042.0\" collapse to one identity");
    }

    #[test]
    fn test_from_context_uses_run_identity_column() {
        let ctx = RunContext::default();
        let key = vec!["SAP ID".to_string(), "Role".to_string()];
        let records = RecordSet::from_records(vec![
            Record::new().with("SAP ID", Value::Float(77.0)).with("Role", "VDC"),
            Record::new().with("SAP ID", "77").with("Role", "VDC"),
            Record::new().with("SAP ID", "77").with("Role", "DX FSR"),
        ]);

        let resolved = DeduplicationResolver::from_context(&ctx).resolve(&records, &key);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_resolve_is_idempotent_and_non_mutating() {
        let resolver = DeduplicationResolver::new();
        let records = RecordSet::from_records(vec![
            create_test_record(Value::text("1"), "A", None),
            create_test_record(Value::text("1"), "A", Some("a@b")),
            create_test_record(Value::text("1"), "A", Some("c@d")),
            create_test_record(Value::text("2"), "B", None),
        ]);
        let snapshot = records.clone();

        let once = resolver.resolve(&records, &key());
        let twice = resolver.resolve(&once, &key());

        assert_eq!(once, twice);
        assert_eq!(records, snapshot);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let resolver = DeduplicationResolver::new();
        let resolved = resolver.resolve(&RecordSet::default(), &key());
        assert!(resolved.is_empty());
    }
}
