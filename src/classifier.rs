// ✅ Record Classifier - Split merged records into exportable and failed
// A record is valid when every required field is present and its identity is usable
//
// Failed records are written out and fed back as the next run's carry-forward

use crate::config::RunContext;
use crate::identity::{valid_identity, IdentityKey};
use crate::record::{Record, RecordSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

// ============================================================================
// FAILURE REASONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    MissingField(String),
    MissingIdentity,
    SentinelIdentity(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::MissingField(field) => write!(f, "missing {}", field),
            FailureReason::MissingIdentity => write!(f, "missing identity"),
            FailureReason::SentinelIdentity(id) => write!(f, "sentinel identity {:?}", id),
        }
    }
}

// ============================================================================
// CLASSIFICATION SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub valid: usize,
    pub invalid: usize,

    /// Failure reason → number of records it applies to
    pub reasons: BTreeMap<String, usize>,
}

impl ClassificationSummary {
    pub fn total(&self) -> usize {
        self.valid + self.invalid
    }

    pub fn summary(&self) -> String {
        let rate = if self.total() == 0 {
            0.0
        } else {
            self.valid as f64 / self.total() as f64
        };
        format!(
            "Valid: {}, Invalid: {} ({:.1}% exportable)",
            self.valid,
            self.invalid,
            rate * 100.0
        )
    }
}

// ============================================================================
// RECORD CLASSIFIER
// ============================================================================

pub struct RecordClassifier {
    required_fields: Vec<String>,
    identity_column: String,
    sentinels: Vec<String>,
    comparison_columns: Vec<String>,
}

impl RecordClassifier {
    pub fn new(ctx: &RunContext) -> Self {
        RecordClassifier {
            required_fields: ctx.required_fields.clone(),
            identity_column: ctx.identity_column.clone(),
            sentinels: ctx.sentinels.clone(),
            comparison_columns: ctx.comparison_columns.clone(),
        }
    }

    /// Every reason a record cannot be exported; empty means valid
    pub fn failures(&self, record: &Record) -> Vec<FailureReason> {
        let mut reasons: Vec<FailureReason> = self
            .required_fields
            .iter()
            .filter(|field| record.get(field).is_null())
            .map(|field| FailureReason::MissingField(field.clone()))
            .collect();

        match IdentityKey::from_value(record.get(&self.identity_column)) {
            None => reasons.push(FailureReason::MissingIdentity),
            Some(key) if key.is_sentinel(&self.sentinels) => {
                reasons.push(FailureReason::SentinelIdentity(key.as_str().to_string()))
            }
            Some(_) => {}
        }
        reasons
    }

    pub fn is_valid(&self, record: &Record) -> bool {
        self.failures(record).is_empty()
    }

    /// Partition into (valid, invalid); together they are exactly the input
    pub fn classify(&self, records: &RecordSet) -> (RecordSet, RecordSet) {
        let mut valid = RecordSet::new(records.columns().to_vec());
        let mut invalid = RecordSet::new(records.columns().to_vec());

        for record in records {
            if self.is_valid(record) {
                valid.push(record.clone());
            } else {
                invalid.push(record.clone());
            }
        }

        info!(valid = valid.len(), invalid = invalid.len(), "Classified records");
        (valid, invalid)
    }

    pub fn summarize(&self, records: &RecordSet) -> ClassificationSummary {
        let mut summary = ClassificationSummary::default();
        for record in records {
            let failures = self.failures(record);
            if failures.is_empty() {
                summary.valid += 1;
                continue;
            }
            summary.invalid += 1;
            for reason in failures {
                *summary.reasons.entry(reason.to_string()).or_insert(0) += 1;
            }
        }
        summary
    }

    /// Comparison tuple with the identity decimal-stripped; `None` cells stay null
    fn comparison_key(&self, record: &Record) -> Vec<Option<String>> {
        self.comparison_columns
            .iter()
            .map(|column| {
                if *column == self.identity_column {
                    IdentityKey::from_value(record.get(column)).map(|k| k.as_str().to_string())
                } else {
                    record.get(column).render()
                }
            })
            .collect()
    }

    /// Keep valid rows that are new, or that repeat a previously failed fact
    ///
    /// Rows whose identity failed before but whose comparison tuple differs
    /// from every failed tuple are dropped.
    pub fn revalidate(&self, valid: &RecordSet, carry_forward: &RecordSet) -> RecordSet {
        let failed: Vec<&Record> = carry_forward
            .iter()
            .filter(|r| valid_identity(r.get(&self.identity_column), &self.sentinels).is_some())
            .collect();

        let failed_identities: HashSet<IdentityKey> = failed
            .iter()
            .filter_map(|r| IdentityKey::from_value(r.get(&self.identity_column)))
            .collect();
        let failed_tuples: HashSet<Vec<Option<String>>> =
            failed.iter().map(|r| self.comparison_key(r)).collect();
        debug!(
            identities = failed_identities.len(),
            tuples = failed_tuples.len(),
            "Previously failed facts"
        );

        let is_new = |r: &Record| {
            IdentityKey::from_value(r.get(&self.identity_column))
                .map_or(true, |k| !failed_identities.contains(&k))
        };
        let new = valid.filter(is_new);
        let old = valid.filter(|r| failed_tuples.contains(&self.comparison_key(r)));

        info!(
            new = new.len(),
            reprocessed = old.len(),
            dropped = valid.len().saturating_sub(new.len() + old.len()),
            "Revalidated against carry-forward"
        );
        RecordSet::concat([new, old])
    }
}

// ============================================================================
// TESTS
// ============================================================================
