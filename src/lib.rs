// Engagement Reconciler - Core Library
// Exposes all modules for use in the CLI and tests

pub mod record;         // Records and record sets
pub mod identity;       // Identity keys and sentinels
pub mod error;
pub mod config;         // Run context
pub mod logging;
pub mod predicate;      // Predicate AST + SQL dialects
pub mod adapters;       // Source adapters
pub mod query_plan;     // Query plan builder
pub mod backend;        // Extraction backends
pub mod deduplication;
pub mod reconciliation; // Base set + supplemental merge
pub mod classifier;
pub mod derive;         // Survey field derivation
pub mod revenue;
pub mod export;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use record::{Record, RecordSet, Value};
pub use identity::{valid_identity, IdentityKey, DEFAULT_SENTINELS};
pub use error::{BackendError, ReconcileError, Result, Stage};
pub use config::{DateRange, RunContext};
pub use predicate::{Dialect, Expr, Literal, SnowflakeDialect, SqliteDialect};
pub use adapters::{get_adapter, AdapterParams, JoinDecl, Source, SourceAdapter};
pub use query_plan::{CompiledQuery, QueryPlan, QueryPlanBuilder};
pub use backend::{ExtractionBackend, SqliteBackend};
pub use deduplication::{DeduplicationResolver, DuplicateGroup};
pub use reconciliation::{BaseSet, ReconciliationEngine};
pub use classifier::{ClassificationSummary, FailureReason, RecordClassifier};
pub use derive::{expand_contact_roles, FieldDeriver, StandardDeriver};
pub use revenue::{revenue_records, RevenueType};
pub use export::{
    consolidate, consolidation_lookback, daily_filename, export_filename, read_csv, write_csv,
    ExportKind,
};
pub use pipeline::{Pipeline, RunOutcome, RunOutput, RunSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
