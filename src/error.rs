// ⚠️ Error Types - Reconciliation failures
// Every fatal error names the adapter and the stage it failed in

use thiserror::Error;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, ReconcileError>;

// ============================================================================
// STAGE
// ============================================================================

/// Pipeline stage an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Compiling an adapter into a query plan
    Compile,
    /// Running the compiled plan against the backend
    Extract,
    /// Refetching previously failed records
    CarryForward,
    /// Fetching supplemental records for the base identities
    Supplement,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Compile => "compile",
            Stage::Extract => "extract",
            Stage::CarryForward => "carry-forward",
            Stage::Supplement => "supplement",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// BACKEND ERROR
// ============================================================================

/// Failure reported by an extraction backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Unsupported value in column {column}: {message}")]
    UnsupportedValue { column: String, message: String },
}

// ============================================================================
// RECONCILE ERROR
// ============================================================================

/// Main error type for the reconciliation engine
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// An adapter's declarations are structurally invalid; raised before extraction
    #[error("Configuration error in adapter {adapter}: {message}")]
    Configuration { adapter: String, message: String },

    /// The backend failed for one adapter; the whole run is aborted
    #[error("Extraction failed for adapter {adapter} during {stage}: {source}")]
    Extraction {
        adapter: String,
        stage: Stage,
        #[source]
        source: BackendError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid run configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid date {value:?}: expected YYYY-MM-DD")]
    InvalidDate { value: String },
}

impl ReconcileError {
    pub fn configuration(adapter: &str, message: impl Into<String>) -> Self {
        ReconcileError::Configuration {
            adapter: adapter.to_string(),
            message: message.into(),
        }
    }

    pub fn extraction(adapter: &str, stage: Stage, source: BackendError) -> Self {
        ReconcileError::Extraction {
            adapter: adapter.to_string(),
            stage,
            source,
        }
    }

    /// Adapter the error is attributed to, if any
    pub fn adapter(&self) -> Option<&str> {
        match self {
            ReconcileError::Configuration { adapter, .. } => Some(adapter),
            ReconcileError::Extraction { adapter, .. } => Some(adapter),
            _ => None,
        }
    }
}
