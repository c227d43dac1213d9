// ⚙️ Run Context - Every run-scoped constant in one place
// Defaults reproduce production values; a JSON file may override any subset

use crate::error::{ReconcileError, Result};
use crate::identity::DEFAULT_SENTINELS;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Inclusive date window requested for a custom (backfill) run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn parse(from: &str, to: &str) -> Result<Self> {
        Ok(DateRange {
            from: parse_date(from)?,
            to: parse_date(to)?,
        })
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ReconcileError::InvalidDate {
        value: value.to_string(),
    })
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// RUN CONTEXT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunContext {
    /// Correlates every log line of one run
    pub run_id: Uuid,

    /// Reference date for day-offset filters
    pub today: NaiveDate,

    /// Days after go-live a project becomes eligible (default: 21)
    pub day_filter: i64,

    /// Custom window; disables carry-forward when set
    pub custom_range: Option<DateRange>,

    /// Canonical identity column shared by every source
    pub identity_column: String,

    /// Per-source record id
    pub unique_id_column: String,

    /// Column naming the base source a record came from
    pub origin_column: String,

    /// Identity values that are never valid
    pub sentinels: Vec<String>,

    /// Columns that must be non-null for a record to be exportable
    pub required_fields: Vec<String>,

    /// Key deciding whether two raw rows are duplicates
    pub duplicate_key_columns: Vec<String>,

    /// Key deciding whether two rows of consolidated daily exports are duplicates
    pub consolidated_key_columns: Vec<String>,

    /// Tuple deciding whether a previous failure is the same fact as a current row
    pub comparison_columns: Vec<String>,

    pub string_columns: Vec<String>,
    pub float_columns: Vec<String>,
    pub date_columns: Vec<String>,

    /// Projection substrings that exclude a column from GROUP BY
    pub aggregate_markers: Vec<String>,

    /// Layout of the valid-record export
    pub export_columns: Vec<String>,

    /// Columns appended to the export layout for failed records
    pub failed_export_addons: Vec<String>,

    /// Layout of the revenue export
    pub revenue_columns: Vec<String>,

    /// Cell strings read back as null from carry-forward CSVs
    pub na_values: Vec<String>,
}

impl Default for RunContext {
    fn default() -> Self {
        RunContext {
            run_id: Uuid::new_v4(),
            today: Local::now().date_naive(),
            day_filter: 21,
            custom_range: None,
            identity_column: "SAP ID".to_string(),
            unique_id_column: "UNIQUE ID".to_string(),
            origin_column: "Record Origin".to_string(),
            sentinels: to_strings(&DEFAULT_SENTINELS),
            required_fields: to_strings(&[
                "First Name",
                "Last Name",
                "Email",
                "Product",
                "sap_account_name",
            ]),
            duplicate_key_columns: to_strings(&[
                "UNIQUE ID",
                "Project Name",
                "Project Type",
                "Project Go Live date",
                "Product",
            ]),
            consolidated_key_columns: to_strings(&[
                "SAP ID",
                "Project Name",
                "Project Type",
                "Project Go Live date",
                "Product",
                "Role",
            ]),
            comparison_columns: to_strings(&["SAP ID", "Role", "Project Name", "Project Type"]),
            string_columns: to_strings(&["User Bracket", "# of Implementers"]),
            float_columns: to_strings(&["SaaS Fee", "Implementation Fee", "IDEXX DX Spend"]),
            date_columns: to_strings(&["Project Go Live date", "Project Start Date"]),
            aggregate_markers: to_strings(&["SUM("]),
            export_columns: to_strings(&SURVEY_EXPORT_COLUMNS),
            failed_export_addons: to_strings(&["Record Origin", "UNIQUE ID"]),
            revenue_columns: to_strings(&[
                "Account Name - SAP ID",
                "Revenue Start Date",
                "Revenue End Date",
                "Revenue Amount",
                "Revenue Type",
                "Description",
            ]),
            na_values: to_strings(&NA_VALUES),
        }
    }
}

impl RunContext {
    pub fn new() -> Self {
        RunContext::default()
    }

    /// Load overrides from a JSON file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let ctx: RunContext = serde_json::from_str(&content)?;
        Ok(ctx)
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_custom_range(mut self, range: DateRange) -> Self {
        self.custom_range = Some(range);
        self
    }

    pub fn is_custom_run(&self) -> bool {
        self.custom_range.is_some()
    }

    /// Export layout for failed records (valid layout + addons, no repeats)
    pub fn failed_export_columns(&self) -> Vec<String> {
        let mut columns = self.export_columns.clone();
        for addon in &self.failed_export_addons {
            if !columns.contains(addon) {
                columns.push(addon.clone());
            }
        }
        columns
    }
}

const SURVEY_EXPORT_COLUMNS: [&str; 33] = [
    "First Name",
    "Last Name",
    "Email",
    "Account Name - SAP ID",
    "Team Lead / PM",
    "Team Lead / PM Email",
    "Touchpoint",
    "SAP ID",
    "Phone",
    "Country",
    "Locale",
    "Job Level",
    "Region",
    "Customer Tier",
    "Product",
    "Project Name",
    "Project Type",
    "User Bracket",
    "SaaS Fee",
    "Implementation Fee",
    "Project Go Live date",
    "IDEXX DX Spend",
    "Loyalty",
    "Converted From",
    "Lead implementer",
    "Implementer Office Base",
    "# of Implementers",
    "Project Start Date",
    "Hospital Type",
    "Group",
    "ESAM",
    "State",
    "Role",
];

// "NA" is deliberately absent: it is the North America region code
const NA_VALUES: [&str; 17] = [
    "",
    "#N/A",
    "#N/A N/A",
    "#NA",
    "-1.#IND",
    "-1.#QNAN",
    "-NaN",
    "-nan",
    "1.#IND",
    "1.#QNAN",
    "<NA>",
    "N/A",
    "NULL",
    "NaN",
    "n/a",
    "nan",
    "null",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let ctx = RunContext::default();
        assert_eq!(ctx.day_filter, 21);
        assert_eq!(ctx.identity_column, "SAP ID");
        assert_eq!(ctx.sentinels, vec!["0", "1", ""]);
        assert_eq!(ctx.export_columns.len(), 33);
        assert_eq!(ctx.consolidated_key_columns.last().map(String::as_str), Some("Role"));
        assert!(!ctx.is_custom_run());

        let failed = ctx.failed_export_columns();
        assert_eq!(failed.len(), 35);
        assert_eq!(failed[33], "Record Origin");
        assert_eq!(failed[34], "UNIQUE ID");
    }

    #[test]
    fn test_from_file_overrides_subset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"day_filter": 14, "today": "2024-05-01", "custom_range": {{"from": "2024-04-01", "to": "2024-04-30"}}}}"#
        )
        .unwrap();

        let ctx = RunContext::from_file(file.path()).unwrap();
        assert_eq!(ctx.day_filter, 14);
        assert_eq!(ctx.today, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(ctx.is_custom_run());
        assert_eq!(ctx.identity_column, "SAP ID");
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let err = DateRange::parse("2024-13-01", "2024-01-31").unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidDate { .. }));
    }
}
