// 🔌 Source Adapters - Declarative description of each upstream source
// An adapter only declares what to extract; the query plan builder compiles it
// and the extraction backend runs it. Adapters have no side effects.

mod chargebee;
mod dx_revenue;
mod mavenlink;
mod sap_customer;
mod teamwork;
mod territory_contact;

pub use chargebee::ChargebeeAdapter;
pub use dx_revenue::DxRevenueAdapter;
pub use mavenlink::MavenlinkAdapter;
pub use sap_customer::SapCustomerAdapter;
pub use teamwork::TeamworkAdapter;
pub use territory_contact::TerritoryContactAdapter;

use crate::config::{DateRange, RunContext};
use crate::predicate::{Expr, Literal};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// SOURCE
// ============================================================================

/// Source - Identifies which upstream system an adapter reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Mavenlink,
    MavenlinkPrevious,
    Teamwork,
    TeamworkPrevious,
    DxRevenue,
    SapCustomer,
    VdcContact,
    DxFsrContact,
    Chargebee,
}

impl Source {
    /// Human-readable name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Source::Mavenlink => "Mavenlink",
            Source::MavenlinkPrevious => "Mavenlink (previous failed)",
            Source::Teamwork => "Teamwork",
            Source::TeamworkPrevious => "Teamwork (previous failed)",
            Source::DxRevenue => "DX Revenue",
            Source::SapCustomer => "SAP Customer",
            Source::VdcContact => "VDC Contact",
            Source::DxFsrContact => "DX FSR Contact",
            Source::Chargebee => "Chargebee",
        }
    }

    /// Short code used as the adapter name in errors
    pub fn code(&self) -> &'static str {
        match self {
            Source::Mavenlink => "mavenlink",
            Source::MavenlinkPrevious => "mavenlink_previous",
            Source::Teamwork => "teamwork",
            Source::TeamworkPrevious => "teamwork_previous",
            Source::DxRevenue => "dx_revenue",
            Source::SapCustomer => "sap_customer",
            Source::VdcContact => "vdc_contact",
            Source::DxFsrContact => "dx_fsr_contact",
            Source::Chargebee => "chargebee",
        }
    }

    /// Sources whose rows form the base set
    pub fn base() -> Vec<Source> {
        vec![Source::Mavenlink, Source::Teamwork]
    }

    /// Sources merged onto the base set by identity
    pub fn supplemental() -> Vec<Source> {
        vec![
            Source::DxRevenue,
            Source::SapCustomer,
            Source::VdcContact,
            Source::DxFsrContact,
            Source::Chargebee,
        ]
    }

    /// `Record Origin` value stamped on rows of a base source
    pub fn origin(&self) -> Option<&'static str> {
        match self {
            Source::Mavenlink | Source::MavenlinkPrevious => Some("MAVENLINK"),
            Source::Teamwork | Source::TeamworkPrevious => Some("TEAMWORK"),
            _ => None,
        }
    }

    /// Previous-failed variant of a base source
    pub fn previous_variant(&self) -> Option<Source> {
        match self {
            Source::Mavenlink => Some(Source::MavenlinkPrevious),
            Source::Teamwork => Some(Source::TeamworkPrevious),
            _ => None,
        }
    }

    pub fn is_previous(&self) -> bool {
        matches!(self, Source::MavenlinkPrevious | Source::TeamworkPrevious)
    }
}

// ============================================================================
// PARAMETERS & DECLARATIONS
// ============================================================================

/// Per-invocation parameters, set by the engine before each extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterParams {
    /// Days after go-live a project becomes eligible
    pub day_filter: i64,

    /// Reference date for relative filters
    pub today: NaiveDate,

    /// Custom window replacing the relative date filters
    pub custom_range: Option<DateRange>,

    /// Identity allow-list (supplemental and previous-failed variants)
    pub sap_ids: Vec<String>,

    /// Restrict status-change matches to today's transitions
    pub current_records: bool,
}

impl AdapterParams {
    pub fn from_context(ctx: &RunContext) -> Self {
        AdapterParams {
            day_filter: ctx.day_filter,
            today: ctx.today,
            custom_range: ctx.custom_range,
            sap_ids: Vec::new(),
            current_records: true,
        }
    }

    /// Builder pattern: scope to an identity allow-list
    pub fn with_sap_ids(mut self, sap_ids: Vec<String>) -> Self {
        self.sap_ids = sap_ids;
        self
    }

    /// Allow-list as text literals; blank ids are skipped
    pub fn sap_id_literals(&self) -> Vec<Literal> {
        self.sap_ids
            .iter()
            .filter(|id| !id.is_empty())
            .map(|id| Literal::Text(id.clone()))
            .collect()
    }
}

/// Join declaration: `"table:alias"` key, outer flag and ON condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinDecl {
    pub key: String,
    pub outer: bool,
    pub on: Expr,
}

impl JoinDecl {
    pub fn left(key: &str, on: Expr) -> Self {
        JoinDecl {
            key: key.to_string(),
            outer: true,
            on,
        }
    }
}

// ============================================================================
// SOURCE ADAPTER TRAIT
// ============================================================================

/// SourceAdapter - Everything the query plan builder needs from one source
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    fn params(&self) -> &AdapterParams;

    fn database(&self) -> &str;

    fn schema(&self) -> &str;

    fn table(&self) -> &str;

    /// Ordered column specs; may be qualified, quoted, literal or aggregate
    fn columns(&self) -> Vec<String>;

    /// Column spec → canonical output name
    fn column_map(&self) -> HashMap<String, String>;

    /// Predicates ANDed into the WHERE clause
    fn exclusions(&self) -> Vec<Expr>;

    /// Source-side identity column used by allow-lists
    fn identity_column(&self) -> &str;

    fn joins(&self) -> Vec<JoinDecl> {
        Vec::new()
    }

    fn group_by(&self) -> bool {
        false
    }

    /// Adapter name used in errors and logs
    fn name(&self) -> &'static str {
        self.source().code()
    }

    /// `identity_column IN (sap_ids)`
    fn identity_allow_list(&self) -> Expr {
        Expr::col(self.identity_column()).in_list(self.params().sap_id_literals())
    }
}

/// Factory: adapter for a source with the given parameters
pub fn get_adapter(source: Source, params: AdapterParams) -> Box<dyn SourceAdapter> {
    match source {
        Source::Mavenlink => Box::new(MavenlinkAdapter::new(params)),
        Source::MavenlinkPrevious => Box::new(MavenlinkAdapter::previous(params)),
        Source::Teamwork => Box::new(TeamworkAdapter::new(params)),
        Source::TeamworkPrevious => Box::new(TeamworkAdapter::previous(params)),
        Source::DxRevenue => Box::new(DxRevenueAdapter::new(params)),
        Source::SapCustomer => Box::new(SapCustomerAdapter::new(params)),
        Source::VdcContact => Box::new(TerritoryContactAdapter::vdc(params)),
        Source::DxFsrContact => Box::new(TerritoryContactAdapter::dx_fsr(params)),
        Source::Chargebee => Box::new(ChargebeeAdapter::new(params)),
    }
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn mapping(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub(crate) fn texts(items: &[&str]) -> Vec<Literal> {
    items.iter().map(|s| Literal::Text(s.to_string())).collect()
}

#[cfg(test)]
pub(crate) fn create_test_params() -> AdapterParams {
    AdapterParams {
        day_filter: 21,
        today: NaiveDate::from_ymd_opt(2024, 3, 22).unwrap(),
        custom_range: None,
        sap_ids: Vec::new(),
        current_records: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_covers_every_source() {
        let all = [
            Source::Mavenlink,
            Source::MavenlinkPrevious,
            Source::Teamwork,
            Source::TeamworkPrevious,
            Source::DxRevenue,
            Source::SapCustomer,
            Source::VdcContact,
            Source::DxFsrContact,
            Source::Chargebee,
        ];

        for source in all {
            let adapter = get_adapter(source, create_test_params());
            assert_eq!(adapter.source(), source);
            assert_eq!(adapter.name(), source.code());
            assert!(!adapter.columns().is_empty());
            assert!(!adapter.exclusions().is_empty());
        }
    }

    #[test]
    fn test_previous_variants() {
        assert_eq!(Source::Mavenlink.previous_variant(), Some(Source::MavenlinkPrevious));
        assert_eq!(Source::Teamwork.previous_variant(), Some(Source::TeamworkPrevious));
        assert_eq!(Source::Chargebee.previous_variant(), None);
        assert_eq!(Source::TeamworkPrevious.origin(), Some("TEAMWORK"));
        assert!(Source::MavenlinkPrevious.is_previous());
    }

    #[test]
    fn test_sap_id_literals_skip_blanks() {
        let params = create_test_params().with_sap_ids(vec!["100".into(), "".into(), "200".into()]);
        assert_eq!(params.sap_id_literals().len(), 2);
    }
}
