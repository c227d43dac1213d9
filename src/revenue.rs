// 💰 Revenue Export - One revenue line per fee type per project

use crate::record::{Record, RecordSet, Value};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevenueType {
    Mrr,
    OneTime,
    CagArr,
}

impl RevenueType {
    /// Emission order of the revenue blocks
    pub fn all() -> [RevenueType; 3] {
        [RevenueType::Mrr, RevenueType::OneTime, RevenueType::CagArr]
    }

    pub fn label(&self) -> &'static str {
        match self {
            RevenueType::Mrr => "MRR",
            RevenueType::OneTime => "One Time",
            RevenueType::CagArr => "CAG ARR",
        }
    }

    /// Merged column the amount is taken from
    pub fn amount_column(&self) -> &'static str {
        match self {
            RevenueType::Mrr => "SaaS Fee",
            RevenueType::OneTime => "Implementation Fee",
            RevenueType::CagArr => "IDEXX DX Spend",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RevenueType::Mrr => "ezyvet/Neo/Cornerstone SaaS fee",
            RevenueType::OneTime => "ezyvet/Neo/Cornerstone Implementation fee",
            RevenueType::CagArr => "CAG Annual Recurring Revenue",
        }
    }
}

/// Revenue lines for every record: all MRR lines, then One Time, then CAG ARR
///
/// Start and end dates are both the go-live date. Missing amounts stay null.
pub fn revenue_records(records: &RecordSet, layout: &[String]) -> RecordSet {
    let mut revenue = RecordSet::new(layout.to_vec());
    for revenue_type in RevenueType::all() {
        for record in records {
            let go_live = record.get("Project Go Live date").clone();
            let line = Record::new()
                .with("Account Name - SAP ID", record.get("Account Name - SAP ID").clone())
                .with("Revenue Start Date", go_live.clone())
                .with("Revenue End Date", go_live)
                .with("Revenue Amount", record.get(revenue_type.amount_column()).clone())
                .with("Revenue Type", revenue_type.label())
                .with("Description", revenue_type.description());
            revenue.push(line.project(layout));
        }
    }
    info!(rows = revenue.len(), "Built revenue records");
    revenue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunContext;
    use chrono::NaiveDate;

    fn create_test_record(account: &str, saas: Value) -> Record {
        Record::new()
            .with("Account Name - SAP ID", account)
            .with("Project Go Live date", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .with("SaaS Fee", saas)
            .with("Implementation Fee", Value::Float(1500.0))
            .with("IDEXX DX Spend", Value::Null)
    }

    #[test]
    fn test_three_blocks_in_order() {
        let layout = RunContext::default().revenue_columns;
        let records = RecordSet::from_records(vec![
            create_test_record("Happy Paws-1042", Value::Float(99.0)),
            create_test_record("Vet Co-2000", Value::Null),
        ]);

        let revenue = revenue_records(&records, &layout);
        assert_eq!(revenue.len(), 6);
        assert_eq!(revenue.columns(), layout.as_slice());

        let types: Vec<String> = revenue
            .column_values("Revenue Type")
            .map(|v| v.render_or_empty())
            .collect();
        assert_eq!(types, vec!["MRR", "MRR", "One Time", "One Time", "CAG ARR", "CAG ARR"]);

        let first = &revenue.records()[0];
        assert_eq!(first.get("Revenue Amount"), &Value::Float(99.0));
        assert_eq!(first.get("Revenue Start Date"), first.get("Revenue End Date"));
        assert_eq!(
            first.get("Description"),
            &Value::text("ezyvet/Neo/Cornerstone SaaS fee")
        );
        assert!(revenue.records()[1].get("Revenue Amount").is_null());
        assert!(revenue.records()[4].get("Revenue Amount").is_null());
    }

    #[test]
    fn test_empty_input_keeps_layout() {
        let layout = RunContext::default().revenue_columns;
        let revenue = revenue_records(&RecordSet::default(), &layout);
        assert!(revenue.is_empty());
        assert_eq!(revenue.columns().len(), 6);
    }
}
