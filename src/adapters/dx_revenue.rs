// 💉 DX Revenue - Trailing twelve-month diagnostics spend per customer

use super::{mapping, strings, AdapterParams, Source, SourceAdapter};
use crate::predicate::Expr;
use std::collections::HashMap;

pub struct DxRevenueAdapter {
    params: AdapterParams,
}

impl DxRevenueAdapter {
    pub fn new(params: AdapterParams) -> Self {
        DxRevenueAdapter { params }
    }
}

impl SourceAdapter for DxRevenueAdapter {
    fn source(&self) -> Source {
        Source::DxRevenue
    }

    fn params(&self) -> &AdapterParams {
        &self.params
    }

    fn database(&self) -> &str {
        "VSSANALYTICS_DB"
    }

    fn schema(&self) -> &str {
        "LIST_MANAGEMENT"
    }

    fn table(&self) -> &str {
        "L12_DX_REVENUE"
    }

    fn columns(&self) -> Vec<String> {
        strings(&["SHIP_SAP_NUMBER_CONVERSION", "L12_CAG_RECURRING_REVENUE"])
    }

    fn column_map(&self) -> HashMap<String, String> {
        mapping(&[
            ("SHIP_SAP_NUMBER_CONVERSION", "SAP ID"),
            ("L12_CAG_RECURRING_REVENUE", "IDEXX DX Spend"),
        ])
    }

    // The identity column is numeric here, so sentinels compare as integers
    fn exclusions(&self) -> Vec<Expr> {
        vec![
            Expr::col("SHIP_SAP_NUMBER_CONVERSION").is_not_null(),
            Expr::col("SHIP_SAP_NUMBER_CONVERSION").not_equals(Expr::int(0)),
            Expr::col("SHIP_SAP_NUMBER_CONVERSION").not_equals(Expr::int(1)),
            self.identity_allow_list(),
        ]
    }

    fn identity_column(&self) -> &str {
        "SHIP_SAP_NUMBER_CONVERSION"
    }
}
