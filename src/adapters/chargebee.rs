// 💳 Chargebee - Active subscription user counts

use super::{mapping, strings, texts, AdapterParams, Source, SourceAdapter};
use crate::predicate::Expr;
use std::collections::HashMap;

pub struct ChargebeeAdapter {
    params: AdapterParams,
}

impl ChargebeeAdapter {
    pub fn new(params: AdapterParams) -> Self {
        ChargebeeAdapter { params }
    }
}

impl SourceAdapter for ChargebeeAdapter {
    fn source(&self) -> Source {
        Source::Chargebee
    }

    fn params(&self) -> &AdapterParams {
        &self.params
    }

    fn database(&self) -> &str {
        "VSSANALYTICS_DB"
    }

    fn schema(&self) -> &str {
        "CHARGEBEE"
    }

    fn table(&self) -> &str {
        "cdl_chargebee"
    }

    fn columns(&self) -> Vec<String> {
        strings(&["SAP", "USERCOUNT"])
    }

    fn column_map(&self) -> HashMap<String, String> {
        mapping(&[("SAP", "SAP ID"), ("USERCOUNT", "Team UserCount")])
    }

    fn exclusions(&self) -> Vec<Expr> {
        vec![
            Expr::col("STATUS").in_list(texts(&["active", "future"])),
            Expr::col("SAP").is_not_null(),
            Expr::col("SAP").not_equals(Expr::text("0")),
            Expr::col("SAP").not_equals(Expr::text("1")),
            Expr::col("SAP").not_equals(Expr::text("")),
            self.identity_allow_list(),
        ]
    }

    fn identity_column(&self) -> &str {
        "SAP"
    }
}
