// 🏢 SAP Customer - Account name, state and country for each customer

use super::{mapping, strings, AdapterParams, Source, SourceAdapter};
use crate::predicate::Expr;
use std::collections::HashMap;

const SAP_ID: &str = "SAP Customer ID Conversion";

pub struct SapCustomerAdapter {
    params: AdapterParams,
}

impl SapCustomerAdapter {
    pub fn new(params: AdapterParams) -> Self {
        SapCustomerAdapter { params }
    }
}

impl SourceAdapter for SapCustomerAdapter {
    fn source(&self) -> Source {
        Source::SapCustomer
    }

    fn params(&self) -> &AdapterParams {
        &self.params
    }

    fn database(&self) -> &str {
        "VIEWS"
    }

    fn schema(&self) -> &str {
        "CUSTOMER_DATA"
    }

    fn table(&self) -> &str {
        "Customer"
    }

    fn columns(&self) -> Vec<String> {
        strings(&[SAP_ID, "SFDC Account Name", "\"Region\"", "Country Key"])
    }

    fn column_map(&self) -> HashMap<String, String> {
        mapping(&[
            (SAP_ID, "SAP ID"),
            ("SFDC Account Name", "sap_account_name"),
            ("\"Region\"", "State"),
            ("Country Key", "Country"),
        ])
    }

    fn exclusions(&self) -> Vec<Expr> {
        vec![
            Expr::col(SAP_ID).is_not_null(),
            Expr::col(SAP_ID).not_equals(Expr::int(0)),
            Expr::col(SAP_ID).not_equals(Expr::int(1)),
            Expr::col("Marked For Deletion Flag").is_null(),
            self.identity_allow_list(),
        ]
    }

    fn identity_column(&self) -> &str {
        SAP_ID
    }
}
