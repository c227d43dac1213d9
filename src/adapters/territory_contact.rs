// 👥 Territory Contacts - IDEXX representatives assigned to a customer
// VDC and DX FSR contacts live in one table, told apart by territory role

use super::{mapping, strings, AdapterParams, Source, SourceAdapter};
use crate::predicate::Expr;
use std::collections::HashMap;

pub struct TerritoryContactAdapter {
    params: AdapterParams,
    source: Source,
    /// `ROLE_IN_TERRITORY` value selecting the contacts
    role: &'static str,
    /// Prefix of the canonical contact columns (`VDC`, `DXFSR`)
    prefix: &'static str,
}

impl TerritoryContactAdapter {
    pub fn vdc(params: AdapterParams) -> Self {
        TerritoryContactAdapter {
            params,
            source: Source::VdcContact,
            role: "VDC",
            prefix: "VDC",
        }
    }

    pub fn dx_fsr(params: AdapterParams) -> Self {
        TerritoryContactAdapter {
            params,
            source: Source::DxFsrContact,
            role: "DX FSR",
            prefix: "DXFSR",
        }
    }

    /// Canonical column holding one contact field, e.g. `VDC_Email`
    pub fn contact_column(prefix: &str, field: &str) -> String {
        format!("{}_{}", prefix, field)
    }
}

impl SourceAdapter for TerritoryContactAdapter {
    fn source(&self) -> Source {
        self.source
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
        "VDC_FSR_ACCOUNT_CONTACT"
    }

    fn columns(&self) -> Vec<String> {
        strings(&[
            "SAP_ID",
            "IDEXX_REP_FIRST_NAME",
            "IDEXX_REP_LAST_NAME",
            "IDEXX_REP_EMAIL",
            "IDEXX_REP_PHONEW",
        ])
    }

    fn column_map(&self) -> HashMap<String, String> {
        let mut map = mapping(&[("SAP_ID", "SAP ID")]);
        for (column, field) in [
            ("IDEXX_REP_FIRST_NAME", "First_Name"),
            ("IDEXX_REP_LAST_NAME", "Last_Name"),
            ("IDEXX_REP_EMAIL", "Email"),
            ("IDEXX_REP_PHONEW", "Phone"),
        ] {
            map.insert(column.to_string(), Self::contact_column(self.prefix, field));
        }
        map
    }

    fn exclusions(&self) -> Vec<Expr> {
        vec![
            Expr::col("SAP_ID").is_not_null(),
            Expr::col("SAP_ID").not_equals(Expr::text("0")),
            Expr::col("SAP_ID").not_equals(Expr::text("1")),
            Expr::col("SAP_ID").not_equals(Expr::text("")),
            self.identity_allow_list(),
            Expr::col("ROLE_IN_TERRITORY").equals(Expr::text(self.role)),
        ]
    }

    fn identity_column(&self) -> &str {
        "SAP_ID"
    }
}
