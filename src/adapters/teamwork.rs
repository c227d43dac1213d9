// 🗂️ Teamwork - Base source for conversions and fresh starts
// One row per expense line; grouped so the implementation fee is summed and
// the subscription line is joined back in as the SaaS fee

use super::{mapping, strings, AdapterParams, JoinDecl, Source, SourceAdapter};
use crate::predicate::Expr;
use std::collections::HashMap;

pub struct TeamworkAdapter {
    params: AdapterParams,
    previous: bool,
}

impl TeamworkAdapter {
    pub fn new(params: AdapterParams) -> Self {
        TeamworkAdapter {
            params,
            previous: false,
        }
    }

    /// Variant that refetches previously failed identities
    pub fn previous(params: AdapterParams) -> Self {
        TeamworkAdapter {
            params: AdapterParams {
                current_records: false,
                ..params
            },
            previous: true,
        }
    }

    fn date_window(&self) -> Expr {
        match self.params.custom_range {
            Some(range) => Expr::and(vec![
                Expr::col("main.MILESTONE_DEADLINE").gt_eq(Expr::date(range.from)),
                Expr::col("main.MILESTONE_DEADLINE").lt_eq(Expr::date(range.to)),
            ]),
            None => Expr::col("main.MILESTONE_DEADLINE")
                .days_until(Expr::date(self.params.today))
                .equals(Expr::int(self.params.day_filter)),
        }
    }

    /// Filters shared by the current and previous-failed variants
    fn static_exclusions() -> Vec<Expr> {
        let sub_product = || Expr::col("main.SUB_PRODUCT").lower();
        let project_name = || Expr::col("main.PROJECT_NAME").lower();

        vec![
            Expr::col("main.MILESTONE_COMPLETED").equals(Expr::bool(true)),
            Expr::or(vec![
                sub_product().like("%conversion%"),
                sub_product().like("%fresh%"),
                Expr::and(vec![
                    Expr::or(vec![
                        project_name().like("%conversion - cornerstone%"),
                        project_name().like("cornerstone - %conversion%"),
                    ]),
                    sub_product().not_like("%misc%"),
                ]),
            ]),
            Expr::col("main.expenses_name")
                .lower()
                .not_like("%subscription%"),
            Expr::col("main.PROJECT_STATUS").equals(Expr::text("active")),
        ]
    }
}

impl SourceAdapter for TeamworkAdapter {
    fn source(&self) -> Source {
        if self.previous {
            Source::TeamworkPrevious
        } else {
            Source::Teamwork
        }
    }

    fn params(&self) -> &AdapterParams {
        &self.params
    }

    fn database(&self) -> &str {
        "VSSANALYTICS_DB"
    }

    fn schema(&self) -> &str {
        "TEAMWORK"
    }

    fn table(&self) -> &str {
        "cdl_teamwork"
    }

    fn columns(&self) -> Vec<String> {
        strings(&[
            "main.PROJECT_ID",
            "main.SAP_ID",
            "main.PROJECT_NAME",
            "main.PROJECT_OWNER",
            "main.SURVEY_CONTACT_FIRST_NAME",
            "main.SURVEY_CONTACT_LAST_NAME",
            "main.SURVEY_CONTACT_EMAIL",
            "main.SURVEY_CONTACT_PHONE",
            "main.COUNTRY_TAG",
            "main.CORPORATE_GROUP",
            "main.PRODUCT",
            "main.SUB_PRODUCT",
            "saas_fee.EXPENSES_COST",
            "SUM(main.EXPENSES_COST)",
            "main.MILESTONE_DEADLINE",
            "main.PROJECT_START_AT",
            "main.CATEGORY_NAME",
            "main.PROJECT_OWNER_EMAIL",
            "'2'",
            "'TEAMWORK'",
        ])
    }

    fn column_map(&self) -> HashMap<String, String> {
        mapping(&[
            ("main.PROJECT_ID", "UNIQUE ID"),
            ("main.SAP_ID", "SAP ID"),
            ("main.PROJECT_NAME", "Project Name"),
            ("main.PROJECT_OWNER", "Team Lead / PM"),
            ("main.SURVEY_CONTACT_FIRST_NAME", "First Name"),
            ("main.SURVEY_CONTACT_LAST_NAME", "Last Name"),
            ("main.SURVEY_CONTACT_EMAIL", "Email"),
            ("main.SURVEY_CONTACT_PHONE", "Phone"),
            ("main.COUNTRY_TAG", "Region Country"),
            ("main.CORPORATE_GROUP", "Corporate Group"),
            ("main.PRODUCT", "Product"),
            ("main.SUB_PRODUCT", "Project Type"),
            ("SUM(main.EXPENSES_COST)", "Implementation Fee"),
            ("saas_fee.EXPENSES_COST", "SaaS Fee"),
            ("main.MILESTONE_DEADLINE", "Project Go Live date"),
            ("main.PROJECT_START_AT", "Project Start Date"),
            ("main.CATEGORY_NAME", "Lead implementer"),
            ("main.PROJECT_OWNER_EMAIL", "Team Lead / PM Email"),
            ("'2'", "# of Implementers"),
            ("'TEAMWORK'", "Record Origin"),
        ])
    }

    fn exclusions(&self) -> Vec<Expr> {
        let scope = if self.previous {
            self.identity_allow_list()
        } else {
            self.date_window()
        };
        let mut exclusions = vec![scope];
        exclusions.extend(Self::static_exclusions());
        exclusions
    }

    fn identity_column(&self) -> &str {
        "main.SAP_ID"
    }

    fn joins(&self) -> Vec<JoinDecl> {
        let sub_product = || Expr::col("saas_fee.SUB_PRODUCT").lower();
        vec![JoinDecl::left(
            "cdl_teamwork:saas_fee",
            Expr::and(vec![
                Expr::col("main.PROJECT_ID").equals(Expr::col("saas_fee.PROJECT_ID")),
                Expr::col("saas_fee.expenses_name")
                    .lower()
                    .like("%subscription%"),
                Expr::or(vec![
                    sub_product().like("%conversion%"),
                    sub_product().like("%fresh%"),
                    Expr::and(vec![
                        Expr::col("saas_fee.PROJECT_NAME")
                            .lower()
                            .like("%conversion - cornerstone%"),
                        sub_product().not_like("%misc%"),
                    ]),
                ]),
            ]),
        )]
    }

    fn group_by(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::create_test_params;
    use crate::config::DateRange;
    use crate::predicate::SnowflakeDialect;

    fn render_first(adapter: &TeamworkAdapter) -> String {
        adapter.exclusions()[0].render(&SnowflakeDialect, &mut Vec::new())
    }

    #[test]
    fn test_relative_window() {
        let adapter = TeamworkAdapter::new(create_test_params());
        assert_eq!(
            render_first(&adapter),
            "DATEDIFF(day, main.MILESTONE_DEADLINE, '2024-03-22') = 21"
        );
        assert_eq!(adapter.exclusions().len(), 5);
        assert!(adapter.group_by());
    }

    #[test]
    fn test_custom_range_window() {
        let mut params = create_test_params();
        params.custom_range = Some(DateRange::parse("2024-02-01", "2024-02-29").unwrap());
        let adapter = TeamworkAdapter::new(params);

        assert_eq!(
            render_first(&adapter),
            "(main.MILESTONE_DEADLINE >= '2024-02-01') AND (main.MILESTONE_DEADLINE <= '2024-02-29')"
        );
    }

    #[test]
    fn test_previous_variant_keeps_static_filters() {
        let params = create_test_params().with_sap_ids(vec!["100".into(), "200".into()]);
        let current = TeamworkAdapter::new(params.clone());
        let previous = TeamworkAdapter::previous(params);

        assert_eq!(render_first(&previous), "main.SAP_ID IN ('100', '200')");
        assert_eq!(current.exclusions()[1..], previous.exclusions()[1..]);
    }
}
