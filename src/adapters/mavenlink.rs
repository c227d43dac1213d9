// 🗂️ Mavenlink - Base source for project implementations
// Eligibility hinges on the status-change audit trail joined as `astatus`

use super::{mapping, strings, texts, AdapterParams, JoinDecl, Source, SourceAdapter};
use crate::predicate::Expr;
use std::collections::HashMap;

const AUDIT_VALUE: &str = "astatus.\"ͺAudit: Value\"";
const AUDIT_TRANSACTION_DATETIME: &str = "astatus.\"ͺAudit: Transaction Datetime\"";

pub struct MavenlinkAdapter {
    params: AdapterParams,
    previous: bool,
}

impl MavenlinkAdapter {
    pub fn new(params: AdapterParams) -> Self {
        MavenlinkAdapter {
            params,
            previous: false,
        }
    }

    /// Variant that refetches previously failed identities
    pub fn previous(params: AdapterParams) -> Self {
        MavenlinkAdapter {
            params: AdapterParams {
                current_records: false,
                ..params
            },
            previous: true,
        }
    }

    fn project_type() -> Expr {
        Expr::col("PROJECT_TYPE_OLD").lower()
    }

    /// Completed fresh/remote or self implementations, or projects exactly
    /// `day_filter` days past their due date
    fn relative_window(&self) -> Expr {
        let today = Expr::date(self.params.today);

        let completed_today = if self.params.current_records {
            Expr::col(AUDIT_TRANSACTION_DATETIME)
                .to_date()
                .days_until(today.clone())
                .equals(Expr::int(0))
        } else {
            Expr::Const(true)
        };

        let completed = Expr::and(vec![
            Expr::col(AUDIT_VALUE).equals(Expr::text("blue - Completed")),
            Expr::or(vec![
                Expr::and(vec![
                    Self::project_type().like("%fresh%"),
                    Self::project_type().like("%remote%"),
                ]),
                Self::project_type().equals(Expr::text("self implementation")),
            ]),
            completed_today,
        ]);

        let due = Expr::and(vec![
            Expr::col("PROJECT_DUE_DATE")
                .days_until(today)
                .equals(Expr::int(self.params.day_filter)),
            Self::project_type().not_like("%fresh%"),
            Self::project_type().not_like("%remote%"),
            Self::project_type().not_in_list(texts(&[
                "self implementation",
                "other - no imp required",
            ])),
        ]);

        Expr::or(vec![completed, due])
    }

    fn base_exclusions(&self, window: Expr) -> Vec<Expr> {
        vec![
            window,
            Expr::col("PROJECT_STATUS")
                .lower()
                .in_list(texts(&["in progress", "completed"])),
            Expr::col("ALT_SURVEY_DATE").is_null(),
        ]
    }

    fn current_exclusions(&self) -> Vec<Expr> {
        let mut filters = match self.params.custom_range {
            Some(range) => {
                let between = |column: &str| {
                    Expr::and(vec![
                        Expr::col(column).gt_eq(Expr::date(range.from)),
                        Expr::col(column).lt_eq(Expr::date(range.to)),
                    ])
                };
                let transitioned = Expr::and(vec![
                    Expr::col(AUDIT_TRANSACTION_DATETIME)
                        .to_date()
                        .gt_eq(Expr::date(range.from)),
                    Expr::col(AUDIT_TRANSACTION_DATETIME)
                        .to_date()
                        .lt_eq(Expr::date(range.to)),
                ]);
                let window = Expr::or(vec![
                    between("PROJECT_DUE_DATE"),
                    between("ALT_SURVEY_DATE"),
                    transitioned,
                ]);
                self.base_exclusions(window)
            }
            None => {
                // An alternate survey date due today overrides the usual window
                let survey_today = Expr::col("ALT_SURVEY_DATE")
                    .days_until(Expr::date(self.params.today))
                    .equals(Expr::int(0));
                let default_window = Expr::and(self.base_exclusions(self.relative_window()));
                vec![Expr::or(vec![default_window, survey_today])]
            }
        };

        filters.extend([
            Self::project_type().not_equals(Expr::text("other - no imp required")),
            Expr::col("PRODUCT").lower().not_equals(Expr::text("test projects")),
            Expr::col("ARCHIVED").equals(Expr::bool(false)),
            Expr::or(vec![
                Expr::col("FEEDBACK_CALL_COMPLETED")
                    .lower()
                    .not_equals(Expr::text("waived")),
                Expr::col("FEEDBACK_CALL_COMPLETED").is_null(),
            ]),
        ]);
        filters
    }

    fn previous_exclusions(&self) -> Vec<Expr> {
        vec![
            self.identity_allow_list(),
            Expr::col("PROJECT_STATUS").in_list(texts(&["In Progress", "Completed"])),
            Expr::col("PRODUCT").not_equals(Expr::text("Test Projects")),
            Expr::col("ARCHIVED").equals(Expr::bool(false)),
            Expr::or(vec![
                Expr::col("FEEDBACK_CALL_COMPLETED").not_equals(Expr::text("Waived")),
                Expr::col("FEEDBACK_CALL_COMPLETED").is_null(),
            ]),
            Expr::col("PROJECT_TYPE_OLD").not_equals(Expr::text("OTHER - No imp required")),
        ]
    }
}

impl SourceAdapter for MavenlinkAdapter {
    fn source(&self) -> Source {
        if self.previous {
            Source::MavenlinkPrevious
        } else {
            Source::Mavenlink
        }
    }

    fn params(&self) -> &AdapterParams {
        &self.params
    }

    fn database(&self) -> &str {
        "VSSANALYTICS_DB"
    }

    fn schema(&self) -> &str {
        "MAVENLINK"
    }

    fn table(&self) -> &str {
        "cdl_mavenlink"
    }

    fn columns(&self) -> Vec<String> {
        strings(&[
            "WORKSPACE_ID",
            "SAP_ID",
            "PROJECT_TITLE",
            "TEAM_LEAD",
            "TEAM_LEAD_EMAIL",
            "TEAM_LEAD_REGION",
            "LEAD_IMPLEMENTER",
            "COUNTRY",
            "USER_BRACKET",
            "PROJECT_TYPE_OLD",
            "CORPORATE_GROUP",
            "PRODUCT",
            "MONTHLY_SAAS_USD",
            "IMPLEMENTATION_FEE_USD",
            "PROJECT_DUE_DATE",
            "PREVIOUS_PIMS",
            "NUM_IMPLEMENTERS",
            "PROJECT_START_DATE",
            "CLINIC_TYPE",
            "SURVEY_CONTACT_FIRST_NAME",
            "SURVEY_CONTACT_LAST_NAME",
            "SURVEY_CONTACT_EMAIL",
            "SURVEY_CONTACT_PHONE",
            "'MAVENLINK'",
            AUDIT_VALUE,
        ])
    }

    fn column_map(&self) -> HashMap<String, String> {
        mapping(&[
            ("WORKSPACE_ID", "UNIQUE ID"),
            ("SAP_ID", "SAP ID"),
            ("PROJECT_TITLE", "Project Name"),
            ("TEAM_LEAD", "Team Lead / PM"),
            ("TEAM_LEAD_EMAIL", "Team Lead / PM Email"),
            ("TEAM_LEAD_REGION", "Implementer Office Base"),
            ("LEAD_IMPLEMENTER", "Lead implementer"),
            ("COUNTRY", "Region Country"),
            ("USER_BRACKET", "User Bracket"),
            ("PROJECT_TYPE_OLD", "Project Type"),
            ("CORPORATE_GROUP", "Group"),
            ("PRODUCT", "Product"),
            ("MONTHLY_SAAS_USD", "SaaS Fee"),
            ("IMPLEMENTATION_FEE_USD", "Implementation Fee"),
            ("PROJECT_DUE_DATE", "Project Go Live date"),
            ("PREVIOUS_PIMS", "Converted From"),
            ("NUM_IMPLEMENTERS", "# of Implementers"),
            ("PROJECT_START_DATE", "Project Start Date"),
            ("CLINIC_TYPE", "Hospital Type"),
            ("SURVEY_CONTACT_FIRST_NAME", "First Name"),
            ("SURVEY_CONTACT_LAST_NAME", "Last Name"),
            ("SURVEY_CONTACT_EMAIL", "Email"),
            ("SURVEY_CONTACT_PHONE", "Phone"),
            ("'MAVENLINK'", "Record Origin"),
            (AUDIT_VALUE, "Audit Status"),
        ])
    }

    fn exclusions(&self) -> Vec<Expr> {
        if self.previous {
            self.previous_exclusions()
        } else {
            self.current_exclusions()
        }
    }

    fn identity_column(&self) -> &str {
        "SAP_ID"
    }

    fn joins(&self) -> Vec<JoinDecl> {
        vec![JoinDecl::left(
            "mavenlink_status_changes:astatus",
            Expr::and(vec![
                Expr::col("main.PROJECT_TITLE")
                    .equals(Expr::col("astatus.\"ͺAudit: Record Project Name\"")),
                Expr::col("astatus.\"ͺAudit: Field\"").equals(Expr::text("status_key")),
                Expr::col("astatus.\"ͺAudit: Previous Value\"")
                    .equals(Expr::text("green - In Progress")),
                Expr::col(AUDIT_VALUE).equals(Expr::text("blue - Completed")),
            ]),
        )]
    }
}
