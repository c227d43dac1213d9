// 🚀 Pipeline - One reconciliation run from extraction to export-ready sets
//
// base set → supplemental merge → duplicate sanity check → derivation →
// revenue lines → contact fan-out → classification → revalidation

use crate::backend::ExtractionBackend;
use crate::classifier::RecordClassifier;
use crate::config::RunContext;
use crate::deduplication::DeduplicationResolver;
use crate::derive::{expand_contact_roles, FieldDeriver, StandardDeriver};
use crate::error::Result;
use crate::export::project;
use crate::reconciliation::ReconciliationEngine;
use crate::record::RecordSet;
use crate::revenue::revenue_records;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};
use uuid::Uuid;

// ============================================================================
// RUN OUTPUT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub base_rows: usize,
    pub refetched_rows: usize,
    pub merged_rows: usize,
    pub expanded_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub revenue_rows: usize,
}

impl RunSummary {
    pub fn summary(&self) -> String {
        format!(
            "Base: {} (+{} refetched), Merged: {}, Expanded: {}, Valid: {}, Invalid: {}, Revenue: {}",
            self.base_rows,
            self.refetched_rows,
            self.merged_rows,
            self.expanded_rows,
            self.valid_rows,
            self.invalid_rows,
            self.revenue_rows
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// Valid records in the survey export layout
    pub valid: RecordSet,

    /// Invalid records in the failed export layout (next run's carry-forward)
    pub invalid: RecordSet,

    pub revenue: RecordSet,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No base record carried an identity; nothing to export
    Skipped,
    Completed(RunOutput),
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    ctx: RunContext,
    deriver: Box<dyn FieldDeriver>,
}

impl Pipeline {
    pub fn new(ctx: RunContext) -> Self {
        Pipeline {
            ctx,
            deriver: Box::new(StandardDeriver::new()),
        }
    }

    /// Builder pattern: swap the field derivation step
    pub fn with_deriver(mut self, deriver: Box<dyn FieldDeriver>) -> Self {
        self.deriver = deriver;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn run(
        &self,
        backend: &dyn ExtractionBackend,
        carry_forward: &RecordSet,
    ) -> Result<RunOutcome> {
        let ctx = &self.ctx;
        let span = info_span!("run", run_id = %ctx.run_id);
        let _guard = span.enter();

        info!(
            today = %ctx.today,
            custom = ctx.is_custom_run(),
            carry_forward = carry_forward.len(),
            "Starting reconciliation run"
        );

        let engine = ReconciliationEngine::new(backend, ctx);
        let base = engine.build_base_set(carry_forward, ctx)?;

        if base
            .records
            .column_values(&ctx.identity_column)
            .all(|v| v.is_null())
        {
            warn!("Base set has no identities; skipping run");
            return Ok(RunOutcome::Skipped);
        }

        let supplements = engine.fetch_supplements(&base.records, ctx)?;
        let merged = engine.merge_supplemental(
            base.records,
            &supplements,
            &ctx.identity_column,
            ctx,
        );

        // Fan-out from supplements can reintroduce duplicate keys
        let checked =
            DeduplicationResolver::from_context(ctx).resolve(&merged, &ctx.duplicate_key_columns);

        let derived = self.deriver.derive(checked);
        let revenue = revenue_records(&derived, &ctx.revenue_columns);
        let expanded = expand_contact_roles(&derived);

        let classifier = RecordClassifier::new(ctx);
        let (valid, invalid) = classifier.classify(&expanded);

        let valid = if ctx.is_custom_run() || carry_forward.is_empty() {
            valid
        } else {
            classifier.revalidate(&valid, carry_forward)
        };

        let summary = RunSummary {
            run_id: ctx.run_id,
            base_rows: base.base_rows,
            refetched_rows: base.refetched_rows,
            merged_rows: merged.len(),
            expanded_rows: expanded.len(),
            valid_rows: valid.len(),
            invalid_rows: invalid.len(),
            revenue_rows: revenue.len(),
        };
        info!("{}", summary.summary());

        Ok(RunOutcome::Completed(RunOutput {
            valid: project(&valid, &ctx.export_columns),
            invalid: project(&invalid, &ctx.failed_export_columns()),
            revenue,
            summary,
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Source;
    use crate::backend::SqliteBackend;
    use crate::config::DateRange;
    use crate::record::{Record, Value};
    use crate::testing::{create_test_project, StaticBackend};
    use chrono::NaiveDate;

    fn create_test_context() -> RunContext {
        RunContext::default().with_today(NaiveDate::from_ymd_opt(2024, 3, 22).unwrap())
    }

    fn create_test_backend() -> SqliteBackend {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .connection()
            .execute_batch(
                r#"
                CREATE TABLE cdl_mavenlink (
                    WORKSPACE_ID, SAP_ID, PROJECT_TITLE, TEAM_LEAD, TEAM_LEAD_EMAIL,
                    TEAM_LEAD_REGION, LEAD_IMPLEMENTER, COUNTRY, USER_BRACKET,
                    PROJECT_TYPE_OLD, CORPORATE_GROUP, PRODUCT, MONTHLY_SAAS_USD,
                    IMPLEMENTATION_FEE_USD, PROJECT_DUE_DATE, PREVIOUS_PIMS,
                    NUM_IMPLEMENTERS, PROJECT_START_DATE, CLINIC_TYPE,
                    SURVEY_CONTACT_FIRST_NAME, SURVEY_CONTACT_LAST_NAME,
                    SURVEY_CONTACT_EMAIL, SURVEY_CONTACT_PHONE, PROJECT_STATUS,
                    ALT_SURVEY_DATE, ARCHIVED, FEEDBACK_CALL_COMPLETED
                );
                CREATE TABLE mavenlink_status_changes (
                    "ͺAudit: Record Project Name", "ͺAudit: Field",
                    "ͺAudit: Previous Value", "ͺAudit: Value",
                    "ͺAudit: Transaction Datetime"
                );
                CREATE TABLE cdl_teamwork (
                    PROJECT_ID TEXT, SAP_ID TEXT, PROJECT_NAME TEXT, PROJECT_OWNER TEXT,
                    SURVEY_CONTACT_FIRST_NAME TEXT, SURVEY_CONTACT_LAST_NAME TEXT,
                    SURVEY_CONTACT_EMAIL TEXT, SURVEY_CONTACT_PHONE TEXT,
                    COUNTRY_TAG TEXT, CORPORATE_GROUP TEXT, PRODUCT TEXT,
                    SUB_PRODUCT TEXT, EXPENSES_COST REAL, MILESTONE_DEADLINE TEXT,
                    PROJECT_START_AT TEXT, CATEGORY_NAME TEXT, PROJECT_OWNER_EMAIL TEXT,
                    MILESTONE_COMPLETED INTEGER, expenses_name TEXT, PROJECT_STATUS TEXT
                );
                INSERT INTO cdl_teamwork VALUES
                    ('P1', '1042', 'Happy Paws (Conversion - Cornerstone)', 'Evan Wong',
                     'Ana', 'Lee', 'ana@happypaws.test', '555-0100', 'New Zealand', NULL,
                     'ezyVet', 'Conversion', 1500.0, '2024-03-01', '2024-01-10',
                     'Onboarding', 'evan@ezyvet.test', 1, 'Implementation', 'active'),
                    ('P1', '1042', 'Happy Paws (Conversion - Cornerstone)', 'Evan Wong',
                     'Ana', 'Lee', 'ana@happypaws.test', '555-0100', 'New Zealand', NULL,
                     'ezyVet', 'Conversion', 99.0, '2024-03-01', '2024-01-10',
                     'Onboarding', 'evan@ezyvet.test', 1, 'Monthly Subscription', 'active'),
                    ('P2', '2000', 'Vet Co Fresh Start', 'Thomas Hoyle',
                     'Bo', 'Ng', NULL, NULL, 'France', 'VetGroup',
                     'ezyVet', 'Fresh Start', 800.0, '2024-03-01', '2024-01-15',
                     'Onboarding', 'tom@ezyvet.test', 1, 'Implementation', 'active'),
                    ('P3', '3000', 'Not Yet Due Conversion', 'Evan Wong',
                     'Cy', 'Oh', 'cy@clinic.test', NULL, 'Japan', NULL,
                     'ezyVet', 'Conversion', 700.0, '2024-03-10', '2024-01-20',
                     'Onboarding', 'evan@ezyvet.test', 1, 'Implementation', 'active');
                CREATE TABLE L12_DX_REVENUE (
                    SHIP_SAP_NUMBER_CONVERSION INTEGER, L12_CAG_RECURRING_REVENUE REAL
                );
                INSERT INTO L12_DX_REVENUE VALUES (1042, 5000.0), (3000, 10.0);
                CREATE TABLE Customer (
                    "SAP Customer ID Conversion" TEXT, "SFDC Account Name" TEXT,
                    "Region" TEXT, "Country Key" TEXT, "Marked For Deletion Flag" TEXT
                );
                INSERT INTO Customer VALUES
                    ('1042', 'Happy Paws', 'CA', 'New Zealand', NULL),
                    ('2000', 'Vet Co', 'IDF', 'France', 'X');
                CREATE TABLE VDC_FSR_ACCOUNT_CONTACT (
                    SAP_ID TEXT, IDEXX_REP_FIRST_NAME TEXT, IDEXX_REP_LAST_NAME TEXT,
                    IDEXX_REP_EMAIL TEXT, IDEXX_REP_PHONEW TEXT, ROLE_IN_TERRITORY TEXT
                );
                INSERT INTO VDC_FSR_ACCOUNT_CONTACT VALUES
                    ('1042', 'Vic', 'Vet', 'vic@idexx.test', '555-0200', 'VDC');
                CREATE TABLE cdl_chargebee (SAP TEXT, USERCOUNT INTEGER, STATUS TEXT);
                INSERT INTO cdl_chargebee VALUES ('1042', 12, 'active');
                "#,
            )
            .unwrap();
        backend
    }

    fn completed(outcome: RunOutcome) -> RunOutput {
        match outcome {
            RunOutcome::Completed(output) => output,
            RunOutcome::Skipped => panic!("run was skipped"),
        }
    }

    #[test]
    fn test_end_to_end_on_sqlite() {
        let backend = create_test_backend();
        let pipeline = Pipeline::new(create_test_context());

        let output = completed(pipeline.run(&backend, &RecordSet::default()).unwrap());

        assert_eq!(output.summary.base_rows, 2);
        assert_eq!(output.summary.merged_rows, 2);
        assert_eq!(output.summary.expanded_rows, 6);
        assert_eq!(output.summary.valid_rows, 2);
        assert_eq!(output.summary.invalid_rows, 4);
        assert_eq!(output.revenue.len(), 6);

        let ctx = pipeline.context();
        assert_eq!(output.valid.columns(), ctx.export_columns.as_slice());
        assert_eq!(output.invalid.columns(), ctx.failed_export_columns().as_slice());

        let stakeholder = &output.valid.records()[0];
        assert_eq!(stakeholder.get("SAP ID"), &Value::text("1042"));
        assert_eq!(stakeholder.get("Email"), &Value::text("ana@happypaws.test"));
        assert_eq!(stakeholder.get("Account Name - SAP ID"), &Value::text("Happy Paws-1042"));
        assert_eq!(stakeholder.get("Role"), &Value::text("Project Stakeholder"));
        assert_eq!(stakeholder.get("Region"), &Value::text("APAC"));
        assert_eq!(stakeholder.get("SaaS Fee"), &Value::Float(99.0));
        assert_eq!(stakeholder.get("Implementation Fee"), &Value::Float(1500.0));
        assert_eq!(stakeholder.get("IDEXX DX Spend"), &Value::Float(5000.0));
        assert_eq!(stakeholder.get("User Bracket"), &Value::text("10-19"));
        assert_eq!(stakeholder.get("Converted From"), &Value::text("Cornerstone"));
        assert_eq!(stakeholder.get("# of Implementers"), &Value::text("2"));

        let vdc = &output.valid.records()[1];
        assert_eq!(vdc.get("Role"), &Value::text("VDC"));
        assert_eq!(vdc.get("Email"), &Value::text("vic@idexx.test"));

        let failed_origin: Vec<String> = output
            .invalid
            .column_values("Record Origin")
            .map(|v| v.render_or_empty())
            .collect();
        assert!(failed_origin.iter().all(|o| o == "TEAMWORK"));
        println!("✅ {}", output.summary.summary());
    }

    #[test]
    fn test_skipped_when_base_has_no_identity() {
        let backend = StaticBackend::new().respond(
            Source::Teamwork,
            RecordSet::from_records(vec![create_test_project("a", Value::Null, "TEAMWORK")]),
        );
        let outcome = Pipeline::new(create_test_context())
            .run(&backend, &RecordSet::default())
            .unwrap();

        assert_eq!(outcome, RunOutcome::Skipped);
        assert_eq!(backend.executed_sources(), vec![Source::Mavenlink, Source::Teamwork]);
    }

    fn create_test_supplements(backend: StaticBackend) -> StaticBackend {
        backend.respond(
            Source::SapCustomer,
            RecordSet::from_records(vec![
                Record::new().with("SAP ID", "100").with("sap_account_name", "Alpha Vets"),
                Record::new().with("SAP ID", "300").with("sap_account_name", "Gamma Vets"),
            ]),
        )
    }

    #[test]
    fn test_carry_forward_refetch_and_revalidation() {
        let base = RecordSet::from_records(vec![
            create_test_project("a", Value::text("100"), "MAVENLINK"),
            create_test_project("b", Value::text("200"), "MAVENLINK"),
        ]);
        let refetched = RecordSet::from_records(vec![create_test_project(
            "c",
            Value::text("300"),
            "MAVENLINK",
        )]);
        let backend = create_test_supplements(
            StaticBackend::new()
                .respond(Source::Mavenlink, base)
                .respond(Source::MavenlinkPrevious, refetched),
        );

        // Previously failed: 300 with a matching fact, 200 with a different one
        let carry_forward = RecordSet::from_records(vec![
            Record::new()
                .with("SAP ID", "300.0")
                .with("Role", "Project Stakeholder")
                .with("Project Name", "Project c")
                .with("Project Type", "Fresh Start - Remote")
                .with("Record Origin", "MAVENLINK"),
            Record::new()
                .with("SAP ID", "200")
                .with("Role", "Project Stakeholder")
                .with("Project Name", "Renamed project")
                .with("Project Type", "Fresh Start - Remote")
                .with("Record Origin", "MAVENLINK"),
        ]);

        let output = completed(
            Pipeline::new(create_test_context())
                .run(&backend, &carry_forward)
                .unwrap(),
        );
        assert_eq!(output.summary.base_rows, 2);
        assert_eq!(output.summary.refetched_rows, 1);

        let refetch_plan = backend.plan_for(Source::MavenlinkPrevious).unwrap();
        let sql = refetch_plan.compile(&crate::predicate::SnowflakeDialect).sql;
        assert!(sql.contains("SAP_ID IN ('300')"));

        let valid_ids: Vec<String> = output
            .valid
            .column_values("SAP ID")
            .map(|v| v.render_or_empty())
            .collect();
        assert_eq!(valid_ids, vec!["100", "300"]);
    }

    #[test]
    fn test_custom_range_skips_revalidation() {
        let ctx = create_test_context()
            .with_custom_range(DateRange::parse("2024-01-01", "2024-01-31").unwrap());
        let base = RecordSet::from_records(vec![create_test_project(
            "a",
            Value::text("100"),
            "TEAMWORK",
        )]);
        let backend = create_test_supplements(StaticBackend::new().respond(Source::Teamwork, base));
        let carry_forward = RecordSet::from_records(vec![Record::new()
            .with("SAP ID", "100")
            .with("Record Origin", "TEAMWORK")]);

        let output = completed(Pipeline::new(ctx).run(&backend, &carry_forward).unwrap());
        assert_eq!(output.summary.valid_rows, 1);
        assert!(backend.plan_for(Source::TeamworkPrevious).is_none());
    }

    #[test]
    fn test_extraction_failure_aborts_run() {
        let base = RecordSet::from_records(vec![create_test_project(
            "a",
            Value::text("100"),
            "TEAMWORK",
        )]);
        let backend = StaticBackend::new()
            .respond(Source::Teamwork, base)
            .fail_on(Source::VdcContact);

        let err = Pipeline::new(create_test_context())
            .run(&backend, &RecordSet::default())
            .unwrap_err();
        assert_eq!(err.adapter(), Some("vdc_contact"));
    }
}
