// 🧪 Test Support - Canned extraction backend that records every plan it runs

use crate::adapters::Source;
use crate::backend::ExtractionBackend;
use crate::error::BackendError;
use crate::query_plan::QueryPlan;
use crate::record::{Record, RecordSet, Value};
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Default)]
pub struct StaticBackend {
    responses: HashMap<Source, RecordSet>,
    failing: Option<Source>,
    executed: RefCell<Vec<QueryPlan>>,
}

impl StaticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, source: Source, records: RecordSet) -> Self {
        self.responses.insert(source, records);
        self
    }

    pub fn fail_on(mut self, source: Source) -> Self {
        self.failing = Some(source);
        self
    }

    pub fn executed_sources(&self) -> Vec<Source> {
        self.executed.borrow().iter().map(|p| p.source).collect()
    }

    pub fn plan_for(&self, source: Source) -> Option<QueryPlan> {
        self.executed
            .borrow()
            .iter()
            .find(|p| p.source == source)
            .cloned()
    }
}

impl ExtractionBackend for StaticBackend {
    fn execute(&self, plan: &QueryPlan) -> Result<RecordSet, BackendError> {
        self.executed.borrow_mut().push(plan.clone());
        if self.failing == Some(plan.source) {
            return Err(BackendError::Unavailable("connection refused".to_string()));
        }
        Ok(self
            .responses
            .get(&plan.source)
            .cloned()
            .unwrap_or_else(|| RecordSet::new(plan.output_columns())))
    }
}

/// Base-source row with the columns the pipeline relies on
pub fn create_test_project(unique_id: &str, sap_id: Value, origin: &str) -> Record {
    Record::new()
        .with("UNIQUE ID", unique_id)
        .with("SAP ID", sap_id)
        .with("Project Name", format!("Project {}", unique_id))
        .with("Project Type", "Fresh Start - Remote")
        .with("Project Go Live date", "2024-03-01")
        .with("Product", "ezyVet")
        .with("First Name", "Ana")
        .with("Last Name", "Lee")
        .with("Email", format!("contact{}@clinic.test", unique_id))
        .with("Record Origin", origin)
}
