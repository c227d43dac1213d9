// ⚖️ Reconciliation Engine - Build one canonical record set from every source
// Base sources are extracted and deduplicated, previously failed identities are
// refetched, then supplemental sources are left-joined on the identity column

use crate::adapters::{get_adapter, AdapterParams, Source, SourceAdapter};
use crate::backend::ExtractionBackend;
use crate::config::RunContext;
use crate::deduplication::DeduplicationResolver;
use crate::error::{ReconcileError, Result, Stage};
use crate::identity::{normalize_identity_value, valid_identity, IdentityKey};
use crate::query_plan::QueryPlanBuilder;
use crate::record::{Record, RecordSet, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Suffix for supplemental columns whose name is already taken
pub const SUPPLEMENT_SUFFIX: &str = "_supp";

/// Builds the adapter for a source; defaults to `get_adapter`
pub type AdapterFactory = fn(Source, AdapterParams) -> Box<dyn SourceAdapter>;

// ============================================================================
// BASE SET
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefetchRequest {
    pub source: Source,
    pub identities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseSet {
    pub records: RecordSet,

    /// Rows from the current-window base extraction
    pub base_rows: usize,

    /// Rows added by the carry-forward refetch
    pub refetched_rows: usize,

    pub refetch_requests: Vec<RefetchRequest>,
}

/// Distinct valid identities of a record set, sorted
pub fn identities_of(records: &RecordSet, ctx: &RunContext) -> BTreeSet<IdentityKey> {
    records
        .column_values(&ctx.identity_column)
        .filter_map(|v| valid_identity(v, &ctx.sentinels))
        .collect()
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine<'a> {
    backend: &'a dyn ExtractionBackend,
    builder: QueryPlanBuilder,
    resolver: DeduplicationResolver,
    factory: AdapterFactory,
    pub base_sources: Vec<Source>,
    pub supplemental_sources: Vec<Source>,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(backend: &'a dyn ExtractionBackend, ctx: &RunContext) -> Self {
        ReconciliationEngine {
            backend,
            builder: QueryPlanBuilder::from_context(ctx),
            resolver: DeduplicationResolver::from_context(ctx),
            factory: get_adapter,
            base_sources: Source::base(),
            supplemental_sources: Source::supplemental(),
        }
    }

    /// Builder pattern: swap how adapters are constructed
    pub fn with_adapter_factory(mut self, factory: AdapterFactory) -> Self {
        self.factory = factory;
        self
    }

    fn adapter(&self, source: Source, params: AdapterParams) -> Box<dyn SourceAdapter> {
        (self.factory)(source, params)
    }

    /// Compile every adapter the run may touch without executing anything
    ///
    /// Configuration errors depend only on declarations, so the unscoped
    /// parameters are enough to surface them before the first extraction.
    pub fn validate_plans(&self, ctx: &RunContext) -> Result<usize> {
        let sources: Vec<Source> = self
            .base_sources
            .iter()
            .flat_map(|s| std::iter::once(*s).chain(s.previous_variant()))
            .chain(self.supplemental_sources.iter().copied())
            .collect();

        for &source in &sources {
            let adapter = self.adapter(source, AdapterParams::from_context(ctx));
            self.builder.build(adapter.as_ref())?;
        }
        debug!(plans = sources.len(), "Validated query plans");
        Ok(sources.len())
    }

    /// Compile and run one adapter; failures name the adapter and stage
    pub fn extract(&self, adapter: &dyn SourceAdapter, stage: Stage) -> Result<RecordSet> {
        let plan = self.builder.build(adapter)?;
        let records = self
            .backend
            .execute(&plan)
            .map_err(|e| ReconcileError::extraction(adapter.name(), stage, e))?;

        info!(
            adapter = adapter.name(),
            stage = %stage,
            rows = records.len(),
            "Extracted records"
        );
        Ok(records)
    }

    /// Union of the deduplicated base sources plus refetched carry-forward rows
    ///
    /// Carry-forward is skipped for an empty set and for custom-range runs.
    pub fn build_base_set(&self, carry_forward: &RecordSet, ctx: &RunContext) -> Result<BaseSet> {
        self.validate_plans(ctx)?;

        let mut base = RecordSet::default();
        for &source in &self.base_sources {
            let adapter = self.adapter(source, AdapterParams::from_context(ctx));
            let extracted = self.extract(adapter.as_ref(), Stage::Extract)?;
            base.extend(self.resolver.resolve(&extracted, &ctx.duplicate_key_columns));
        }
        let base_rows = base.len();

        if carry_forward.is_empty() || ctx.is_custom_run() {
            if ctx.is_custom_run() && !carry_forward.is_empty() {
                info!("Custom range run: carry-forward records are not refetched");
            }
            return Ok(BaseSet {
                records: base,
                base_rows,
                ..BaseSet::default()
            });
        }

        let existing = identities_of(&base, ctx);
        let mut refetched = RecordSet::default();
        let mut refetch_requests = Vec::new();

        for &source in &self.base_sources {
            let (Some(origin), Some(previous)) = (source.origin(), source.previous_variant()) else {
                continue;
            };

            let to_refetch: Vec<String> = carry_forward
                .iter()
                .filter(|r| r.get(&ctx.origin_column).render().as_deref() == Some(origin))
                .filter_map(|r| valid_identity(r.get(&ctx.identity_column), &ctx.sentinels))
                .collect::<BTreeSet<_>>()
                .difference(&existing)
                .map(|k| k.as_str().to_string())
                .collect();

            if to_refetch.is_empty() {
                debug!(origin, "No carry-forward identities to refetch");
                continue;
            }

            info!(origin, identities = to_refetch.len(), "Refetching previously failed records");
            let params = AdapterParams::from_context(ctx).with_sap_ids(to_refetch.clone());
            let adapter = self.adapter(previous, params);
            refetched.extend(self.extract(adapter.as_ref(), Stage::CarryForward)?);
            refetch_requests.push(RefetchRequest {
                source: previous,
                identities: to_refetch,
            });
        }

        let refetched = self
            .resolver
            .resolve(&refetched, &ctx.duplicate_key_columns);
        let before = refetched.len();
        let refetched = refetched.filter(|r| {
            valid_identity(r.get(&ctx.identity_column), &ctx.sentinels)
                .map_or(true, |k| !existing.contains(&k))
        });
        if refetched.len() < before {
            warn!(
                dropped = before - refetched.len(),
                "Refetched rows already present in the base set were dropped"
            );
        }

        let refetched_rows = refetched.len();
        base.extend(refetched);

        Ok(BaseSet {
            records: base,
            base_rows,
            refetched_rows,
            refetch_requests,
        })
    }

    /// Extract every supplemental source scoped to the base identities
    pub fn fetch_supplements(&self, base: &RecordSet, ctx: &RunContext) -> Result<Vec<RecordSet>> {
        let identities: Vec<String> = identities_of(base, ctx)
            .into_iter()
            .map(|k| k.as_str().to_string())
            .collect();

        let mut supplements = Vec::with_capacity(self.supplemental_sources.len());
        for &source in &self.supplemental_sources {
            let params = AdapterParams::from_context(ctx).with_sap_ids(identities.clone());
            let adapter = self.adapter(source, params);
            supplements.push(self.extract(adapter.as_ref(), Stage::Supplement)?);
        }
        Ok(supplements)
    }

    /// Left-join each supplement onto the base set, then coerce column types
    ///
    /// Both join sides are compared as decimal-stripped identity strings.
    /// Unmatched rows keep nulls; several matches fan the row out.
    pub fn merge_supplemental(
        &self,
        base: RecordSet,
        supplements: &[RecordSet],
        join_key: &str,
        ctx: &RunContext,
    ) -> RecordSet {
        let mut merged = base;
        merged.map_column(join_key, normalize_identity_value);

        for supplement in supplements {
            merged = left_join(merged, supplement, join_key);
        }

        coerce_columns(&mut merged, ctx);
        info!(rows = merged.len(), columns = merged.columns().len(), "Merged supplemental records");
        merged
    }
}

/// `Email` → `Email_supp`, then `Email_supp2`, `Email_supp3`, ... once taken
fn supplement_column_name(left: &RecordSet, column: &str) -> String {
    let mut name = format!("{}{}", column, SUPPLEMENT_SUFFIX);
    let mut n = 2;
    while left.has_column(&name) {
        name = format!("{}{}{}", column, SUPPLEMENT_SUFFIX, n);
        n += 1;
    }
    name
}

fn left_join(left: RecordSet, right: &RecordSet, join_key: &str) -> RecordSet {
    // Right-hand column → name it takes in the output
    let renames: Vec<(String, String)> = right
        .columns()
        .iter()
        .filter(|c| c.as_str() != join_key)
        .map(|c| {
            let name = if left.has_column(c) {
                supplement_column_name(&left, c)
            } else {
                c.clone()
            };
            (c.clone(), name)
        })
        .collect();

    let mut index: HashMap<IdentityKey, Vec<&Record>> = HashMap::new();
    for record in right {
        if let Some(key) = IdentityKey::from_value(record.get(join_key)) {
            index.entry(key).or_default().push(record);
        }
    }

    let mut columns = left.columns().to_vec();
    columns.extend(renames.iter().map(|(_, name)| name.clone()));
    let mut joined = RecordSet::new(columns);

    for record in left {
        let matches = IdentityKey::from_value(record.get(join_key))
            .and_then(|key| index.get(&key))
            .filter(|m| !m.is_empty());

        match matches {
            Some(matches) => {
                for supplement in matches {
                    let mut row = record.clone();
                    for (from, to) in &renames {
                        row.set(to, supplement.get(from).clone());
                    }
                    joined.push(row);
                }
            }
            None => joined.push(record),
        }
    }
    joined
}

/// Cast the configured string, float and date columns that are present
pub fn coerce_columns(records: &mut RecordSet, ctx: &RunContext) {
    for column in &ctx.string_columns {
        records.map_column(column, Value::to_text);
    }

    for column in &ctx.float_columns {
        let unparsable = records
            .column_values(column)
            .filter(|v| !v.is_blank() && v.to_float().is_null())
            .count();
        if unparsable > 0 {
            warn!(column = %column, count = unparsable, "Unparsable numeric values set to null");
        }
        records.map_column(column, Value::to_float);
    }

    for column in &ctx.date_columns {
        let unparsable = records
            .column_values(column)
            .filter(|v| !v.is_blank() && v.to_date().is_null())
            .count();
        if unparsable > 0 {
            warn!(column = %column, count = unparsable, "Unparsable dates set to null");
        }
        records.map_column(column, Value::to_date);
    }
}

// ============================================================================
// TESTS
// ============================================================================
