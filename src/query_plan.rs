// 🧭 Query Plan Builder - Compiles a source adapter into an extraction query
// Projections, joins, predicates and the optional group-by list are resolved
// once; rendering to SQL text happens per backend dialect

use crate::adapters::{Source, SourceAdapter};
use crate::config::RunContext;
use crate::error::{ReconcileError, Result};
use crate::predicate::{is_identifier, Dialect, Expr, Literal};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::warn;

/// Alias of the adapter's own table in every plan
pub const BASE_ALIAS: &str = "main";

// ============================================================================
// PLAN TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Column spec as declared by the adapter
    pub source: String,
    /// Escaped SQL expression
    pub expression: String,
    /// Canonical output name
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedJoin {
    pub table: String,
    pub alias: String,
    pub outer: bool,
    pub on: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub source: Source,
    pub database: String,
    pub schema: String,
    pub table: String,
    pub projections: Vec<Projection>,
    pub joins: Vec<PlannedJoin>,
    pub predicates: Vec<Expr>,
    pub group_by: Option<Vec<String>>,
}

/// SQL text plus the values bound to its placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Literal>,
}

impl CompiledQuery {
    /// Stable hash of the query text and bound values, for log correlation
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sql.as_bytes());
        for p in &self.params {
            hasher.update(format!("{:?}", p).as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl QueryPlan {
    /// Adapter name the plan was compiled from
    pub fn adapter(&self) -> &'static str {
        self.source.code()
    }

    /// Canonical output names in projection order
    pub fn output_columns(&self) -> Vec<String> {
        self.projections.iter().map(|p| p.alias.clone()).collect()
    }

    pub fn compile(&self, dialect: &dyn Dialect) -> CompiledQuery {
        let mut params = Vec::new();
        let mut sql = String::from("SELECT ");

        let select: Vec<String> = self
            .projections
            .iter()
            .map(|p| format!("{} AS \"{}\"", p.expression, p.alias.replace('"', "\"\"")))
            .collect();
        sql.push_str(&select.join(", "));

        sql.push_str(&format!(
            "\nFROM {} AS {}",
            dialect.table_ref(&self.database, &self.schema, &self.table),
            BASE_ALIAS
        ));

        for join in &self.joins {
            let kind = if join.outer { "LEFT OUTER JOIN" } else { "JOIN" };
            let on = join.on.render(dialect, &mut params);
            sql.push_str(&format!(
                "\n{} {} AS {} ON {}",
                kind,
                dialect.table_ref(&self.database, &self.schema, &join.table),
                join.alias,
                on
            ));
        }

        if !self.predicates.is_empty() {
            let clauses: Vec<String> = self
                .predicates
                .iter()
                .map(|p| format!("({})", p.render(dialect, &mut params)))
                .collect();
            sql.push_str("\nWHERE ");
            sql.push_str(&clauses.join("\nAND "));
        }

        if let Some(group_by) = &self.group_by {
            if !group_by.is_empty() {
                sql.push_str("\nGROUP BY ");
                sql.push_str(&group_by.join(", "));
            }
        }

        CompiledQuery { sql, params }
    }
}

// ============================================================================
// COLUMN HELPERS
// ============================================================================

/// Escape a column spec for the SELECT list
///
/// `alias.name with space` → `alias."name with space"` (unless already quoted),
/// `name with space` → `"name with space"`, anything else verbatim.
pub fn quote_column(spec: &str) -> String {
    if !spec.contains(' ') {
        return spec.to_string();
    }
    match spec.split_once('.') {
        Some((qualifier, name)) => {
            if name.contains('"') {
                format!("{}.{}", qualifier, name)
            } else {
                format!("{}.\"{}\"", qualifier, name)
            }
        }
        None if spec.starts_with('"') => spec.to_string(),
        None => format!("\"{}\"", spec),
    }
}

/// Output name: the mapped name, else the unqualified part without quotes
pub fn output_alias(spec: &str, column_map: &HashMap<String, String>) -> String {
    let fallback = spec.split_once('.').map(|(_, name)| name).unwrap_or(spec);
    column_map
        .get(spec)
        .map(String::as_str)
        .unwrap_or(fallback)
        .trim_matches('"')
        .to_string()
}

/// Table alias a column spec refers to, when it has a plain identifier prefix
fn spec_qualifier(spec: &str) -> Option<&str> {
    spec.split_once('.')
        .map(|(q, _)| q)
        .filter(|q| is_identifier(q))
}

// ============================================================================
// BUILDER
// ============================================================================

pub struct QueryPlanBuilder {
    /// Column specs containing any of these stay out of GROUP BY (default: `SUM(`)
    pub aggregate_markers: Vec<String>,
}

impl QueryPlanBuilder {
    pub fn new() -> Self {
        QueryPlanBuilder {
            aggregate_markers: vec!["SUM(".to_string()],
        }
    }

    pub fn from_context(ctx: &RunContext) -> Self {
        QueryPlanBuilder {
            aggregate_markers: ctx.aggregate_markers.clone(),
        }
    }

    pub fn build(&self, adapter: &dyn SourceAdapter) -> Result<QueryPlan> {
        let name = adapter.name();
        let joins = Self::parse_joins(adapter)?;

        let mut known_aliases: Vec<&str> = vec![BASE_ALIAS];
        known_aliases.extend(joins.iter().map(|j| j.alias.as_str()));
        let check_alias = |qualifier: &str, context: &str| -> Result<()> {
            if known_aliases.iter().any(|known| *known == qualifier) {
                Ok(())
            } else {
                Err(ReconcileError::configuration(
                    name,
                    format!("{} refers to unknown table alias '{}'", context, qualifier),
                ))
            }
        };

        let column_map = adapter.column_map();
        let mut projections: Vec<Projection> = Vec::new();
        for spec in adapter.columns() {
            if let Some(qualifier) = spec_qualifier(&spec) {
                check_alias(qualifier, &format!("column {}", spec))?;
            }
            let alias = output_alias(&spec, &column_map);
            if let Some(existing) = projections.iter().find(|p| p.alias == alias) {
                // Two explicit mappings to one name is a declaration bug;
                // a fallback name that collides is tolerated
                if column_map.contains_key(&spec) && column_map.contains_key(&existing.source) {
                    return Err(ReconcileError::configuration(
                        name,
                        format!(
                            "columns {} and {} both map to output name '{}'",
                            existing.source, spec, alias
                        ),
                    ));
                }
                warn!(
                    adapter = name,
                    kept = %existing.source,
                    skipped = %spec,
                    alias = %alias,
                    "Fallback output name collides; keeping the first projection"
                );
                continue;
            }
            projections.push(Projection {
                expression: quote_column(&spec),
                source: spec,
                alias,
            });
        }

        for join in &joins {
            for qualifier in join.on.qualifiers() {
                check_alias(&qualifier, &format!("join condition of {}", join.alias))?;
            }
        }

        let predicates = adapter.exclusions();
        for predicate in &predicates {
            for qualifier in predicate.qualifiers() {
                check_alias(&qualifier, "exclusion predicate")?;
            }
        }

        let group_by = if adapter.group_by() {
            Some(
                projections
                    .iter()
                    .filter(|p| {
                        !self
                            .aggregate_markers
                            .iter()
                            .any(|marker| p.source.contains(marker.as_str()))
                    })
                    .map(|p| p.expression.clone())
                    .collect(),
            )
        } else {
            None
        };

        Ok(QueryPlan {
            source: adapter.source(),
            database: adapter.database().to_string(),
            schema: adapter.schema().to_string(),
            table: adapter.table().to_string(),
            projections,
            joins,
            predicates,
            group_by,
        })
    }

    fn parse_joins(adapter: &dyn SourceAdapter) -> Result<Vec<PlannedJoin>> {
        let mut joins: Vec<PlannedJoin> = Vec::new();
        for decl in adapter.joins() {
            let malformed = || {
                ReconcileError::configuration(
                    adapter.name(),
                    format!("malformed join key '{}': expected \"table:alias\"", decl.key),
                )
            };
            let (table, alias) = decl.key.split_once(':').ok_or_else(malformed)?;
            let (table, alias) = (table.trim(), alias.trim());
            if table.is_empty() || !is_identifier(alias) {
                return Err(malformed());
            }
            if alias == BASE_ALIAS || joins.iter().any(|j| j.alias == alias) {
                return Err(ReconcileError::configuration(
                    adapter.name(),
                    format!("join alias '{}' is already in use", alias),
                ));
            }
            joins.push(PlannedJoin {
                table: table.to_string(),
                alias: alias.to_string(),
                outer: decl.outer,
                on: decl.on,
            });
        }
        Ok(joins)
    }
}

impl Default for QueryPlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
