// 🧭 Engagement Reconciler CLI
// Runs one reconciliation against a SQLite extract and writes the three CSV exports

use anyhow::{Context, Result};
use clap::Parser;
use engagement_reconciler::config::parse_date;
use engagement_reconciler::logging::{init_logging, LogLevel};
use engagement_reconciler::{
    consolidate, consolidation_lookback, daily_filename, export_filename, read_csv, write_csv,
    DateRange, ExportKind, Pipeline, RecordSet, RunContext, RunOutcome, SqliteBackend,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "engagement-reconciler", version, about = "Reconcile implementation projects into survey and revenue exports")]
struct Cli {
    /// SQLite database holding the source tables
    #[arg(long, env = "RECONCILER_DATABASE")]
    database: PathBuf,

    /// Failed-records CSV from the previous run
    #[arg(long, env = "RECONCILER_PREVIOUS_FAILED")]
    previous_failed: Option<PathBuf>,

    /// Directory the exports are written to
    #[arg(long, env = "RECONCILER_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Start of a custom window (YYYY-MM-DD); requires --to
    #[arg(long, requires = "to")]
    from: Option<String>,

    /// End of a custom window (YYYY-MM-DD); requires --from
    #[arg(long, requires = "from")]
    to: Option<String>,

    /// Reference date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    today: Option<String>,

    /// Days after go-live a project becomes eligible
    #[arg(long, env = "RECONCILER_DAY_FILTER")]
    day_filter: Option<i64>,

    /// JSON file overriding run settings
    #[arg(long, env = "RECONCILER_CONFIG")]
    config: Option<PathBuf>,

    /// Skip the Tuesday/Thursday consolidation of daily exports
    #[arg(long)]
    no_consolidate: bool,

    #[arg(long, env = "RECONCILER_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

fn build_context(cli: &Cli) -> Result<RunContext> {
    let mut ctx = match &cli.config {
        Some(path) => RunContext::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => RunContext::new(),
    };

    if let Some(today) = &cli.today {
        ctx = ctx.with_today(parse_date(today)?);
    }
    if let Some(days) = cli.day_filter {
        ctx.day_filter = days;
    }
    if let (Some(from), Some(to)) = (&cli.from, &cli.to) {
        ctx = ctx.with_custom_range(DateRange::parse(from, to)?);
    }
    Ok(ctx)
}

/// Fold recent daily import and revenue exports into `<output>/consolidated`
fn write_consolidated(output_dir: &Path, ctx: &RunContext) -> Result<()> {
    let Some(lookback) = consolidation_lookback(ctx.today) else {
        info!(today = %ctx.today, "No consolidation scheduled today");
        return Ok(());
    };

    let target = output_dir.join("consolidated");
    std::fs::create_dir_all(&target)
        .with_context(|| format!("Failed to create {}", target.display()))?;

    for (kind, key_columns) in [
        (ExportKind::Import, &ctx.consolidated_key_columns),
        (ExportKind::Revenue, &ctx.revenue_columns),
    ] {
        let records = consolidate(output_dir, kind, ctx.today, lookback, key_columns, ctx)
            .with_context(|| format!("Failed to consolidate {}", kind.prefix()))?;
        if records.is_empty() {
            continue;
        }
        let path = target.join(daily_filename(kind, ctx.today));
        write_csv(&records, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✓ {} ({} rows, {} days)", path.display(), records.len(), lookback);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level)?;

    let ctx = build_context(&cli)?;

    let carry_forward = match &cli.previous_failed {
        Some(path) if path.exists() => read_csv(path, &ctx.na_values)
            .with_context(|| format!("Failed to read previous failures: {}", path.display()))?,
        Some(path) => {
            info!(path = %path.display(), "No previous failures file; starting fresh");
            RecordSet::default()
        }
        None => RecordSet::default(),
    };

    let backend = SqliteBackend::open(&cli.database)
        .with_context(|| format!("Failed to open database: {}", cli.database.display()))?;

    let pipeline = Pipeline::new(ctx);
    let output = match pipeline.run(&backend, &carry_forward)? {
        RunOutcome::Skipped => {
            println!("⏭️  No eligible records; nothing exported");
            return Ok(());
        }
        RunOutcome::Completed(output) => output,
    };

    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("Failed to create {}", cli.output_dir.display()))?;

    let ctx = pipeline.context();
    for (kind, records) in [
        (ExportKind::Import, &output.valid),
        (ExportKind::Revenue, &output.revenue),
        (ExportKind::Failed, &output.invalid),
    ] {
        let path = cli.output_dir.join(export_filename(kind, ctx));
        write_csv(records, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✓ {} ({} rows)", path.display(), records.len());
    }

    if !cli.no_consolidate && !ctx.is_custom_run() {
        write_consolidated(&cli.output_dir, ctx)?;
    }

    println!("✅ {}", output.summary.summary());
    Ok(())
}
