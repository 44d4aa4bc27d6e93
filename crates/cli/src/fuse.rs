//! `lfuse revenue`, `lfuse expenses` and `lfuse check`.

use std::path::{Path, PathBuf};

use ledgerfuse_fusion::config::RunKind;
use ledgerfuse_fusion::engine::{
    load_config, load_expense_sources, load_reference, load_revenue_sources,
};
use ledgerfuse_fusion::error::format_cents;
use ledgerfuse_fusion::rollup::{contributor_trends, donor_contributions, entity_revenue};
use ledgerfuse_fusion::roster::StateRoster;
use ledgerfuse_fusion::source::read_source_text;
use ledgerfuse_fusion::validate::ValidationReport;
use ledgerfuse_fusion::{
    run_expenses, run_revenue, FusionConfig, Normalizer, ReferenceTables, RevenueRun, ValidationSummary,
};
use serde::Serialize;

use crate::exit_codes::{EXIT_ERROR, EXIT_NOTHING_ACCEPTED};
use crate::CliError;

fn fuse_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError::new(code, msg)
}

/// Source and reference paths resolve against the config file's directory.
fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| fuse_err(EXIT_ERROR, format!("JSON serialization error: {e}")))
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents)
        .map_err(|e| fuse_err(EXIT_ERROR, format!("cannot write {}: {e}", path.display())))
}

/// JSON to `--output` and/or stdout. Stdout only ever carries this one value.
fn emit<T: Serialize>(value: &T, json_output: bool, output_file: Option<&Path>) -> Result<(), CliError> {
    let json_str = to_json(value)?;
    if let Some(path) = output_file {
        write_file(path, &json_str)?;
        eprintln!("wrote {}", path.display());
    }
    if json_output {
        println!("{json_str}");
    }
    Ok(())
}

/// Years to keep under `--partial`, or `None` when the run passed as is.
fn partial_years(summary: &ValidationSummary) -> Result<Option<Vec<i32>>, CliError> {
    if summary.passed() {
        return Ok(None);
    }
    let accepted = summary.accepted_years();
    if accepted.is_empty() {
        return Err(fuse_err(EXIT_NOTHING_ACCEPTED, "no year passed validation")
            .with_hint("run without --partial to see every failure"));
    }
    log::warn!("keeping {} accepted year(s): {accepted:?}", accepted.len());
    Ok(Some(accepted))
}

fn validation_error(summary: &ValidationSummary) -> Result<(), CliError> {
    let errors = summary.errors();
    match errors.first() {
        None => Ok(()),
        Some(first) => {
            let mut err = CliError::fusion(first);
            if errors.len() > 1 {
                err.message = format!("{} (and {} more)", err.message, errors.len() - 1);
            }
            Err(err)
        }
    }
}

fn print_reports(reports: &[ValidationReport]) {
    for r in reports {
        let tier = r.tier.map(|t| format!("{t:?}").to_lowercase()).unwrap_or_default();
        let status = if r.passed() { "ok" } else { "FAILED" };
        eprintln!(
            "  {} {:<5} fused {:>16} source {:>16} dev {:>6.2}%  {status}",
            r.year,
            tier,
            format_cents(r.fused_cents),
            format_cents(r.source_cents),
            r.deviation_pct,
        );
    }
}

fn print_summary(kind: RunKind, years: usize, records: usize, summary: &ValidationSummary) {
    let verdict = if summary.passed() { "passed" } else { "failed" };
    eprintln!(
        "{kind}: {years} year(s), {records} records, {} warning(s), validation {verdict}",
        summary.warnings.len()
    );
    print_reports(&summary.reports);
    for e in &summary.run_errors {
        eprintln!("  {e}");
    }
}

// ---------------------------------------------------------------------------
// revenue
// ---------------------------------------------------------------------------

pub fn cmd_revenue(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    rollup_dir: Option<PathBuf>,
    partial: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path, RunKind::Revenue)?;
    let base = base_dir(&config_path);
    let tables = load_reference(&config, base)?;
    let sources = load_revenue_sources(&config, base)?;
    log::info!(
        "loaded {} total, {} government, {} non-government, {} by-type rows",
        sources.entity_totals.len(),
        sources.government.len(),
        sources.non_government.len(),
        sources.contributor_type.len(),
    );

    let mut run = run_revenue(&config, &tables, &sources)?;
    if partial {
        if let Some(years) = partial_years(&run.validation)? {
            run.retain_years(&years);
        }
    }

    emit(&run, json_output, output_file.as_deref())?;
    if let Some(dir) = rollup_dir {
        write_rollups(&config, &tables, &run, &dir)?;
    }

    print_summary(RunKind::Revenue, run.tiers.len(), run.records.len(), &run.validation);
    if !run.gaps.is_empty() {
        eprintln!("mapping gaps: {}", run.gaps.len());
        for gap in &run.gaps {
            eprintln!("  {:?} {:?} ({} rows)", gap.kind, gap.raw, gap.rows);
        }
    }
    if run.dropped.orphan_rows > 0 || run.dropped.unplaced_rows > 0 {
        eprintln!(
            "dropped: {} orphan rows, {} unplaced rows",
            run.dropped.orphan_rows, run.dropped.unplaced_rows
        );
    }

    if partial {
        return Ok(());
    }
    validation_error(&run.validation)
}

fn write_rollups(
    config: &FusionConfig,
    tables: &ReferenceTables,
    run: &RevenueRun,
    dir: &Path,
) -> Result<(), CliError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| fuse_err(EXIT_ERROR, format!("cannot create {}: {e}", dir.display())))?;
    let roster = StateRoster::new(tables, &config.revenue.government_code);

    for year in run.tiers.iter().map(|t| t.year) {
        let entities = entity_revenue(&run.records, year);
        write_file(&dir.join(format!("entity-revenue-{year}.json")), &to_json(&entities)?)?;
        let donors = donor_contributions(&run.records, year, &roster);
        write_file(&dir.join(format!("donors-{year}.json")), &to_json(&donors)?)?;
    }
    let trends = contributor_trends(&run.records, &config.years, &roster);
    write_file(&dir.join("contributor-trends.json"), &to_json(&trends)?)?;

    eprintln!("wrote rollups for {} year(s) to {}", run.tiers.len(), dir.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// expenses
// ---------------------------------------------------------------------------

pub fn cmd_expenses(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    partial: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path, RunKind::Expenses)?;
    let base = base_dir(&config_path);
    let tables = load_reference(&config, base)?;
    let sources = load_expense_sources(&config, base)?;
    log::info!(
        "loaded {} primary, {} secondary rows",
        sources.primary.len(),
        sources.secondary.len()
    );

    let mut run = run_expenses(&config, &tables, &sources)?;
    if partial {
        if let Some(years) = partial_years(&run.validation)? {
            run.retain_years(&years);
        }
    }

    emit(&run, json_output, output_file.as_deref())?;

    let mut years: Vec<i32> = run.records.iter().map(|r| r.year).collect();
    years.dedup();
    print_summary(RunKind::Expenses, years.len(), run.records.len(), &run.validation);
    if !run.secondary_years.is_empty() {
        eprintln!("secondary source fused for: {:?}", run.secondary_years);
    }

    if partial {
        return Ok(());
    }
    validation_error(&run.validation)
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CheckResult {
    valid: bool,
    name: String,
    kind: String,
    years: [i32; 2],
    contrib_types: usize,
    revenue_codes: usize,
}

pub fn cmd_check(config_path: PathBuf, json_output: bool) -> Result<(), CliError> {
    let text = read_source_text(&config_path)?;
    let config = FusionConfig::from_toml(&text)?;
    let tables = load_reference(&config, base_dir(&config_path))?;
    // Building the normalizer checks the reference tables for conflicts.
    Normalizer::new(&tables)?;

    let result = CheckResult {
        valid: true,
        name: config.name.clone(),
        kind: config.kind.to_string(),
        years: [config.years.start, config.years.end],
        contrib_types: tables.contrib_types.len(),
        revenue_codes: tables.revenue_codes.len(),
    };
    if json_output {
        println!("{}", to_json(&result)?);
    }
    eprintln!(
        "valid: {} ({} config, {}-{})",
        config_path.display(),
        result.kind,
        config.years.start,
        config.years.end
    );
    Ok(())
}
