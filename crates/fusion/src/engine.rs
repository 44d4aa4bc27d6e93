use std::collections::BTreeSet;
use std::path::Path;

use crate::config::{FusionConfig, RunKind, TableConfig};
use crate::error::FusionError;
use crate::expense::fuse_expenses;
use crate::model::{ExpenseRun, ExpenseSources, RevenueRun, RevenueSources, RunMeta};
use crate::normalize::Normalizer;
use crate::reference::ReferenceTables;
use crate::revenue::fuse_revenue;
use crate::source::{load_contrib_types, load_contributions, load_expenses, read_source_text};
use crate::validate::{validate_expenses, validate_revenue};

fn meta(config: &FusionConfig, cutover_year: Option<i32>) -> RunMeta {
    RunMeta {
        config_name: config.name.clone(),
        kind: config.kind.to_string(),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        run_at: chrono::Utc::now().to_rfc3339(),
        cutover_year,
    }
}

/// Configured years that have data, in order. Source years outside the
/// configured range are reported and skipped.
fn years_in_range(config: &FusionConfig, available: BTreeSet<i32>) -> Vec<i32> {
    let (inside, outside): (Vec<i32>, Vec<i32>) =
        available.into_iter().partition(|y| config.years.contains(*y));
    if !outside.is_empty() {
        log::info!("skipping years outside {}-{}: {outside:?}", config.years.start, config.years.end);
    }
    inside
}

/// Fuse and validate revenue. Returns the run even when validation fails;
/// callers decide what a failed summary means.
pub fn run_revenue(
    config: &FusionConfig,
    tables: &ReferenceTables,
    sources: &RevenueSources,
) -> Result<RevenueRun, FusionError> {
    config.validate()?;
    let normalizer = Normalizer::new(tables)?;

    let total_years: BTreeSet<i32> = sources.entity_totals.iter().map(|r| r.year).collect();
    let gov_years: BTreeSet<i32> = sources.government.iter().map(|r| r.year).collect();
    let years = years_in_range(config, total_years.intersection(&gov_years).copied().collect());

    let fusion = fuse_revenue(&normalizer, &config.revenue, sources, &years);
    let validation = validate_revenue(
        &fusion,
        &normalizer,
        sources,
        &config.validation,
        &config.years,
        &tables.canonical_entities,
    );

    Ok(RevenueRun {
        meta: meta(config, Some(config.revenue.cutover_year)),
        tiers: fusion.tiers,
        records: fusion.records,
        gaps: fusion.gaps,
        dropped: fusion.dropped,
        validation,
    })
}

pub fn run_expenses(
    config: &FusionConfig,
    tables: &ReferenceTables,
    sources: &ExpenseSources,
) -> Result<ExpenseRun, FusionError> {
    config.validate()?;
    let normalizer = Normalizer::new(tables)?;

    let years = years_in_range(config, sources.primary.iter().map(|r| r.year).collect());
    let fusion = fuse_expenses(&normalizer, &config.expenses, sources, &years);
    let validation = validate_expenses(
        &fusion,
        &normalizer,
        sources,
        &config.expenses,
        &config.validation,
        &config.years,
    );

    Ok(ExpenseRun {
        meta: meta(config, None),
        secondary_years: fusion.secondary_years,
        records: fusion.records,
        validation,
    })
}

impl RevenueRun {
    /// Drop every fused year not in `years`. Validation is left untouched so
    /// the rejected years stay visible.
    pub fn retain_years(&mut self, years: &[i32]) {
        self.records.retain(|r| years.contains(&r.year));
        self.tiers.retain(|t| years.contains(&t.year));
    }
}

impl ExpenseRun {
    pub fn retain_years(&mut self, years: &[i32]) {
        self.records.retain(|r| years.contains(&r.year));
        self.secondary_years.retain(|y| years.contains(y));
    }
}

// ---------------------------------------------------------------------------
// Loading from disk
// ---------------------------------------------------------------------------

fn read_table(base_dir: &Path, file: &str) -> Result<String, FusionError> {
    read_source_text(&base_dir.join(file))
}

/// Built-in reference tables, optionally replaced per table from the
/// configured TOML file and contribution-type CSV.
pub fn load_reference(config: &FusionConfig, base_dir: &Path) -> Result<ReferenceTables, FusionError> {
    let mut tables = match &config.reference.reference_file {
        Some(file) => ReferenceTables::from_toml(&read_table(base_dir, file)?)?,
        None => ReferenceTables::builtin(),
    };
    if let Some(file) = &config.reference.contrib_types_file {
        tables.contrib_types = load_contrib_types(&read_table(base_dir, file)?)?;
        log::debug!("{file}: {} contribution types", tables.contrib_types.len());
    }
    Ok(tables)
}

fn load_revenue_table(
    name: &str,
    table: Option<&TableConfig<crate::config::ContributionColumns>>,
    base_dir: &Path,
) -> Result<Vec<crate::model::RawContribution>, FusionError> {
    match table {
        Some(t) => load_contributions(name, &read_table(base_dir, &t.file)?, &t.columns),
        None => Ok(Vec::new()),
    }
}

fn load_expense_table(
    name: &str,
    table: Option<&TableConfig<crate::config::ExpenseColumns>>,
    base_dir: &Path,
) -> Result<Vec<crate::model::RawExpense>, FusionError> {
    match table {
        Some(t) => load_expenses(name, &read_table(base_dir, &t.file)?, &t.columns),
        None => Ok(Vec::new()),
    }
}

/// Load every configured revenue table. Paths resolve against `base_dir`.
pub fn load_revenue_sources(config: &FusionConfig, base_dir: &Path) -> Result<RevenueSources, FusionError> {
    let s = &config.sources;
    Ok(RevenueSources {
        entity_totals: load_revenue_table("entity_totals", s.entity_totals.as_ref(), base_dir)?,
        government: load_revenue_table("government", s.government.as_ref(), base_dir)?,
        non_government: load_revenue_table("non_government", s.non_government.as_ref(), base_dir)?,
        contributor_type: load_revenue_table("contributor_type", s.contributor_type.as_ref(), base_dir)?,
    })
}

pub fn load_expense_sources(config: &FusionConfig, base_dir: &Path) -> Result<ExpenseSources, FusionError> {
    let s = &config.sources;
    Ok(ExpenseSources {
        primary: load_expense_table("primary", s.primary.as_ref(), base_dir)?,
        secondary: load_expense_table("secondary", s.secondary.as_ref(), base_dir)?,
    })
}

/// Parse, validate and load a config file whose kind must match `kind`.
pub fn load_config(path: &Path, kind: RunKind) -> Result<FusionConfig, FusionError> {
    let text = read_source_text(path)?;
    let config = FusionConfig::from_toml(&text)?;
    if config.kind != kind {
        return Err(FusionError::ConfigValidation(format!(
            "{} is a {} config, expected {kind}",
            path.display(),
            config.kind
        )));
    }
    Ok(config)
}
