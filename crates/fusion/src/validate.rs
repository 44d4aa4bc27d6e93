//! Post-fusion checks. Fatal failures become [`FusionError`] values on the
//! summary; heuristic findings become warnings.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Serialize, Serializer};

use crate::config::{ExpenseSettings, OtherShareMode, ValidationSettings, YearRange};
use crate::error::{format_cents, FusionError};
use crate::expense::ExpenseFusion;
use crate::model::{ExpenseSource, ExpenseSources, RevenueSources};
use crate::normalize::Normalizer;
use crate::revenue::RevenueFusion;
use crate::tier::TierPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Reconciliation,
    Floor,
    Ceiling,
    OtherShare,
    PrimaryMatch,
    Additive,
    KeepAggregate,
    DuplicateKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Warning,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub kind: CheckKind,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

/// Checks for one fused year.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<TierPolicy>,
    pub fused_cents: i64,
    pub source_cents: i64,
    pub deviation_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_share_pct: Option<f64>,
    pub checks: Vec<CheckOutcome>,
    #[serde(serialize_with = "errors_as_strings")]
    pub errors: Vec<FusionError>,
}

impl ValidationReport {
    fn new(year: i32, tier: Option<TierPolicy>, fused_cents: i64, source_cents: i64) -> Self {
        Self {
            year,
            tier,
            fused_cents,
            source_cents,
            deviation_pct: deviation_pct(fused_cents, source_cents),
            other_share_pct: None,
            checks: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    fn pass(&mut self, kind: CheckKind) {
        self.checks.push(CheckOutcome {
            kind,
            status: CheckStatus::Passed,
            detail: String::new(),
        });
    }

    fn fail(&mut self, kind: CheckKind, error: FusionError) {
        self.checks.push(CheckOutcome {
            kind,
            status: CheckStatus::Failed,
            detail: error.to_string(),
        });
        self.errors.push(error);
    }

    fn outcome(&mut self, kind: CheckKind, status: CheckStatus, detail: String) {
        self.checks.push(CheckOutcome { kind, status, detail });
    }

    fn sanity(&mut self, kind: CheckKind, reason: String) {
        let year = self.year;
        self.fail(kind, FusionError::Sanity { year, reason });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationSummary {
    pub passed: bool,
    pub reports: Vec<ValidationReport>,
    pub warnings: Vec<Warning>,
    /// Failures not tied to a single year (coverage).
    #[serde(serialize_with = "errors_as_strings")]
    pub run_errors: Vec<FusionError>,
}

impl ValidationSummary {
    fn finish(mut self) -> Self {
        self.passed = self.run_errors.is_empty() && self.reports.iter().all(|r| r.passed());
        for w in &self.warnings {
            match w.year {
                Some(year) => log::warn!("{year}: {}", w.message),
                None => log::warn!("{}", w.message),
            }
        }
        for e in self.errors() {
            log::error!("{e}");
        }
        self
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Every fatal failure, run-level first, then per year in year order.
    pub fn errors(&self) -> Vec<&FusionError> {
        self.run_errors
            .iter()
            .chain(self.reports.iter().flat_map(|r| r.errors.iter()))
            .collect()
    }

    /// Years whose own checks all passed.
    pub fn accepted_years(&self) -> Vec<i32> {
        self.reports.iter().filter(|r| r.passed()).map(|r| r.year).collect()
    }

    pub fn ensure_passed(&self) -> Result<(), FusionError> {
        match self.errors().first() {
            Some(e) => Err((*e).clone()),
            None => Ok(()),
        }
    }

    fn warn(&mut self, year: Option<i32>, message: String) {
        self.warnings.push(Warning { year, message });
    }
}

fn errors_as_strings<S: Serializer>(errors: &[FusionError], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(|e| e.to_string()))
}

/// Absolute relative deviation in percent. A zero source total only matches
/// a zero fused total.
pub fn deviation_pct(fused_cents: i64, source_cents: i64) -> f64 {
    if source_cents == 0 {
        if fused_cents == 0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        (fused_cents - source_cents).abs() as f64 / source_cents.abs() as f64 * 100.0
    }
}

/// A deviation must stay strictly below the tolerance. An exact match
/// passes even at zero tolerance.
fn within_tolerance(deviation_pct: f64, tolerance_pct: f64) -> bool {
    deviation_pct == 0.0 || deviation_pct < tolerance_pct
}

fn coverage(years: &YearRange, present: &BTreeSet<i32>) -> Option<FusionError> {
    let missing: Vec<i32> = years.iter().filter(|y| !present.contains(y)).collect();
    if missing.is_empty() {
        None
    } else {
        Some(FusionError::Coverage { missing })
    }
}

fn check_floor(report: &mut ValidationReport, min_total_cents: i64) {
    if report.fused_cents < min_total_cents {
        report.sanity(
            CheckKind::Floor,
            format!(
                "fused total {} is below the floor {}",
                format_cents(report.fused_cents),
                format_cents(min_total_cents)
            ),
        );
    } else {
        report.pass(CheckKind::Floor);
    }
}

/// Validate a revenue fusion against the entity totals it was built from.
pub fn validate_revenue(
    fusion: &RevenueFusion,
    normalizer: &Normalizer,
    sources: &RevenueSources,
    settings: &ValidationSettings,
    years: &YearRange,
    canonical_entities: &BTreeSet<String>,
) -> ValidationSummary {
    let mut summary = ValidationSummary::default();

    let mut source_totals: BTreeMap<i32, i64> = BTreeMap::new();
    for row in &sources.entity_totals {
        *source_totals.entry(row.year).or_insert(0) += row.amount_cents;
    }
    let mut fused_totals: BTreeMap<i32, (i64, i64)> = BTreeMap::new();
    for r in &fusion.records {
        let entry = fused_totals.entry(r.year).or_insert((0, 0));
        entry.0 += r.amount_cents;
        if r.is_other {
            entry.1 += r.amount_cents;
        }
    }

    for yt in &fusion.tiers {
        let Some(&(fused, other)) = fused_totals.get(&yt.year) else {
            continue;
        };
        let source = source_totals.get(&yt.year).copied().unwrap_or(0);
        let mut report = ValidationReport::new(yt.year, Some(yt.tier), fused, source);

        let tolerance = settings.tolerance_for(yt.year);
        if !within_tolerance(report.deviation_pct, tolerance) {
            let error = FusionError::Reconciliation {
                year: yt.year,
                fused_cents: fused,
                source_cents: source,
                deviation_pct: report.deviation_pct,
                tolerance_pct: tolerance,
            };
            report.fail(CheckKind::Reconciliation, error);
        } else {
            report.pass(CheckKind::Reconciliation);
        }

        check_floor(&mut report, settings.min_total_cents);

        if yt.tier == TierPolicy::Tier1 && fused != 0 {
            let share = other as f64 / fused as f64 * 100.0;
            report.other_share_pct = Some(share);
            let in_band = share > settings.other_share_min_pct && share < settings.other_share_max_pct;
            let message = format!(
                "Other share {share:.1}% outside {:.1}-{:.1}%",
                settings.other_share_min_pct, settings.other_share_max_pct
            );
            match (settings.other_share, in_band) {
                (OtherShareMode::Off, _) => {
                    report.outcome(CheckKind::OtherShare, CheckStatus::Skipped, String::new())
                }
                (_, true) => report.pass(CheckKind::OtherShare),
                (OtherShareMode::Warn, false) => {
                    report.outcome(CheckKind::OtherShare, CheckStatus::Warning, message.clone());
                    summary.warn(Some(yt.year), message);
                }
                (OtherShareMode::Strict, false) => report.sanity(CheckKind::OtherShare, message),
            }
        }

        summary.reports.push(report);
    }

    let present: BTreeSet<i32> = fused_totals.keys().copied().collect();
    if let Some(e) = coverage(years, &present) {
        summary.run_errors.push(e);
    }

    if !canonical_entities.is_empty() {
        let canonical: BTreeSet<String> =
            canonical_entities.iter().map(|e| normalizer.normalize_entity(e)).collect();
        let fused: BTreeSet<&str> = fusion.records.iter().map(|r| r.entity.as_str()).collect();
        for entity in fused.iter().filter(|e| !canonical.contains(**e)) {
            summary.warn(None, format!("entity '{entity}' is not in the canonical entity list"));
        }
        for entity in canonical.iter().filter(|e| !fused.contains(e.as_str())) {
            summary.warn(None, format!("canonical entity '{entity}' has no fused revenue"));
        }
    }

    summary.finish()
}

/// Validate an expense fusion against its primary source.
pub fn validate_expenses(
    fusion: &ExpenseFusion,
    normalizer: &Normalizer,
    sources: &ExpenseSources,
    expenses: &ExpenseSettings,
    settings: &ValidationSettings,
    years: &YearRange,
) -> ValidationSummary {
    let mut summary = ValidationSummary::default();

    let mut primary: BTreeMap<(i32, String), i64> = BTreeMap::new();
    let mut primary_totals: BTreeMap<i32, i64> = BTreeMap::new();
    for row in &sources.primary {
        let entity = normalizer.normalize_entity(&row.entity_code);
        *primary.entry((row.year, entity)).or_insert(0) += row.amount_cents;
        *primary_totals.entry(row.year).or_insert(0) += row.amount_cents;
    }

    let mut key_counts: BTreeMap<(i32, &str), usize> = BTreeMap::new();
    let mut by_year: BTreeMap<i32, Vec<&crate::model::FusedExpenseRecord>> = BTreeMap::new();
    for r in &fusion.records {
        *key_counts.entry((r.year, r.entity.as_str())).or_insert(0) += 1;
        by_year.entry(r.year).or_default().push(r);
    }

    let secondary_years: BTreeSet<i32> = fusion.secondary_years.iter().copied().collect();
    let additive: BTreeSet<String> =
        expenses.additive.iter().map(|e| normalizer.normalize_entity(e)).collect();
    let keep: BTreeSet<String> =
        expenses.keep_aggregate.iter().map(|e| normalizer.normalize_entity(e)).collect();

    for (&year, rows) in &by_year {
        let fused: i64 = rows.iter().map(|r| r.amount_cents).sum();
        let source = primary_totals.get(&year).copied().unwrap_or(0);
        let mut report = ValidationReport::new(year, None, fused, source);

        let dups: Vec<&str> = key_counts
            .iter()
            .filter(|((y, _), n)| *y == year && **n > 1)
            .map(|((_, e), _)| *e)
            .collect();
        if dups.is_empty() {
            report.pass(CheckKind::DuplicateKey);
        }
        for entity in dups {
            report.fail(
                CheckKind::DuplicateKey,
                FusionError::DuplicateKey {
                    entity: entity.to_string(),
                    year,
                },
            );
        }

        check_floor(&mut report, settings.min_total_cents);
        if let Some(max) = settings.max_total_cents {
            if fused > max {
                report.sanity(
                    CheckKind::Ceiling,
                    format!(
                        "fused total {} is above the ceiling {}",
                        format_cents(fused),
                        format_cents(max)
                    ),
                );
            } else {
                report.pass(CheckKind::Ceiling);
            }
        }

        for r in rows.iter().filter(|r| r.amount_cents < 0) {
            summary.warn(
                Some(year),
                format!("entity '{}' has a negative total {}", r.entity, format_cents(r.amount_cents)),
            );
        }

        if secondary_years.contains(&year) {
            let mut additive_ok = true;
            for entity in &additive {
                let fused_amt: i64 = rows.iter().filter(|r| r.entity == *entity).map(|r| r.amount_cents).sum();
                let primary_amt = primary.get(&(year, entity.clone())).copied().unwrap_or(0);
                if fused_amt < primary_amt {
                    additive_ok = false;
                    report.sanity(
                        CheckKind::Additive,
                        format!(
                            "entity '{entity}' fused {} is below its primary {}",
                            format_cents(fused_amt),
                            format_cents(primary_amt)
                        ),
                    );
                }
            }
            if additive_ok {
                report.pass(CheckKind::Additive);
            }

            let mut keep_ok = true;
            for r in rows.iter().filter(|r| keep.contains(&r.entity)) {
                if r.source != ExpenseSource::Aggregate {
                    keep_ok = false;
                    report.sanity(
                        CheckKind::KeepAggregate,
                        format!("entity '{}' should come from the aggregate source, got {}", r.entity, r.source),
                    );
                }
            }
            if keep_ok {
                report.pass(CheckKind::KeepAggregate);
            }
            log::debug!(
                "{year}: fused {} against primary {}",
                format_cents(fused),
                format_cents(source)
            );
        } else if !within_tolerance(report.deviation_pct, settings.primary_match_tolerance_pct) {
            let error = FusionError::Reconciliation {
                year,
                fused_cents: fused,
                source_cents: source,
                deviation_pct: report.deviation_pct,
                tolerance_pct: settings.primary_match_tolerance_pct,
            };
            report.fail(CheckKind::PrimaryMatch, error);
        } else {
            report.pass(CheckKind::PrimaryMatch);
        }

        summary.reports.push(report);
    }

    let present: BTreeSet<i32> = by_year.keys().copied().collect();
    if let Some(e) = coverage(years, &present) {
        summary.run_errors.push(e);
    }

    summary.finish()
}
