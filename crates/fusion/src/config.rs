use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use serde::Deserialize;

use crate::error::FusionError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FusionConfig {
    pub name: String,
    #[serde(default)]
    pub kind: RunKind,
    pub years: YearRange,
    #[serde(default)]
    pub revenue: RevenueSettings,
    #[serde(default)]
    pub expenses: ExpenseSettings,
    #[serde(default)]
    pub validation: ValidationSettings,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub reference: ReferenceConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    #[default]
    Revenue,
    Expenses,
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Revenue => write!(f, "revenue"),
            Self::Expenses => write!(f, "expenses"),
        }
    }
}

/// Inclusive range of years the run must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }

    pub fn iter(&self) -> RangeInclusive<i32> {
        self.start..=self.end
    }
}

// ---------------------------------------------------------------------------
// Revenue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RevenueSettings {
    /// First year fused with the contributor-type aggregate table.
    pub cutover_year: i32,
    /// Remainders with absolute value at or below this are not emitted.
    pub remainder_threshold_cents: i64,
    pub government_code: String,
    pub no_contributor_code: String,
    /// Code given to government-ledger donors that are not governments.
    pub non_government_code: String,
    /// Donor label of "No Contributor" rows.
    pub no_contributor_label: String,
    /// Donor label of the Tier 1 entity-level remainder.
    pub unattributed_label: String,
}

impl Default for RevenueSettings {
    fn default() -> Self {
        Self {
            cutover_year: 2021,
            remainder_threshold_cents: 100_000,
            government_code: "C01".into(),
            no_contributor_code: "C09".into(),
            non_government_code: "C08".into(),
            no_contributor_label: "Revenue from Activities".into(),
            unattributed_label: "Unattributed".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Expenses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExpenseSettings {
    /// Entities always taken from the primary source.
    pub keep_aggregate: BTreeSet<String>,
    /// Primary-source aggregates replaced by secondary sub-entity detail.
    pub replace_aggregates: BTreeSet<String>,
    /// Entities whose secondary sub-component is added to the primary amount.
    pub additive: BTreeSet<String>,
    /// Secondary `source_type` value added for `additive` entities.
    pub additive_source_type: String,
}

impl Default for ExpenseSettings {
    fn default() -> Self {
        let set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            keep_aggregate: set(&["ITC", "UNHCR", "UNRWA"]),
            replace_aggregates: set(&["UN", "UN-DPO"]),
            additive: set(&["UNEP", "UNODC"]),
            additive_source_type: "Regular assessed".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtherShareMode {
    /// Out-of-band share is a warning.
    #[default]
    Warn,
    /// Out-of-band share fails the year.
    Strict,
    Off,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub strict_tolerance_pct: f64,
    pub loose_tolerance_pct: f64,
    /// Years with known incomplete sources, checked at the loose tolerance.
    pub loose_years: BTreeSet<i32>,
    pub min_total_cents: i64,
    pub max_total_cents: Option<i64>,
    pub other_share_min_pct: f64,
    pub other_share_max_pct: f64,
    pub other_share: OtherShareMode,
    /// Expense years without a secondary source must match the primary total.
    pub primary_match_tolerance_pct: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            strict_tolerance_pct: 0.5,
            loose_tolerance_pct: 2.0,
            loose_years: BTreeSet::new(),
            min_total_cents: 3_000_000_000_000,
            max_total_cents: None,
            other_share_min_pct: 5.0,
            other_share_max_pct: 25.0,
            other_share: OtherShareMode::Warn,
            primary_match_tolerance_pct: 0.1,
        }
    }
}

impl ValidationSettings {
    pub fn tolerance_for(&self, year: i32) -> f64 {
        if self.loose_years.contains(&year) {
            self.loose_tolerance_pct
        } else {
            self.strict_tolerance_pct
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig<C> {
    pub file: String,
    pub columns: C,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContributionColumns {
    pub entity: String,
    pub year: String,
    pub amount: String,
    #[serde(default)]
    pub donor: Option<String>,
    #[serde(default)]
    pub contrib_type: Option<String>,
    #[serde(default)]
    pub rev_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseColumns {
    pub entity: String,
    pub year: String,
    pub amount: String,
    #[serde(default)]
    pub source_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    pub entity_totals: Option<TableConfig<ContributionColumns>>,
    pub government: Option<TableConfig<ContributionColumns>>,
    pub non_government: Option<TableConfig<ContributionColumns>>,
    pub contributor_type: Option<TableConfig<ContributionColumns>>,
    pub primary: Option<TableConfig<ExpenseColumns>>,
    pub secondary: Option<TableConfig<ExpenseColumns>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceConfig {
    /// TOML file overriding individual built-in reference tables.
    #[serde(default)]
    pub reference_file: Option<String>,
    /// `code,name,alt_descriptors` CSV replacing the contribution-type table.
    #[serde(default)]
    pub contrib_types_file: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl FusionConfig {
    pub fn from_toml(input: &str) -> Result<Self, FusionError> {
        let config: FusionConfig =
            toml::from_str(input).map_err(|e| FusionError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FusionError> {
        if self.years.start > self.years.end {
            return Err(FusionError::ConfigValidation(format!(
                "years.start ({}) is after years.end ({})",
                self.years.start, self.years.end
            )));
        }

        let v = &self.validation;
        if !(v.strict_tolerance_pct >= 0.0 && v.strict_tolerance_pct <= v.loose_tolerance_pct) {
            return Err(FusionError::ConfigValidation(format!(
                "tolerances must satisfy 0 <= strict ({}) <= loose ({})",
                v.strict_tolerance_pct, v.loose_tolerance_pct
            )));
        }
        if v.other_share_min_pct > v.other_share_max_pct {
            return Err(FusionError::ConfigValidation(format!(
                "other_share_min_pct ({}) exceeds other_share_max_pct ({})",
                v.other_share_min_pct, v.other_share_max_pct
            )));
        }
        if let Some(max) = v.max_total_cents {
            if max < v.min_total_cents {
                return Err(FusionError::ConfigValidation(format!(
                    "max_total_cents ({max}) is below min_total_cents ({})",
                    v.min_total_cents
                )));
            }
        }

        match self.kind {
            RunKind::Revenue => self.validate_revenue(),
            RunKind::Expenses => self.validate_expenses(),
        }
    }

    fn validate_revenue(&self) -> Result<(), FusionError> {
        let r = &self.revenue;
        if r.remainder_threshold_cents < 0 {
            return Err(FusionError::ConfigValidation(
                "remainder_threshold_cents must not be negative".into(),
            ));
        }
        if r.government_code == r.no_contributor_code {
            return Err(FusionError::ConfigValidation(format!(
                "government_code and no_contributor_code are both '{}'",
                r.government_code
            )));
        }

        let s = &self.sources;
        for (name, table) in [
            ("entity_totals", &s.entity_totals),
            ("government", &s.government),
            ("non_government", &s.non_government),
        ] {
            if table.is_none() {
                return Err(FusionError::ConfigValidation(format!(
                    "revenue run requires sources.{name}"
                )));
            }
        }
        if r.cutover_year <= self.years.end && s.contributor_type.is_none() {
            return Err(FusionError::ConfigValidation(format!(
                "years from {} use the contributor-type table but sources.contributor_type is missing",
                r.cutover_year.max(self.years.start)
            )));
        }
        for (name, table) in [
            ("government", &s.government),
            ("non_government", &s.non_government),
        ] {
            if let Some(t) = table {
                if t.columns.donor.is_none() {
                    return Err(FusionError::ConfigValidation(format!(
                        "sources.{name}.columns.donor is required"
                    )));
                }
            }
        }
        if let Some(t) = &s.contributor_type {
            if t.columns.contrib_type.is_none() {
                return Err(FusionError::ConfigValidation(
                    "sources.contributor_type.columns.contrib_type is required".into(),
                ));
            }
        }
        Ok(())
    }

    fn validate_expenses(&self) -> Result<(), FusionError> {
        if self.sources.primary.is_none() {
            return Err(FusionError::ConfigValidation(
                "expense run requires sources.primary".into(),
            ));
        }
        let e = &self.expenses;
        if let Some(t) = &self.sources.secondary {
            if !e.additive.is_empty() && t.columns.source_type.is_none() {
                return Err(FusionError::ConfigValidation(
                    "additive entities need sources.secondary.columns.source_type".into(),
                ));
            }
        }
        if let Some(entity) = e.keep_aggregate.intersection(&e.replace_aggregates).next() {
            return Err(FusionError::ConfigValidation(format!(
                "entity '{entity}' is both kept and replaced"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
