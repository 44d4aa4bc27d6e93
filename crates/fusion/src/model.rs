use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::tier::TierPolicy;
use crate::validate::ValidationSummary;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One row from a revenue source ledger, exactly as loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawContribution {
    pub entity_code: String,
    pub donor_name_raw: String,
    pub contrib_type_raw: Option<String>,
    pub rev_type_raw: String,
    pub year: i32,
    pub amount_cents: i64,
}

/// One row from an expense source (primary aggregate or secondary breakdown).
#[derive(Debug, Clone, PartialEq)]
pub struct RawExpense {
    pub entity_code: String,
    pub year: i32,
    pub amount_cents: i64,
    pub source_type: Option<String>,
}

/// Pre-loaded revenue tables.
#[derive(Debug, Clone, Default)]
pub struct RevenueSources {
    /// Independently reported total per (entity, year).
    pub entity_totals: Vec<RawContribution>,
    pub government: Vec<RawContribution>,
    pub non_government: Vec<RawContribution>,
    /// "By contributor type" aggregates; consulted for Tier 2 years only.
    pub contributor_type: Vec<RawContribution>,
}

/// Pre-loaded expense tables.
#[derive(Debug, Clone, Default)]
pub struct ExpenseSources {
    pub primary: Vec<RawExpense>,
    pub secondary: Vec<RawExpense>,
}

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// Revenue-type bucket. Declaration order is the canonical sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RevenueBucket {
    #[serde(rename = "Assessed")]
    Assessed,
    #[serde(rename = "Voluntary un-earmarked")]
    VoluntaryUnearmarked,
    #[serde(rename = "Voluntary earmarked")]
    VoluntaryEarmarked,
    #[serde(rename = "Other")]
    Other,
}

impl RevenueBucket {
    pub const ALL: [RevenueBucket; 4] = [
        Self::Assessed,
        Self::VoluntaryUnearmarked,
        Self::VoluntaryEarmarked,
        Self::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Assessed => "Assessed",
            Self::VoluntaryUnearmarked => "Voluntary un-earmarked",
            Self::VoluntaryEarmarked => "Voluntary earmarked",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for RevenueBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Contribution-type classification carried by a record.
///
/// `Unknown` is an unmapped descriptor; `Unattributed` marks the Tier 1
/// entity-level remainder, which belongs to no category at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContribClass {
    Code(String),
    Unknown,
    Unattributed,
}

impl ContribClass {
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Code(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.code() == Some(code)
    }
}

impl fmt::Display for ContribClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(c) => f.write_str(c),
            Self::Unknown => f.write_str("Unknown"),
            Self::Unattributed => f.write_str("Other"),
        }
    }
}

impl Serialize for ContribClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Donor classification. Exactly one holds per donor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DonorStatus {
    Member,
    Observer,
    Nonmember,
    Organization,
}

impl fmt::Display for DonorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member => write!(f, "member"),
            Self::Observer => write!(f, "observer"),
            Self::Nonmember => write!(f, "nonmember"),
            Self::Organization => write!(f, "organization"),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalized rows
// ---------------------------------------------------------------------------

/// A raw contribution after entity, donor, category and bucket normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedContribution {
    pub entity: String,
    pub donor: String,
    /// Resolved category, with any donor override already applied.
    pub contrib: ContribClass,
    pub bucket: RevenueBucket,
    pub year: i32,
    pub amount_cents: i64,
    /// Pooled/aggregate donor name that never identifies a single contributor.
    pub is_generic: bool,
    /// Set when the raw revenue type was a code missing from the code table.
    pub rev_code_fallback: bool,
}

// ---------------------------------------------------------------------------
// Fused output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedContributionRecord {
    pub entity: String,
    pub year: i32,
    pub contrib_code: ContribClass,
    /// Human-readable category ("Government", "Multilateral", "Other", ...).
    pub donor_type: String,
    pub rev_bucket: RevenueBucket,
    pub donor_name: String,
    pub amount_cents: i64,
    pub is_other: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// Non-government descriptor with no contribution-type code.
    ContribDescriptor,
    /// Revenue-type code not in the code table (bucketed as voluntary earmarked).
    RevenueCode,
    /// Category code in the aggregate table that the code table does not list.
    AggregateCategory,
}

/// A raw value resolved through a documented fallback, with its row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingGap {
    pub kind: GapKind,
    pub raw: String,
    pub rows: usize,
}

/// Rows present in a source table that the fusion could not place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DroppedRows {
    /// Donor rows whose (entity, year) has no reported entity total.
    pub orphan_rows: usize,
    /// Tier 2 donor rows whose category × bucket has no aggregate total.
    pub unplaced_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseSource {
    Aggregate,
    Secondary,
    SecondaryAdditive,
}

impl fmt::Display for ExpenseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggregate => write!(f, "aggregate"),
            Self::Secondary => write!(f, "secondary"),
            Self::SecondaryAdditive => write!(f, "secondary_additive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedExpenseRecord {
    pub entity: String,
    pub year: i32,
    pub amount_cents: i64,
    /// First source label observed for the key before grouping.
    pub source: ExpenseSource,
}

// ---------------------------------------------------------------------------
// Run output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub kind: String,
    pub engine_version: String,
    pub run_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutover_year: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearTier {
    pub year: i32,
    pub tier: TierPolicy,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueRun {
    pub meta: RunMeta,
    pub tiers: Vec<YearTier>,
    pub records: Vec<FusedContributionRecord>,
    pub gaps: Vec<MappingGap>,
    pub dropped: DroppedRows,
    pub validation: ValidationSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpenseRun {
    pub meta: RunMeta,
    pub secondary_years: Vec<i32>,
    pub records: Vec<FusedExpenseRecord>,
    pub validation: ValidationSummary,
}
