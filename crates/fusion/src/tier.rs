//! Per-year fusion policy. Selected from the calendar year alone.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierPolicy {
    /// Entity totals + government and non-government donor ledgers.
    Tier1,
    /// Tier 1 tables plus the "by contributor type" aggregate table.
    Tier2,
}

impl TierPolicy {
    pub fn reads_category_table(self) -> bool {
        matches!(self, Self::Tier2)
    }
}

impl std::fmt::Display for TierPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tier1 => write!(f, "tier1"),
            Self::Tier2 => write!(f, "tier2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSelector {
    cutover_year: i32,
}

impl TierSelector {
    pub fn new(cutover_year: i32) -> Self {
        Self { cutover_year }
    }

    pub fn cutover_year(&self) -> i32 {
        self.cutover_year
    }

    pub fn select(&self, year: i32) -> TierPolicy {
        if year < self.cutover_year {
            TierPolicy::Tier1
        } else {
            TierPolicy::Tier2
        }
    }
}
