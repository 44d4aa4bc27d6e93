//! Derived views over fused revenue records: per-entity summaries, per-donor
//! contributions and contributor time series.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::YearRange;
use crate::model::{DonorStatus, FusedContributionRecord, RevenueBucket};
use crate::roster::StateRoster;

pub type BucketTotals = BTreeMap<RevenueBucket, i64>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonorTotal {
    pub donor: String,
    pub total_cents: i64,
    pub by_bucket: BucketTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRevenue {
    pub entity: String,
    pub year: i32,
    pub total_cents: i64,
    /// Includes remainder records.
    pub by_bucket: BucketTotals,
    /// Specific donors only, largest first.
    pub by_donor: Vec<DonorTotal>,
}

/// One summary per entity fused in `year`, ordered by entity.
pub fn entity_revenue(records: &[FusedContributionRecord], year: i32) -> Vec<EntityRevenue> {
    let mut entities: BTreeMap<&str, (i64, BucketTotals, BTreeMap<&str, DonorTotal>)> = BTreeMap::new();
    for r in records.iter().filter(|r| r.year == year) {
        let (total, buckets, donors) = entities.entry(r.entity.as_str()).or_default();
        *total += r.amount_cents;
        *buckets.entry(r.rev_bucket).or_insert(0) += r.amount_cents;
        if r.is_other {
            continue;
        }
        let donor = donors.entry(r.donor_name.as_str()).or_insert_with(|| DonorTotal {
            donor: r.donor_name.clone(),
            total_cents: 0,
            by_bucket: BucketTotals::new(),
        });
        donor.total_cents += r.amount_cents;
        *donor.by_bucket.entry(r.rev_bucket).or_insert(0) += r.amount_cents;
    }

    entities
        .into_iter()
        .map(|(entity, (total_cents, by_bucket, donors))| {
            let mut by_donor: Vec<DonorTotal> = donors.into_values().collect();
            by_donor.sort_by(|a, b| b.total_cents.cmp(&a.total_cents));
            EntityRevenue {
                entity: entity.to_string(),
                year,
                total_cents,
                by_bucket,
                by_donor,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonorContributions {
    pub donor: String,
    pub status: DonorStatus,
    /// entity -> bucket -> amount
    pub contributions: BTreeMap<String, BucketTotals>,
}

/// Specific donors of `year` with their status and per-entity split.
pub fn donor_contributions(
    records: &[FusedContributionRecord],
    year: i32,
    roster: &StateRoster,
) -> Vec<DonorContributions> {
    let mut donors: BTreeMap<&str, DonorContributions> = BTreeMap::new();
    for r in records.iter().filter(|r| r.year == year && !r.is_other) {
        let government = roster.is_government(r);
        let entry = donors.entry(r.donor_name.as_str()).or_insert_with(|| DonorContributions {
            donor: r.donor_name.clone(),
            status: DonorStatus::Organization,
            contributions: BTreeMap::new(),
        });
        if government {
            entry.status = roster.status(&r.donor_name, true);
        }
        *entry
            .contributions
            .entry(r.entity.clone())
            .or_default()
            .entry(r.rev_bucket)
            .or_insert(0) += r.amount_cents;
    }
    donors.into_values().collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub year: i32,
    pub assessed_cents: i64,
    pub voluntary_unearmarked_cents: i64,
    pub voluntary_earmarked_cents: i64,
    /// All revenue, including the Other bucket.
    pub total_cents: i64,
}

impl TrendPoint {
    fn add(&mut self, bucket: RevenueBucket, amount_cents: i64) {
        match bucket {
            RevenueBucket::Assessed => self.assessed_cents += amount_cents,
            RevenueBucket::VoluntaryUnearmarked => self.voluntary_unearmarked_cents += amount_cents,
            RevenueBucket::VoluntaryEarmarked => self.voluntary_earmarked_cents += amount_cents,
            RevenueBucket::Other => {}
        }
        self.total_cents += amount_cents;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAggregates {
    pub government: Vec<TrendPoint>,
    pub non_government: Vec<TrendPoint>,
    pub all: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributorTrends {
    pub years: Vec<i32>,
    pub government_contributors: Vec<String>,
    pub non_government_contributors: Vec<String>,
    pub aggregates: TrendAggregates,
    /// Dense series over `years` per specific donor.
    pub contributors: BTreeMap<String, Vec<TrendPoint>>,
}

fn dense(years: &[i32]) -> Vec<TrendPoint> {
    years
        .iter()
        .map(|&year| TrendPoint {
            year,
            ..TrendPoint::default()
        })
        .collect()
}

/// Time series for every specific donor across the configured years.
pub fn contributor_trends(
    records: &[FusedContributionRecord],
    years: &YearRange,
    roster: &StateRoster,
) -> ContributorTrends {
    let year_list: Vec<i32> = years.iter().collect();
    let slot = |year: i32| (year - years.start) as usize;

    let mut government = dense(&year_list);
    let mut non_government = dense(&year_list);
    let mut all = dense(&year_list);
    let mut gov_names = BTreeSet::new();
    let mut nongov_names = BTreeSet::new();
    let mut contributors: BTreeMap<String, Vec<TrendPoint>> = BTreeMap::new();

    for r in records.iter().filter(|r| !r.is_other && years.contains(r.year)) {
        let i = slot(r.year);
        if roster.is_government(r) {
            gov_names.insert(r.donor_name.clone());
            government[i].add(r.rev_bucket, r.amount_cents);
        } else {
            nongov_names.insert(r.donor_name.clone());
            non_government[i].add(r.rev_bucket, r.amount_cents);
        }
        all[i].add(r.rev_bucket, r.amount_cents);
        contributors
            .entry(r.donor_name.clone())
            .or_insert_with(|| dense(&year_list))[i]
            .add(r.rev_bucket, r.amount_cents);
    }

    ContributorTrends {
        years: year_list,
        government_contributors: gov_names.into_iter().collect(),
        non_government_contributors: nongov_names.into_iter().collect(),
        aggregates: TrendAggregates {
            government,
            non_government,
            all,
        },
        contributors,
    }
}
