//! Revenue fusion: government + non-government donor ledgers reconciled
//! against entity totals (Tier 1) or per-category aggregates (Tier 2).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::RevenueSettings;
use crate::model::{
    ContribClass, DroppedRows, FusedContributionRecord, GapKind, MappingGap,
    NormalizedContribution, RawContribution, RevenueBucket, RevenueSources, YearTier,
};
use crate::normalize::Normalizer;
use crate::tier::{TierPolicy, TierSelector};

const NON_GOVERNMENT_LABEL: &str = "Non-Government";
const GOVERNMENT_LABEL: &str = "Government";
const NO_CONTRIBUTOR_LABEL: &str = "No Contributor";
const UNATTRIBUTED_TYPE: &str = "Other";

#[derive(Debug, Clone)]
pub struct RevenueFusion {
    pub records: Vec<FusedContributionRecord>,
    pub tiers: Vec<YearTier>,
    pub gaps: Vec<MappingGap>,
    pub dropped: DroppedRows,
}

type UnitKey<'a> = (i32, &'a str);
type UnitIndex<'a> = HashMap<UnitKey<'a>, Vec<&'a NormalizedContribution>>;

fn index(rows: &[NormalizedContribution]) -> UnitIndex<'_> {
    let mut idx: UnitIndex<'_> = HashMap::new();
    for row in rows {
        idx.entry((row.year, row.entity.as_str())).or_default().push(row);
    }
    idx
}

#[derive(Default)]
struct GapCounter(BTreeMap<(GapKind, String), usize>);

impl GapCounter {
    fn note(&mut self, kind: GapKind, raw: &str) {
        *self.0.entry((kind, raw.trim().to_string())).or_insert(0) += 1;
    }

    fn observe(&mut self, raw: &[RawContribution], normalized: &[NormalizedContribution]) {
        for (r, n) in raw.iter().zip(normalized) {
            if n.rev_code_fallback {
                self.note(GapKind::RevenueCode, &r.rev_type_raw);
            }
        }
    }

    fn into_gaps(self) -> Vec<MappingGap> {
        self.0
            .into_iter()
            .map(|((kind, raw), rows)| MappingGap { kind, raw, rows })
            .collect()
    }
}

/// Per-(entity, year) inputs handed to the tier-specific emitters.
struct Unit<'a> {
    entity: &'a str,
    year: i32,
    total_cents: i64,
    government: &'a [&'a NormalizedContribution],
    non_government: &'a [&'a NormalizedContribution],
}

struct Emitter<'a> {
    normalizer: &'a Normalizer,
    settings: &'a RevenueSettings,
    records: Vec<FusedContributionRecord>,
    unplaced_rows: usize,
}

impl<'a> Emitter<'a> {
    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        unit: &Unit<'_>,
        contrib: ContribClass,
        donor_type: &str,
        bucket: RevenueBucket,
        donor: &str,
        amount_cents: i64,
        is_other: bool,
    ) {
        self.records.push(FusedContributionRecord {
            entity: unit.entity.to_string(),
            year: unit.year,
            contrib_code: contrib,
            donor_type: donor_type.to_string(),
            rev_bucket: bucket,
            donor_name: donor.to_string(),
            amount_cents,
            is_other,
        });
    }

    fn above_threshold(&self, amount_cents: i64) -> bool {
        amount_cents.abs() > self.settings.remainder_threshold_cents
    }

    /// Government rows are always specific. Overrides win; names known to be
    /// non-governments move to the fixed non-government code.
    fn government(&mut self, unit: &Unit<'_>) -> i64 {
        let mut sum = 0;
        for row in unit.government {
            let code = match self.normalizer.category_override(&row.donor) {
                Some(code) => code.to_string(),
                None if self.normalizer.is_misclassified_government(&row.donor) => {
                    self.settings.non_government_code.clone()
                }
                None => self.settings.government_code.clone(),
            };
            let fallback = if code == self.settings.government_code {
                GOVERNMENT_LABEL
            } else {
                NON_GOVERNMENT_LABEL
            };
            let donor_type = self
                .normalizer
                .category_name(&code)
                .unwrap_or(fallback)
                .to_string();
            self.push(
                unit,
                ContribClass::Code(code),
                &donor_type,
                row.bucket,
                &row.donor,
                row.amount_cents,
                row.is_generic,
            );
            sum += row.amount_cents;
        }
        sum
    }

    fn tier1(&mut self, unit: &Unit<'_>, government_cents: i64) {
        let mut specific = 0;
        for row in unit.non_government {
            let (contrib, donor_type) = match &row.contrib {
                ContribClass::Code(code) => (
                    ContribClass::Code(code.clone()),
                    self.normalizer
                        .category_name(code)
                        .unwrap_or(NON_GOVERNMENT_LABEL)
                        .to_string(),
                ),
                _ => (ContribClass::Unknown, NON_GOVERNMENT_LABEL.to_string()),
            };
            self.push(
                unit,
                contrib,
                &donor_type,
                row.bucket,
                &row.donor,
                row.amount_cents,
                row.is_generic,
            );
            specific += row.amount_cents;
        }

        let remainder = unit.total_cents - government_cents - specific;
        if self.above_threshold(remainder) {
            let label = self.settings.unattributed_label.clone();
            self.push(
                unit,
                ContribClass::Unattributed,
                UNATTRIBUTED_TYPE,
                RevenueBucket::Other,
                &label,
                remainder,
                true,
            );
        }
    }

    fn tier2(&mut self, unit: &Unit<'_>, aggregates: &[&NormalizedContribution]) {
        let gov_code = self.settings.government_code.as_str();
        let none_code = self.settings.no_contributor_code.as_str();
        let mut placed = 0;

        let categories: Vec<(String, String)> = self
            .normalizer
            .categories()
            .iter()
            .map(|c| (c.code.trim().to_string(), c.name.clone()))
            .filter(|(code, _)| code != gov_code && code != none_code)
            .collect();

        for (code, name) in &categories {
            for (bucket, total) in bucket_totals(aggregates, code) {
                if total == 0 {
                    continue;
                }
                let mut specific = 0;
                for row in unit
                    .non_government
                    .iter()
                    .filter(|r| r.contrib.is_code(code) && r.bucket == bucket)
                {
                    self.push(
                        unit,
                        ContribClass::Code(code.clone()),
                        name,
                        bucket,
                        &row.donor,
                        row.amount_cents,
                        row.is_generic,
                    );
                    specific += row.amount_cents;
                    placed += 1;
                }

                // Negative remainders mean named donors overshoot the category total.
                let remainder = total - specific;
                if self.above_threshold(remainder) {
                    self.push(
                        unit,
                        ContribClass::Code(code.clone()),
                        name,
                        bucket,
                        &format!("Other {name}"),
                        remainder,
                        true,
                    );
                }
            }
        }

        let none_type = self
            .normalizer
            .category_name(none_code)
            .unwrap_or(NO_CONTRIBUTOR_LABEL)
            .to_string();
        for (bucket, total) in bucket_totals(aggregates, none_code) {
            if total != 0 && self.above_threshold(total) {
                let label = self.settings.no_contributor_label.clone();
                self.push(
                    unit,
                    ContribClass::Code(none_code.to_string()),
                    &none_type,
                    bucket,
                    &label,
                    total,
                    true,
                );
            }
        }

        self.unplaced_rows += unit.non_government.len() - placed;
    }
}

/// Totals per revenue bucket for one category, in canonical bucket order.
fn bucket_totals(aggregates: &[&NormalizedContribution], code: &str) -> BTreeMap<RevenueBucket, i64> {
    let mut totals = BTreeMap::new();
    for row in aggregates.iter().filter(|r| r.contrib.is_code(code)) {
        *totals.entry(row.bucket).or_insert(0) += row.amount_cents;
    }
    totals
}

fn normalize_all(normalizer: &Normalizer, rows: &[RawContribution]) -> Vec<NormalizedContribution> {
    rows.iter().map(|r| normalizer.normalize(r)).collect()
}

/// Fuse the given years into one sorted record sequence.
///
/// Only the entities present in the entity-totals table for a year are fused;
/// donor rows for other entities are counted as orphans. The contributor-type
/// table is consulted for Tier 2 years only.
pub fn fuse_revenue(
    normalizer: &Normalizer,
    settings: &RevenueSettings,
    sources: &RevenueSources,
    years: &[i32],
) -> RevenueFusion {
    let selector = TierSelector::new(settings.cutover_year);
    let mut gaps = GapCounter::default();

    let totals = normalize_all(normalizer, &sources.entity_totals);
    let government = normalize_all(normalizer, &sources.government);
    let non_government = normalize_all(normalizer, &sources.non_government);
    gaps.observe(&sources.government, &government);
    gaps.observe(&sources.non_government, &non_government);
    for (raw, row) in sources.non_government.iter().zip(&non_government) {
        if row.contrib == ContribClass::Unknown {
            if let Some(desc) = raw.contrib_type_raw.as_deref().filter(|d| !d.trim().is_empty()) {
                gaps.note(GapKind::ContribDescriptor, desc);
            }
        }
    }

    let needs_aggregates = years.iter().any(|y| selector.select(*y).reads_category_table());
    let aggregates = if needs_aggregates {
        let rows = normalize_all(normalizer, &sources.contributor_type);
        gaps.observe(&sources.contributor_type, &rows);
        for (raw, row) in sources.contributor_type.iter().zip(&rows) {
            let listed = row
                .contrib
                .code()
                .is_some_and(|c| normalizer.category_name(c).is_some());
            if !listed {
                let text = raw
                    .contrib_type_raw
                    .as_deref()
                    .map(str::to_string)
                    .unwrap_or_else(|| row.contrib.to_string());
                gaps.note(GapKind::AggregateCategory, &text);
            }
        }
        rows
    } else {
        Vec::new()
    };

    let totals_idx = index(&totals);
    let gov_idx = index(&government);
    let nongov_idx = index(&non_government);
    let agg_idx = index(&aggregates);

    let mut entities_by_year: BTreeMap<i32, BTreeSet<&str>> = BTreeMap::new();
    for row in &totals {
        entities_by_year.entry(row.year).or_default().insert(row.entity.as_str());
    }

    let wanted: BTreeSet<i32> = years.iter().copied().collect();
    let mut dropped = DroppedRows::default();
    for row in government.iter().chain(&non_government) {
        if wanted.contains(&row.year) && !totals_idx.contains_key(&(row.year, row.entity.as_str())) {
            dropped.orphan_rows += 1;
        }
    }

    let mut emitter = Emitter {
        normalizer,
        settings,
        records: Vec::new(),
        unplaced_rows: 0,
    };
    let mut tiers = Vec::with_capacity(wanted.len());
    let empty: Vec<&NormalizedContribution> = Vec::new();

    for &year in &wanted {
        let tier = selector.select(year);
        log::debug!("{year}: fusing with {tier}");
        tiers.push(YearTier { year, tier });

        let Some(entities) = entities_by_year.get(&year) else {
            continue;
        };
        for &entity in entities {
            let key = (year, entity);
            let unit = Unit {
                entity,
                year,
                total_cents: totals_idx
                    .get(&key)
                    .map(|rows| rows.iter().map(|r| r.amount_cents).sum())
                    .unwrap_or(0),
                government: gov_idx.get(&key).unwrap_or(&empty),
                non_government: nongov_idx.get(&key).unwrap_or(&empty),
            };

            let government_cents = emitter.government(&unit);
            match tier {
                TierPolicy::Tier1 => emitter.tier1(&unit, government_cents),
                TierPolicy::Tier2 => {
                    let aggregates = agg_idx.get(&key).unwrap_or(&empty);
                    emitter.tier2(&unit, aggregates);
                }
            }
        }
    }

    dropped.unplaced_rows = emitter.unplaced_rows;
    if dropped.orphan_rows > 0 {
        log::warn!(
            "{} donor rows have no entity total for their year and were skipped",
            dropped.orphan_rows
        );
    }
    if dropped.unplaced_rows > 0 {
        log::warn!(
            "{} non-government rows fall outside every aggregate category and were skipped",
            dropped.unplaced_rows
        );
    }

    let mut records = emitter.records;
    sort_records(&mut records);
    log::info!("fused {} revenue records across {} years", records.len(), tiers.len());

    RevenueFusion {
        records,
        tiers,
        gaps: gaps.into_gaps(),
        dropped,
    }
}

/// Year, entity, donor type, bucket, amount descending. Stable on ties.
pub fn sort_records(records: &mut [FusedContributionRecord]) {
    records.sort_by(|a, b| {
        a.year
            .cmp(&b.year)
            .then_with(|| a.entity.cmp(&b.entity))
            .then_with(|| a.donor_type.cmp(&b.donor_type))
            .then_with(|| a.rev_bucket.cmp(&b.rev_bucket))
            .then_with(|| b.amount_cents.cmp(&a.amount_cents))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceTables;

    fn settings(threshold: i64) -> RevenueSettings {
        RevenueSettings {
            remainder_threshold_cents: threshold,
            ..RevenueSettings::default()
        }
    }

    fn normalizer() -> Normalizer {
        Normalizer::new(&ReferenceTables::builtin()).unwrap()
    }

    fn total(entity: &str, year: i32, amount: i64) -> RawContribution {
        RawContribution {
            entity_code: entity.into(),
            donor_name_raw: String::new(),
            contrib_type_raw: None,
            rev_type_raw: String::new(),
            year,
            amount_cents: amount,
        }
    }

    fn gov(entity: &str, year: i32, donor: &str, amount: i64) -> RawContribution {
        RawContribution {
            entity_code: entity.into(),
            donor_name_raw: donor.into(),
            contrib_type_raw: None,
            rev_type_raw: "Voluntary earmarked".into(),
            year,
            amount_cents: amount,
        }
    }

    fn nongov(entity: &str, year: i32, donor: &str, code: &str, amount: i64) -> RawContribution {
        RawContribution {
            entity_code: entity.into(),
            donor_name_raw: donor.into(),
            contrib_type_raw: Some(code.into()),
            rev_type_raw: "Voluntary earmarked".into(),
            year,
            amount_cents: amount,
        }
    }

    fn category(entity: &str, year: i32, code: &str, amount: i64) -> RawContribution {
        RawContribution {
            entity_code: entity.into(),
            donor_name_raw: String::new(),
            contrib_type_raw: Some(code.into()),
            rev_type_raw: "Voluntary earmarked".into(),
            year,
            amount_cents: amount,
        }
    }

    fn others(fusion: &RevenueFusion) -> Vec<&FusedContributionRecord> {
        fusion.records.iter().filter(|r| r.is_other).collect()
    }

    #[test]
    fn end_to_end_tier2_scenario() {
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2022, 104)],
            government: vec![gov("E", 2022, "A", 40), gov("E", 2022, "B", 35)],
            non_government: vec![nongov("E", 2022, "C", "C04B", 25)],
            contributor_type: vec![category("E", 2022, "C04B", 30)],
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2022]);

        let rows: Vec<(&str, String, i64, bool)> = fusion
            .records
            .iter()
            .map(|r| (r.donor_name.as_str(), r.contrib_code.to_string(), r.amount_cents, r.is_other))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("A", "C01".to_string(), 40, false),
                ("B", "C01".to_string(), 35, false),
                ("C", "C04B".to_string(), 25, false),
                ("Other Multilateral", "C04B".to_string(), 5, true),
            ]
        );
        let fused: i64 = fusion.records.iter().map(|r| r.amount_cents).sum();
        assert_eq!(fused, 105);
        assert_eq!(fusion.tiers, vec![YearTier { year: 2022, tier: TierPolicy::Tier2 }]);
    }

    #[test]
    fn negative_remainder_is_preserved() {
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2022, 100)],
            non_government: vec![
                nongov("E", 2022, "X", "C06", 70),
                nongov("E", 2022, "Y", "C06", 60),
            ],
            contributor_type: vec![category("E", 2022, "C06", 100)],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2022]);
        let other = others(&fusion);
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].donor_name, "Other Foundation");
        assert_eq!(other[0].amount_cents, -30);
    }

    #[test]
    fn remainder_under_threshold_is_suppressed() {
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2022, 100_000_500)],
            non_government: vec![nongov("E", 2022, "Big Co", "C03", 100_000_000)],
            contributor_type: vec![category("E", 2022, "C03", 100_000_500)],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(1000), &sources, &[2022]);
        assert!(others(&fusion).is_empty());
        assert_eq!(fusion.records.len(), 1);
    }

    #[test]
    fn remainder_at_threshold_is_suppressed() {
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2022, 2000)],
            non_government: vec![nongov("E", 2022, "Big Co", "C03", 1000)],
            contributor_type: vec![category("E", 2022, "C03", 2000)],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(1000), &sources, &[2022]);
        assert!(others(&fusion).is_empty());
    }

    #[test]
    fn zero_category_total_emits_nothing() {
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2022, 0)],
            non_government: vec![nongov("E", 2022, "Ghost", "C06", 50)],
            contributor_type: vec![category("E", 2022, "C06", 20), category("E", 2022, "C06", -20)],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2022]);
        assert!(fusion.records.is_empty());
        assert_eq!(fusion.dropped.unplaced_rows, 1);
    }

    #[test]
    fn remainders_split_by_bucket() {
        let mut unearmarked = category("E", 2022, "C06", 500);
        unearmarked.rev_type_raw = "Voluntary un-earmarked".into();
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2022, 800)],
            non_government: vec![nongov("E", 2022, "F1", "C06", 200)],
            contributor_type: vec![category("E", 2022, "C06", 300), unearmarked],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2022]);
        let other: Vec<(RevenueBucket, i64)> =
            others(&fusion).iter().map(|r| (r.rev_bucket, r.amount_cents)).collect();
        assert_eq!(
            other,
            vec![
                (RevenueBucket::VoluntaryUnearmarked, 500),
                (RevenueBucket::VoluntaryEarmarked, 100),
            ]
        );
    }

    #[test]
    fn no_contributor_rows_come_from_aggregates() {
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2022, 900)],
            non_government: vec![nongov("E", 2022, "Should Not Appear", "C09", 900)],
            contributor_type: vec![category("E", 2022, "C09", 900)],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2022]);
        assert_eq!(fusion.records.len(), 1);
        let r = &fusion.records[0];
        assert_eq!(r.donor_name, "Revenue from Activities");
        assert_eq!(r.donor_type, "No Contributor");
        assert!(r.is_other);
        assert_eq!(r.amount_cents, 900);
    }

    #[test]
    fn tier1_emits_single_unattributed_remainder() {
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2019, 1000)],
            government: vec![gov("E", 2019, "A", 400)],
            non_government: vec![
                nongov("E", 2019, "F1", "C06", 250),
                nongov("E", 2019, "Mystery", "Space agencies", 50),
            ],
            contributor_type: vec![category("E", 2019, "C06", 999_999)],
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2019]);
        let other = others(&fusion);
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].contrib_code, ContribClass::Unattributed);
        assert_eq!(other[0].donor_name, "Unattributed");
        assert_eq!(other[0].amount_cents, 300);

        let mystery = fusion.records.iter().find(|r| r.donor_name == "Mystery").unwrap();
        assert_eq!(mystery.contrib_code, ContribClass::Unknown);
        assert_eq!(mystery.donor_type, "Non-Government");
        assert_eq!(fusion.tiers[0].tier, TierPolicy::Tier1);
        assert_eq!(fusion.gaps.len(), 1);
        assert_eq!(fusion.gaps[0].kind, GapKind::ContribDescriptor);
        assert_eq!(fusion.gaps[0].raw, "Space agencies");
    }

    #[test]
    fn tier_selection_around_cutover() {
        // Same donor data in both years; only the aggregate table differs in effect.
        let mut sources = RevenueSources::default();
        for year in [2020, 2021] {
            sources.entity_totals.push(total("E", year, 1000));
            sources.non_government.push(nongov("E", year, "F1", "C06", 600));
        }
        // 2020 has a populated aggregate table that Tier 1 must ignore.
        sources.contributor_type.push(category("E", 2020, "C06", 5000));

        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2020, 2021]);

        let y2020: Vec<_> = fusion.records.iter().filter(|r| r.year == 2020).collect();
        assert_eq!(y2020.len(), 2);
        assert!(y2020.iter().any(|r| r.contrib_code == ContribClass::Unattributed && r.amount_cents == 400));
        assert!(!y2020.iter().any(|r| r.donor_name == "Other Foundation"));

        // 2021 reads the (empty) aggregate table: no categories, so nothing placed.
        let y2021: Vec<_> = fusion.records.iter().filter(|r| r.year == 2021).collect();
        assert!(y2021.is_empty());
        assert_eq!(fusion.dropped.unplaced_rows, 1);
    }

    #[test]
    fn misclassified_government_donor_is_moved() {
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2019, 100)],
            government: vec![gov("E", 2019, "Private Donors*", 60), gov("E", 2019, "Japan", 40)],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2019]);
        let private = fusion.records.iter().find(|r| r.donor_name == "Private Donors").unwrap();
        assert_eq!(private.contrib_code, ContribClass::Code("C08".into()));
        assert_eq!(private.donor_type, "Other");
        assert!(!private.is_other);
        let japan = fusion.records.iter().find(|r| r.donor_name == "Japan").unwrap();
        assert_eq!(japan.donor_type, "Government");
    }

    #[test]
    fn override_moves_government_ledger_bank() {
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2019, 100)],
            government: vec![gov("E", 2019, "World Bank", 100)],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2019]);
        assert_eq!(fusion.records[0].contrib_code, ContribClass::Code("C04C".into()));
        assert_eq!(fusion.records[0].donor_type, "Multilateral-IFI");
    }

    #[test]
    fn generic_donor_is_flagged_other() {
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2022, 100)],
            non_government: vec![nongov("E", 2022, "Multi Donor Trust Funds", "C05", 100)],
            contributor_type: vec![category("E", 2022, "C05", 100)],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2022]);
        assert_eq!(fusion.records.len(), 1);
        assert!(fusion.records[0].is_other);
        assert_eq!(fusion.records[0].donor_name, "Multi Donor Trust Funds");
    }

    #[test]
    fn orphan_donor_rows_are_counted() {
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2019, 100)],
            government: vec![gov("E", 2019, "A", 100), gov("Z", 2019, "A", 5), gov("Z", 2015, "A", 5)],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2019]);
        assert_eq!(fusion.dropped.orphan_rows, 1);
        assert_eq!(fusion.records.len(), 1);
    }

    #[test]
    fn entity_aliases_merge_units() {
        let sources = RevenueSources {
            entity_totals: vec![total("UNHABITAT", 2019, 60), total("UN-HABITAT", 2019, 40)],
            government: vec![gov("UN-HABITAT", 2019, "A", 100)],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2019]);
        assert_eq!(fusion.records.len(), 1);
        assert_eq!(fusion.records[0].entity, "UN-Habitat");
    }

    #[test]
    fn records_sorted_by_key_then_amount_descending() {
        let sources = RevenueSources {
            entity_totals: vec![total("B", 2019, 30), total("A", 2019, 30), total("A", 2018, 10)],
            government: vec![
                gov("B", 2019, "Small", 10),
                gov("B", 2019, "Large", 20),
                gov("A", 2019, "Only", 30),
                gov("A", 2018, "Early", 10),
            ],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2018, 2019]);
        let order: Vec<&str> = fusion.records.iter().map(|r| r.donor_name.as_str()).collect();
        assert_eq!(order, vec!["Early", "Only", "Large", "Small"]);
    }

    #[test]
    fn unmapped_revenue_code_is_reported_as_gap() {
        let mut row = gov("E", 2019, "A", 100);
        row.rev_type_raw = "R42".into();
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2019, 100)],
            government: vec![row],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2019]);
        assert_eq!(fusion.records[0].rev_bucket, RevenueBucket::VoluntaryEarmarked);
        assert_eq!(
            fusion.gaps,
            vec![MappingGap { kind: GapKind::RevenueCode, raw: "R42".into(), rows: 1 }]
        );
    }

    #[test]
    fn unlisted_aggregate_category_is_reported() {
        let sources = RevenueSources {
            entity_totals: vec![total("E", 2022, 100)],
            contributor_type: vec![category("E", 2022, "C77", 100)],
            ..Default::default()
        };
        let fusion = fuse_revenue(&normalizer(), &settings(0), &sources, &[2022]);
        assert!(fusion.records.is_empty());
        assert_eq!(fusion.gaps[0].kind, GapKind::AggregateCategory);
        assert_eq!(fusion.gaps[0].raw, "C77");
    }
}
