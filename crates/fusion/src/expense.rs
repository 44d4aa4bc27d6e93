//! Expense fusion: primary per-entity aggregates, with sub-entity detail
//! from the secondary source for the years that have it.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ExpenseSettings;
use crate::model::{ExpenseSource, ExpenseSources, FusedExpenseRecord, RawExpense};
use crate::normalize::Normalizer;

#[derive(Debug, Clone)]
pub struct ExpenseFusion {
    /// One row per (entity, year), sorted by year then entity.
    pub records: Vec<FusedExpenseRecord>,
    /// Fused years that drew on the secondary source.
    pub secondary_years: Vec<i32>,
}

struct Row {
    entity: String,
    year: i32,
    amount_cents: i64,
    source_type: Option<String>,
}

fn normalize_rows(normalizer: &Normalizer, rows: &[RawExpense]) -> Vec<Row> {
    rows.iter()
        .map(|r| Row {
            entity: normalizer.normalize_entity(&r.entity_code),
            year: r.year,
            amount_cents: r.amount_cents,
            source_type: r.source_type.as_deref().map(|s| s.trim().to_string()),
        })
        .collect()
}

fn entity_set(normalizer: &Normalizer, names: &BTreeSet<String>) -> BTreeSet<String> {
    names.iter().map(|n| normalizer.normalize_entity(n)).collect()
}

/// Fuse the given years. Only years with primary rows produce output.
pub fn fuse_expenses(
    normalizer: &Normalizer,
    settings: &ExpenseSettings,
    sources: &ExpenseSources,
    years: &[i32],
) -> ExpenseFusion {
    let keep = entity_set(normalizer, &settings.keep_aggregate);
    let replace = entity_set(normalizer, &settings.replace_aggregates);
    let additive = entity_set(normalizer, &settings.additive);

    let wanted: BTreeSet<i32> = years.iter().copied().collect();
    let primary = normalize_rows(normalizer, &sources.primary);
    let secondary = normalize_rows(normalizer, &sources.secondary);

    let primary_years: BTreeSet<i32> =
        primary.iter().map(|r| r.year).filter(|y| wanted.contains(y)).collect();
    let secondary_years: BTreeSet<i32> = secondary
        .iter()
        .map(|r| r.year)
        .filter(|y| primary_years.contains(y))
        .collect();

    let mut staged: Vec<(i32, String, i64, ExpenseSource)> = Vec::new();

    for &year in &primary_years {
        let with_secondary = secondary_years.contains(&year);
        for row in primary.iter().filter(|r| r.year == year) {
            if with_secondary && replace.contains(&row.entity) {
                continue;
            }
            staged.push((year, row.entity.clone(), row.amount_cents, ExpenseSource::Aggregate));
        }
        if !with_secondary {
            continue;
        }

        let year_rows: Vec<&Row> = secondary.iter().filter(|r| r.year == year).collect();

        let mut detail: BTreeMap<&str, i64> = BTreeMap::new();
        for row in year_rows
            .iter()
            .filter(|r| !keep.contains(&r.entity) && !additive.contains(&r.entity))
        {
            *detail.entry(row.entity.as_str()).or_insert(0) += row.amount_cents;
        }
        for (entity, amount) in detail {
            staged.push((year, entity.to_string(), amount, ExpenseSource::Secondary));
        }

        for entity in &additive {
            let added: i64 = year_rows
                .iter()
                .filter(|r| {
                    r.entity == *entity
                        && r.source_type.as_deref() == Some(settings.additive_source_type.as_str())
                })
                .map(|r| r.amount_cents)
                .sum();
            if added > 0 {
                staged.push((year, entity.clone(), added, ExpenseSource::SecondaryAdditive));
            }
        }
    }

    let mut grouped: BTreeMap<(i32, String), (i64, ExpenseSource)> = BTreeMap::new();
    for (year, entity, amount, source) in staged {
        grouped
            .entry((year, entity))
            .and_modify(|(sum, _)| *sum += amount)
            .or_insert((amount, source));
    }

    let records: Vec<FusedExpenseRecord> = grouped
        .into_iter()
        .map(|((year, entity), (amount_cents, source))| FusedExpenseRecord {
            entity,
            year,
            amount_cents,
            source,
        })
        .collect();

    log::info!(
        "fused {} expense rows across {} years ({} with secondary detail)",
        records.len(),
        primary_years.len(),
        secondary_years.len()
    );

    ExpenseFusion {
        records,
        secondary_years: secondary_years.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceTables;

    fn normalizer() -> Normalizer {
        Normalizer::new(&ReferenceTables::builtin()).unwrap()
    }

    fn row(entity: &str, year: i32, amount: i64, source_type: Option<&str>) -> RawExpense {
        RawExpense {
            entity_code: entity.into(),
            year,
            amount_cents: amount,
            source_type: source_type.map(str::to_string),
        }
    }

    fn sources() -> ExpenseSources {
        ExpenseSources {
            primary: vec![
                row("UN", 2018, 500, None),
                row("UNEP", 2018, 100, None),
                row("UN", 2020, 600, None),
                row("UN-DPO", 2020, 300, None),
                row("UNEP", 2020, 100, None),
                row("UNHCR", 2020, 900, None),
                row("WFP", 2020, 800, None),
            ],
            secondary: vec![
                row("DPPA", 2020, 250, Some("Regular assessed")),
                row("DPPA", 2020, 50, Some("Extrabudgetary")),
                row("OCHA", 2020, 400, Some("Extrabudgetary")),
                row("UNEP", 2020, 30, Some("Regular assessed")),
                row("UNEP", 2020, 70, Some("Extrabudgetary")),
                row("UNHCR", 2020, 111, Some("Regular assessed")),
                // no primary rows for this year, so never fused
                row("OCHA", 2016, 10, None),
            ],
        }
    }

    fn amount(fusion: &ExpenseFusion, entity: &str, year: i32) -> Option<(i64, ExpenseSource)> {
        fusion
            .records
            .iter()
            .find(|r| r.entity == entity && r.year == year)
            .map(|r| (r.amount_cents, r.source))
    }

    #[test]
    fn years_without_secondary_take_primary_unchanged() {
        let fusion = fuse_expenses(&normalizer(), &ExpenseSettings::default(), &sources(), &[2018, 2020]);
        assert_eq!(amount(&fusion, "UN", 2018), Some((500, ExpenseSource::Aggregate)));
        assert_eq!(amount(&fusion, "UNEP", 2018), Some((100, ExpenseSource::Aggregate)));
        assert_eq!(fusion.secondary_years, vec![2020]);
    }

    #[test]
    fn secondary_years_replace_aggregates_with_detail() {
        let fusion = fuse_expenses(&normalizer(), &ExpenseSettings::default(), &sources(), &[2020]);
        assert_eq!(amount(&fusion, "UN", 2020), None);
        assert_eq!(amount(&fusion, "UN-DPO", 2020), None);
        assert_eq!(amount(&fusion, "DPPA", 2020), Some((300, ExpenseSource::Secondary)));
        assert_eq!(amount(&fusion, "OCHA", 2020), Some((400, ExpenseSource::Secondary)));
        assert_eq!(amount(&fusion, "WFP", 2020), Some((800, ExpenseSource::Aggregate)));
    }

    #[test]
    fn keep_aggregate_entities_ignore_secondary() {
        let fusion = fuse_expenses(&normalizer(), &ExpenseSettings::default(), &sources(), &[2020]);
        assert_eq!(amount(&fusion, "UNHCR", 2020), Some((900, ExpenseSource::Aggregate)));
    }

    #[test]
    fn additive_entities_gain_assessed_component() {
        let fusion = fuse_expenses(&normalizer(), &ExpenseSettings::default(), &sources(), &[2020]);
        let (fused, source) = amount(&fusion, "UNEP", 2020).unwrap();
        assert_eq!(fused, 130);
        assert!(fused >= 100);
        assert_eq!(source, ExpenseSource::Aggregate);
    }

    #[test]
    fn additive_without_primary_row_uses_additive_label() {
        let mut src = sources();
        src.primary.retain(|r| !(r.entity_code == "UNEP" && r.year == 2020));
        let fusion = fuse_expenses(&normalizer(), &ExpenseSettings::default(), &src, &[2020]);
        assert_eq!(amount(&fusion, "UNEP", 2020), Some((30, ExpenseSource::SecondaryAdditive)));
    }

    #[test]
    fn output_has_one_row_per_key() {
        let mut src = sources();
        src.primary.push(row("WFP", 2020, 200, None));
        src.primary.push(row("UNHABITAT", 2020, 5, None));
        src.primary.push(row("UN-HABITAT", 2020, 7, None));
        let fusion = fuse_expenses(&normalizer(), &ExpenseSettings::default(), &src, &[2018, 2020]);
        let keys: BTreeSet<(i32, &str)> =
            fusion.records.iter().map(|r| (r.year, r.entity.as_str())).collect();
        assert_eq!(keys.len(), fusion.records.len());
        assert_eq!(amount(&fusion, "WFP", 2020), Some((1000, ExpenseSource::Aggregate)));
        assert_eq!(amount(&fusion, "UN-Habitat", 2020), Some((12, ExpenseSource::Aggregate)));
    }

    #[test]
    fn years_outside_request_are_skipped() {
        let fusion = fuse_expenses(&normalizer(), &ExpenseSettings::default(), &sources(), &[2020]);
        assert!(fusion.records.iter().all(|r| r.year == 2020));
        assert!(amount(&fusion, "OCHA", 2016).is_none());
    }
}
