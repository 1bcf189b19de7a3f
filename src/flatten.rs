//! Flattening aggregation trees into chart-ready rows, and percentage
//! normalization of sibling totals.

use crate::aggregate::{AggNode, Dimension};
use crate::types::{is_unknown, CountryDrugRow, LevelRow, StackedBarRow, UNKNOWN};
use std::collections::BTreeMap;

/// Walk the tree depth-first and emit one row per node at every level,
/// parents before their children. `levels` labels each depth of the key
/// path the tree was built with.
pub fn flatten(root: &AggNode, levels: &[Dimension]) -> Vec<LevelRow> {
    let mut rows = Vec::new();
    walk(&root.children, levels, 0, None, &mut rows);
    rows
}

fn walk(
    children: &BTreeMap<String, AggNode>,
    levels: &[Dimension],
    depth: usize,
    parent: Option<&str>,
    out: &mut Vec<LevelRow>,
) {
    if depth >= levels.len() {
        return;
    }
    for (name, node) in children {
        out.push(LevelRow {
            level: levels[depth].label().to_string(),
            name: name.clone(),
            total: node.total,
            years: node.years.clone(),
            parent: parent.map(str::to_string),
        });
        walk(&node.children, levels, depth + 1, Some(name), out);
    }
}

/// Scale sibling totals so they sum to 100. An all-zero input maps to all
/// zeros; this function never produces NaN or infinities.
pub fn normalize_percentages(values: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let sum: f64 = values.values().sum();
    values
        .iter()
        .map(|(key, value)| {
            let share = if sum > 0.0 { value / sum * 100.0 } else { 0.0 };
            (key.clone(), share)
        })
        .collect()
}

#[derive(Default)]
struct BarAcc {
    country: String,
    shares: BTreeMap<String, f64>,
}

fn finish_bars(groups: BTreeMap<String, BarAcc>) -> Vec<StackedBarRow> {
    groups
        .into_iter()
        .map(|(ms_code, acc)| StackedBarRow {
            ms_code,
            country: acc.country,
            shares: normalize_percentages(&acc.shares),
        })
        .collect()
}

/// One stacked bar per reporting code: drug-group shares of the code's
/// total, as percentages. Rows with an unknown code or country, or
/// nothing accumulated, are skipped so they cannot distort real bars.
pub fn stacked_bar_rows(rows: &[CountryDrugRow]) -> Vec<StackedBarRow> {
    let mut groups: BTreeMap<String, BarAcc> = BTreeMap::new();
    for row in rows {
        let ms_code = row
            .ms_codes
            .iter()
            .next()
            .map(String::as_str)
            .unwrap_or(UNKNOWN);
        if is_unknown(ms_code) || is_unknown(&row.country) || row.total <= 0.0 {
            continue;
        }
        let acc = groups.entry(ms_code.to_string()).or_insert_with(|| BarAcc {
            country: row.country.clone(),
            shares: BTreeMap::new(),
        });
        *acc.shares.entry(row.drug_group.clone()).or_insert(0.0) += row.total;
    }
    finish_bars(groups)
}

/// Drill-down variant: shares by drug type within one selected drug
/// group, again one bar per reporting code.
pub fn stacked_bar_rows_by_drug(
    rows: &[CountryDrugRow],
    drug_group: &str,
) -> Vec<StackedBarRow> {
    let mut groups: BTreeMap<String, BarAcc> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.drug_group == drug_group) {
        let ms_code = row
            .ms_codes
            .iter()
            .next()
            .map(String::as_str)
            .unwrap_or(UNKNOWN);
        if is_unknown(ms_code) || is_unknown(&row.country) {
            continue;
        }
        for breakdown in &row.drug_types {
            if breakdown.total <= 0.0 {
                continue;
            }
            let acc = groups.entry(ms_code.to_string()).or_insert_with(|| BarAcc {
                country: row.country.clone(),
                shares: BTreeMap::new(),
            });
            *acc.shares.entry(breakdown.drug_type.clone()).or_insert(0.0) += breakdown.total;
        }
    }
    finish_bars(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, GEO_KEY_PATH};
    use crate::types::{Dataset, DrugTypeBreakdown, Record};
    use std::collections::BTreeSet;

    fn seizure(region: &str, sub_region: &str, country: &str, year: i32, kg: f64) -> Record {
        let mut rec = Record::empty(Dataset::Seizure);
        rec.year = Some(year);
        rec.region = region.to_string();
        rec.sub_region = sub_region.to_string();
        rec.country = country.to_string();
        rec.drug_group = "Cocaine and Derivatives".to_string();
        rec.drug = "Cocaine".to_string();
        rec.weight = kg;
        rec
    }

    #[test]
    fn emits_every_level_parent_first() {
        let records = vec![
            seizure("Americas", "South America", "Peru", 2019, 10.0),
            seizure("Americas", "South America", "Chile", 2020, 5.0),
        ];
        let rows = flatten(&aggregate(&records, &GEO_KEY_PATH), &GEO_KEY_PATH);

        let levels: Vec<&str> = rows.iter().map(|r| r.level.as_str()).collect();
        assert_eq!(levels, vec!["Region", "SubRegion", "Country", "Country"]);

        assert_eq!(rows[0].name, "Americas");
        assert_eq!(rows[0].parent, None);
        assert!((rows[0].total - 15.0).abs() < 1e-9);

        assert_eq!(rows[1].name, "South America");
        assert_eq!(rows[1].parent.as_deref(), Some("Americas"));

        // Children carry their parent's key and appear after it.
        let chile = rows.iter().find(|r| r.name == "Chile").unwrap();
        assert_eq!(chile.parent.as_deref(), Some("South America"));
        assert_eq!(chile.years.get(&2020), Some(&5.0));
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let values: BTreeMap<String, f64> = [
            ("Cocaine and Derivatives".to_string(), 30.0),
            ("Opioids and Opiates".to_string(), 50.0),
            ("NPS".to_string(), 20.0),
        ]
        .into_iter()
        .collect();

        let shares = normalize_percentages(&values);
        let sum: f64 = shares.values().sum();
        assert!((sum - 100.0).abs() < 1e-6);
        assert!((shares["Opioids and Opiates"] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn normalization_is_idempotent() {
        let values: BTreeMap<String, f64> =
            [("A".to_string(), 1.0), ("B".to_string(), 3.0)].into_iter().collect();
        let once = normalize_percentages(&values);
        let twice = normalize_percentages(&once);
        for (key, share) in &once {
            assert!((share - twice[key]).abs() < 1e-9);
        }
    }

    #[test]
    fn all_zero_siblings_normalize_to_zero_not_nan() {
        let values: BTreeMap<String, f64> =
            [("A".to_string(), 0.0), ("B".to_string(), 0.0)].into_iter().collect();
        let shares = normalize_percentages(&values);
        assert_eq!(shares.len(), 2);
        assert!(shares.values().all(|v| *v == 0.0));
        assert_eq!(normalize_percentages(&BTreeMap::new()).len(), 0);
    }

    fn pair(
        country: &str,
        drug_group: &str,
        ms_code: Option<&str>,
        total: f64,
    ) -> CountryDrugRow {
        CountryDrugRow {
            country: country.to_string(),
            drug_group: drug_group.to_string(),
            total,
            years: BTreeMap::new(),
            ms_codes: ms_code.map(|c| c.to_string()).into_iter().collect::<BTreeSet<_>>(),
            drug_types: Vec::new(),
        }
    }

    #[test]
    fn bars_hold_drug_group_percentages_per_code() {
        let rows = vec![
            pair("Peru", "Cocaine and Derivatives", Some("PER"), 75.0),
            pair("Peru", "Opioids and Opiates", Some("PER"), 25.0),
        ];
        let bars = stacked_bar_rows(&rows);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].ms_code, "PER");
        assert_eq!(bars[0].country, "Peru");
        assert!((bars[0].shares["Cocaine and Derivatives"] - 75.0).abs() < 1e-9);
        assert!((bars[0].shares["Opioids and Opiates"] - 25.0).abs() < 1e-9);
    }

    #[test]
    fn rows_without_a_reporting_code_are_skipped() {
        let rows = vec![
            pair("Peru", "Cocaine and Derivatives", Some("PER"), 10.0),
            pair("Nowhere", "Cocaine and Derivatives", None, 99.0),
        ];
        let bars = stacked_bar_rows(&rows);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].ms_code, "PER");
    }

    #[test]
    fn drug_type_drilldown_normalizes_within_the_group() {
        let mut row = pair("Peru", "Cocaine and Derivatives", Some("PER"), 10.0);
        row.drug_types = vec![
            DrugTypeBreakdown {
                drug_type: "Cocaine".to_string(),
                total: 6.0,
                years: BTreeMap::new(),
            },
            DrugTypeBreakdown {
                drug_type: "Coca paste".to_string(),
                total: 4.0,
                years: BTreeMap::new(),
            },
        ];
        let other_group = pair("Peru", "Opioids and Opiates", Some("PER"), 50.0);

        let bars = stacked_bar_rows_by_drug(&[row, other_group], "Cocaine and Derivatives");
        assert_eq!(bars.len(), 1);
        assert!((bars[0].shares["Cocaine"] - 60.0).abs() < 1e-9);
        assert!((bars[0].shares["Coca paste"] - 40.0).abs() < 1e-9);
    }
}
