//! Hierarchical aggregation of filtered records.
//!
//! All transforms here fold a filtered record slice into grouped totals.
//! Shared policy: weights of zero or less never accumulate, records
//! without a year never enter year-keyed totals, and a record whose value
//! is unknown at any level of the requested key path is skipped entirely
//! so the parent/child sums stay conserved.

use crate::types::{is_unknown, CountryDrugRow, Dataset, DrugTypeBreakdown, PricePoint, Record, YearTotal};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A categorical axis records can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Region,
    SubRegion,
    Country,
    DrugGroup,
    Drug,
    MsCode,
    TraffickingCategory,
    SeizureLocation,
}

impl Dimension {
    pub fn value_of<'a>(&self, record: &'a Record) -> &'a str {
        match self {
            Dimension::Region => &record.region,
            Dimension::SubRegion => &record.sub_region,
            Dimension::Country => &record.country,
            Dimension::DrugGroup => &record.drug_group,
            Dimension::Drug => &record.drug,
            Dimension::MsCode => record.ms_code.as_deref().unwrap_or(""),
            Dimension::TraffickingCategory => {
                record.trafficking_category.as_deref().unwrap_or("")
            }
            Dimension::SeizureLocation => record.seizure_location.as_deref().unwrap_or(""),
        }
    }

    /// Hierarchy label used when tagging flattened rows.
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Region => "Region",
            Dimension::SubRegion => "SubRegion",
            Dimension::Country => "Country",
            Dimension::DrugGroup => "DrugGroup",
            Dimension::Drug => "Drug",
            Dimension::MsCode => "MsCode",
            Dimension::TraffickingCategory => "TraffickingCategory",
            Dimension::SeizureLocation => "SeizureLocation",
        }
    }
}

/// The geographic rollup behind the world map.
pub const GEO_KEY_PATH: [Dimension; 3] =
    [Dimension::Region, Dimension::SubRegion, Dimension::Country];

/// One node of the aggregation tree. At every level `total` equals the sum
/// of the child totals, and `years[y]` the sum of contributions from year
/// `y`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AggNode {
    pub total: f64,
    pub years: BTreeMap<i32, f64>,
    pub children: BTreeMap<String, AggNode>,
}

impl AggNode {
    fn add(&mut self, year: i32, weight: f64) {
        self.total += weight;
        *self.years.entry(year).or_insert(0.0) += weight;
    }
}

/// Fold records into a nested rollup along `key_path`. A record whose
/// value is unknown at any level contributes nothing anywhere in the
/// tree; partial accumulation would break the parent-equals-sum-of-
/// children invariant.
pub fn aggregate(records: &[Record], key_path: &[Dimension]) -> AggNode {
    let mut root = AggNode::default();
    'record: for record in records {
        if record.weight <= 0.0 {
            continue;
        }
        let Some(year) = record.year else {
            continue;
        };
        let mut keys = Vec::with_capacity(key_path.len());
        for dim in key_path {
            let value = dim.value_of(record);
            if is_unknown(value) {
                continue 'record;
            }
            keys.push(value.to_string());
        }
        root.add(year, record.weight);
        let mut node = &mut root;
        for key in keys {
            node = node.children.entry(key).or_default();
            node.add(year, record.weight);
        }
    }
    root
}

/// The `(country, drug group)` rollup behind the distribution charts:
/// totals plus the distinct reporting codes seen and a nested per-drug
/// breakdown. Rows come back ordered by country then drug group.
pub fn country_drug_rows(records: &[Record]) -> Vec<CountryDrugRow> {
    #[derive(Default)]
    struct TypeAcc {
        total: f64,
        years: BTreeMap<i32, f64>,
    }
    #[derive(Default)]
    struct Acc {
        total: f64,
        years: BTreeMap<i32, f64>,
        ms_codes: BTreeSet<String>,
        drug_types: BTreeMap<String, TypeAcc>,
    }

    let mut map: HashMap<(String, String), Acc> = HashMap::new();
    for record in records {
        if record.weight <= 0.0 {
            continue;
        }
        let Some(year) = record.year else {
            continue;
        };
        if is_unknown(&record.country) || is_unknown(&record.drug_group) {
            continue;
        }
        let key = (record.country.clone(), record.drug_group.clone());
        let acc = map.entry(key).or_default();
        acc.total += record.weight;
        *acc.years.entry(year).or_insert(0.0) += record.weight;
        if let Some(code) = &record.ms_code {
            if !is_unknown(code) {
                acc.ms_codes.insert(code.clone());
            }
        }
        // The drug type is a nested breakdown, not a grouping key: an
        // unknown drug still counts toward the pair total.
        if !is_unknown(&record.drug) {
            let slot = acc.drug_types.entry(record.drug.clone()).or_default();
            slot.total += record.weight;
            *slot.years.entry(year).or_insert(0.0) += record.weight;
        }
    }

    let mut rows: Vec<CountryDrugRow> = map
        .into_iter()
        .map(|((country, drug_group), acc)| CountryDrugRow {
            country,
            drug_group,
            total: acc.total,
            years: acc.years,
            ms_codes: acc.ms_codes,
            drug_types: acc
                .drug_types
                .into_iter()
                .map(|(drug_type, slot)| DrugTypeBreakdown {
                    drug_type,
                    total: slot.total,
                    years: slot.years,
                })
                .collect(),
        })
        .collect();
    rows.sort_by(|a, b| {
        a.country
            .cmp(&b.country)
            .then_with(|| a.drug_group.cmp(&b.drug_group))
    });
    rows
}

/// Year-bucketed totals over an inclusive range. Every year of the range
/// is present in the output; years without contributions stay at zero.
pub fn year_totals(records: &[Record], year_range: (i32, i32)) -> Vec<YearTotal> {
    let (min, max) = year_range;
    let mut buckets: BTreeMap<i32, f64> = (min..=max).map(|y| (y, 0.0)).collect();
    for record in records {
        if record.weight <= 0.0 {
            continue;
        }
        let Some(year) = record.year else {
            continue;
        };
        if let Some(total) = buckets.get_mut(&year) {
            *total += record.weight;
        }
    }
    buckets
        .into_iter()
        .map(|(year, total)| YearTotal { year, total })
        .collect()
}

/// Price band points, one per price record that reports a full envelope.
/// Rows missing either bound are dropped; output is sorted by year.
pub fn price_series(records: &[Record]) -> Vec<PricePoint> {
    let mut points: Vec<PricePoint> = records
        .iter()
        .filter(|r| r.dataset == Dataset::Price)
        .filter_map(|r| {
            let year = r.year?;
            let minimum = r.price_min.unwrap_or(0.0);
            let maximum = r.price_max.unwrap_or(0.0);
            if minimum <= 0.0 || maximum <= 0.0 {
                return None;
            }
            Some(PricePoint {
                year,
                minimum_usd: minimum,
                typical_usd: r.weight,
                maximum_usd: maximum,
            })
        })
        .collect();
    points.sort_by_key(|p| p.year);
    points
}
