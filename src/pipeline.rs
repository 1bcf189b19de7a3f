//! Orchestration: one pure pass from `(records, filters)` to every chart
//! payload.
//!
//! Each filter change recomputes the derived views from scratch; nothing
//! is cached between calls and the same inputs always produce the same
//! output. Input sizes are tens of thousands of records, so a full
//! recompute per change is cheap enough.

use crate::aggregate::{
    aggregate, country_drug_rows, price_series, year_totals, GEO_KEY_PATH,
};
use crate::filter::FilterState;
use crate::flatten::{flatten, stacked_bar_rows, stacked_bar_rows_by_drug};
use crate::sankey::{build_graph, FlowRecord, SankeyConfig, SankeyGraph};
use crate::types::{
    is_unknown, CountryDrugRow, Dataset, LevelRow, PricePoint, Record, StackedBarRow, YearTotal,
};
use serde::Serialize;
use tracing::debug;

/// Everything the presentation layer renders, derived from one filter
/// state. Empty vectors and empty graphs are the "no data" signal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartData {
    /// Region → sub-region → country rollup rows for the world map.
    pub map_rows: Vec<LevelRow>,
    /// (country, drug group) totals with code and drug-type breakdowns.
    pub country_drug: Vec<CountryDrugRow>,
    /// Percentage bars per reporting code.
    pub stacked_bars: Vec<StackedBarRow>,
    /// Trafficking flow graph.
    pub trafficking_flow: SankeyGraph,
    /// Seizure quantity per year over the filtered range.
    pub seizure_years: Vec<YearTotal>,
    /// Prevalence totals per year over the filtered range.
    pub prevalence_years: Vec<YearTotal>,
    /// Price band points.
    pub prices: Vec<PricePoint>,
}

fn known(value: &str) -> Option<String> {
    if is_unknown(value) {
        None
    } else {
        Some(value.to_string())
    }
}

/// Map trafficking records onto flow chains for the Sankey builder.
/// Unknown labels become `None` so the builder drops the chain.
pub fn trafficking_flows(records: &[Record]) -> Vec<FlowRecord> {
    records
        .iter()
        .map(|r| FlowRecord {
            source: known(&r.drug_group),
            intermediate: r.trafficking_category.clone(),
            destination: r.seizure_location.clone(),
            weight: r.weight,
        })
        .collect()
}

impl ChartData {
    pub fn compute(records: &[Record], filters: &FilterState) -> ChartData {
        let mut seizures = Vec::new();
        let mut prevalence = Vec::new();
        let mut prices = Vec::new();
        let mut trafficking = Vec::new();
        for record in records {
            if !filters.matches(record) {
                continue;
            }
            match record.dataset {
                Dataset::Seizure => seizures.push(record.clone()),
                Dataset::PrevalenceNps | Dataset::PrevalenceGeneral => {
                    prevalence.push(record.clone())
                }
                Dataset::Price => prices.push(record.clone()),
                Dataset::Trafficking => trafficking.push(record.clone()),
            }
        }

        let map_rows = flatten(&aggregate(&seizures, &GEO_KEY_PATH), &GEO_KEY_PATH);
        let country_drug = country_drug_rows(&seizures);
        // With a drug group selected the bars drill down into its drug
        // types; otherwise they compare drug groups.
        let stacked_bars = match &filters.drugs.drug_group {
            Some(group) => stacked_bar_rows_by_drug(&country_drug, group),
            None => stacked_bar_rows(&country_drug),
        };
        let trafficking_flow =
            build_graph(&trafficking_flows(&trafficking), SankeyConfig::default());
        let seizure_years = year_totals(&seizures, filters.year_range);
        let prevalence_years = year_totals(&prevalence, filters.year_range);
        let prices = price_series(&prices);

        debug!(
            seizures = seizures.len(),
            prevalence = prevalence.len(),
            trafficking = trafficking.len(),
            map_rows = map_rows.len(),
            bars = stacked_bars.len(),
            nodes = trafficking_flow.nodes.len(),
            "chart data recomputed"
        );

        ChartData {
            map_rows,
            country_drug,
            stacked_bars,
            trafficking_flow,
            seizure_years,
            prevalence_years,
            prices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{DrugSelection, FilterState, RegionSelection};

    fn seizure(country: &str, drug_group: &str, year: i32, kg: f64) -> Record {
        let mut rec = Record::empty(Dataset::Seizure);
        rec.year = Some(year);
        rec.region = "Americas".to_string();
        rec.sub_region = "South America".to_string();
        rec.country = country.to_string();
        rec.drug_group = drug_group.to_string();
        rec.drug = "Cocaine".to_string();
        rec.ms_code = Some(format!("{}01", &country[..2].to_uppercase()));
        rec.weight = kg;
        rec
    }

    fn trafficking(drug_group: &str, category: &str, location: &str, kg: f64) -> Record {
        let mut rec = Record::empty(Dataset::Trafficking);
        rec.year = Some(2020);
        rec.region = "Americas".to_string();
        rec.sub_region = "South America".to_string();
        rec.country = "Colombia".to_string();
        rec.drug_group = drug_group.to_string();
        rec.trafficking_category = Some(category.to_string());
        rec.seizure_location = Some(location.to_string());
        rec.weight = kg;
        rec
    }

    fn sample_records() -> Vec<Record> {
        let mut price = Record::empty(Dataset::Price);
        price.year = Some(2020);
        price.country = "Peru".to_string();
        price.weight = 120.0;
        price.price_min = Some(80.0);
        price.price_max = Some(150.0);

        let mut prevalence = Record::empty(Dataset::PrevalenceGeneral);
        prevalence.year = Some(2019);
        prevalence.country = "Peru".to_string();
        prevalence.drug_group = "Cocaine and Derivatives".to_string();
        prevalence.weight = 1.5;

        vec![
            seizure("Peru", "Cocaine and Derivatives", 2019, 10.0),
            seizure("Peru", "Cocaine and Derivatives", 2020, 5.0),
            seizure("Chile", "Opioids and Opiates", 2021, 2.0),
            trafficking("Cocaine and Derivatives", "Maritime", "Port", 40.0),
            price,
            prevalence,
        ]
    }

    #[test]
    fn derives_every_view_from_one_pass() {
        let data = ChartData::compute(&sample_records(), &FilterState::default());

        // Region, sub-region and two countries.
        assert_eq!(data.map_rows.len(), 4);
        assert_eq!(data.country_drug.len(), 2);
        assert_eq!(data.stacked_bars.len(), 2);
        assert_eq!(data.trafficking_flow.nodes.len(), 3);
        assert_eq!(data.trafficking_flow.links.len(), 2);
        assert_eq!(data.seizure_years.len(), 5);
        assert_eq!(data.prevalence_years.len(), 5);
        assert_eq!(data.prices.len(), 1);

        let peru_2019: f64 = data
            .seizure_years
            .iter()
            .find(|y| y.year == 2019)
            .map(|y| y.total)
            .unwrap();
        assert!((peru_2019 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn country_filter_narrows_every_view() {
        let filters = FilterState {
            region: RegionSelection {
                country: Some("Peru".to_string()),
                ..RegionSelection::default()
            },
            ..FilterState::default()
        };
        let data = ChartData::compute(&sample_records(), &filters);

        assert!(data.map_rows.iter().all(|r| r.name != "Chile"));
        assert_eq!(data.country_drug.len(), 1);
        assert_eq!(data.country_drug[0].country, "Peru");
        // The trafficking record is Colombian, so the graph empties.
        assert!(data.trafficking_flow.nodes.is_empty());
    }

    #[test]
    fn mode_filter_empties_excluded_datasets() {
        let filters = FilterState {
            modes: [Dataset::Price].into_iter().collect(),
            ..FilterState::default()
        };
        let data = ChartData::compute(&sample_records(), &filters);

        assert!(data.map_rows.is_empty());
        assert!(data.country_drug.is_empty());
        assert!(data.trafficking_flow.nodes.is_empty());
        assert!(data.seizure_years.iter().all(|y| y.total == 0.0));
        assert_eq!(data.prices.len(), 1);
    }

    #[test]
    fn selecting_a_drug_group_switches_bars_to_drug_types() {
        let filters = FilterState {
            drugs: DrugSelection {
                drug_group: Some("Cocaine and Derivatives".to_string()),
                drug: None,
            },
            ..FilterState::default()
        };
        let data = ChartData::compute(&sample_records(), &filters);

        assert_eq!(data.stacked_bars.len(), 1);
        assert!(data.stacked_bars[0].shares.contains_key("Cocaine"));
    }

    #[test]
    fn recompute_is_deterministic() {
        let records = sample_records();
        let filters = FilterState::default();
        let a = ChartData::compute(&records, &filters);
        let b = ChartData::compute(&records, &filters);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
