use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tabled::Tabled;

/// Sentinel category assigned to missing/empty categorical fields.
///
/// Records carrying this value in a dimension are dropped before that
/// dimension is aggregated, so unknown data never pollutes real totals.
pub const UNKNOWN: &str = "Unknown";

/// True for category values that must not contribute to a grouped total.
pub fn is_unknown(value: &str) -> bool {
    value.is_empty() || value == UNKNOWN
}

/// The UNODC exports are inconsistent about whether `Year` and quantity
/// columns come through as JSON numbers or strings; accept both and carry
/// the raw text forward for the safe parsers in `util`.
fn de_opt_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(de)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SeizureRow {
    #[serde(rename = "Year", default, deserialize_with = "de_opt_string")]
    pub year: Option<String>,
    #[serde(rename = "Country/Territory")]
    pub country: Option<String>,
    #[serde(rename = "Region")]
    pub region: Option<String>,
    #[serde(rename = "SubRegion")]
    pub sub_region: Option<String>,
    #[serde(rename = "Drug group")]
    pub drug_group: Option<String>,
    #[serde(rename = "Drug")]
    pub drug: Option<String>,
    #[serde(rename = "Kilograms", default, deserialize_with = "de_opt_string")]
    pub kilograms: Option<String>,
    #[serde(rename = "msCode")]
    pub ms_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PrevalenceRow {
    #[serde(rename = "Year", default, deserialize_with = "de_opt_string")]
    pub year: Option<String>,
    #[serde(rename = "Country/Territory")]
    pub country: Option<String>,
    #[serde(rename = "Region")]
    pub region: Option<String>,
    #[serde(rename = "SubRegion")]
    pub sub_region: Option<String>,
    #[serde(rename = "Drug group")]
    pub drug_group: Option<String>,
    #[serde(rename = "Drug")]
    pub drug: Option<String>,
    #[serde(rename = "Best", default, deserialize_with = "de_opt_string")]
    pub best: Option<String>,
    #[serde(rename = "Q2", default, deserialize_with = "de_opt_string")]
    pub q2: Option<String>,
    #[serde(rename = "Gender")]
    pub gender: Option<String>,
    #[serde(rename = "Age")]
    pub age: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PriceRow {
    #[serde(rename = "Year", default, deserialize_with = "de_opt_string")]
    pub year: Option<String>,
    #[serde(rename = "Country/Territory")]
    pub country: Option<String>,
    #[serde(rename = "Region")]
    pub region: Option<String>,
    #[serde(rename = "SubRegion")]
    pub sub_region: Option<String>,
    #[serde(rename = "Drug group")]
    pub drug_group: Option<String>,
    #[serde(rename = "Drug")]
    pub drug: Option<String>,
    #[serde(rename = "Minimum_USD", default, deserialize_with = "de_opt_string")]
    pub minimum_usd: Option<String>,
    #[serde(rename = "Typical_USD", default, deserialize_with = "de_opt_string")]
    pub typical_usd: Option<String>,
    #[serde(rename = "Maximum_USD", default, deserialize_with = "de_opt_string")]
    pub maximum_usd: Option<String>,
}

/// One row of the individual drug seizures (IDS) export, the only dataset
/// shipped as CSV. `SeizureDate` backs up a missing `Year` column.
#[derive(Debug, Deserialize)]
pub struct TraffickingRow {
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "SeizureDate")]
    pub seizure_date: Option<String>,
    #[serde(rename = "Country/Territory")]
    pub country: Option<String>,
    #[serde(rename = "Region")]
    pub region: Option<String>,
    #[serde(rename = "SubRegion")]
    pub sub_region: Option<String>,
    #[serde(rename = "Drug group")]
    pub drug_group: Option<String>,
    #[serde(rename = "Drug")]
    pub drug: Option<String>,
    #[serde(rename = "Kilograms")]
    pub kilograms: Option<String>,
    #[serde(rename = "msCode")]
    pub ms_code: Option<String>,
    #[serde(rename = "SeizuredLocation")]
    pub seizure_location: Option<String>,
    #[serde(rename = "TraffickingTransportationCategory")]
    pub trafficking_category: Option<String>,
}

/// Which source dataset a normalized record came from. The mode filter
/// selects datasets by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dataset {
    Seizure,
    PrevalenceNps,
    PrevalenceGeneral,
    Price,
    Trafficking,
}

/// The single record shape consumed by every transform downstream of the
/// loader. Categorical fields hold [`UNKNOWN`] when the source was empty;
/// `weight` is 0.0 when the source quantity could not be parsed. Records
/// are never mutated after normalization.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub dataset: Dataset,
    pub year: Option<i32>,
    pub country: String,
    pub region: String,
    pub sub_region: String,
    pub drug_group: String,
    pub drug: String,
    pub weight: f64,
    pub ms_code: Option<String>,
    pub seizure_location: Option<String>,
    pub trafficking_category: Option<String>,
    pub gender: Option<String>,
    pub age_group: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
}

impl Record {
    /// A bare record for the given dataset, filled in by the loader
    /// adapters and by tests.
    pub fn empty(dataset: Dataset) -> Self {
        Record {
            dataset,
            year: None,
            country: UNKNOWN.to_string(),
            region: UNKNOWN.to_string(),
            sub_region: UNKNOWN.to_string(),
            drug_group: UNKNOWN.to_string(),
            drug: UNKNOWN.to_string(),
            weight: 0.0,
            ms_code: None,
            seizure_location: None,
            trafficking_category: None,
            gender: None,
            age_group: None,
            price_min: None,
            price_max: None,
        }
    }
}

fn display_opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// One flattened aggregation node, tagged with its hierarchy level and the
/// key of its immediate parent. The world map consumes the
/// `level == "Country"` slice of these rows.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct LevelRow {
    #[tabled(rename = "Level")]
    pub level: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Total")]
    pub total: f64,
    #[tabled(skip)]
    pub years: BTreeMap<i32, f64>,
    #[tabled(rename = "Parent", display_with = "display_opt")]
    pub parent: Option<String>,
}

/// Per-drug-type slice nested inside a [`CountryDrugRow`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugTypeBreakdown {
    pub drug_type: String,
    pub total: f64,
    pub years: BTreeMap<i32, f64>,
}

/// Seizure totals for one (country, drug group) pair, with the distinct
/// reporting codes seen and a per-drug-type breakdown for drill-down.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryDrugRow {
    pub country: String,
    pub drug_group: String,
    pub total: f64,
    pub years: BTreeMap<i32, f64>,
    pub ms_codes: BTreeSet<String>,
    pub drug_types: Vec<DrugTypeBreakdown>,
}

/// One stacked bar: sibling category shares for a reporting code,
/// normalized so the shares sum to 100 (or all zeros when nothing
/// contributed).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackedBarRow {
    pub ms_code: String,
    pub country: String,
    pub shares: BTreeMap<String, f64>,
}

/// One bucket of the year series. Gap years inside the requested range are
/// present with a zero total, never omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct YearTotal {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: f64,
}

/// One point of the price band chart: the typical line plus the min/max
/// envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct PricePoint {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Minimum_USD")]
    #[tabled(rename = "Minimum_USD")]
    pub minimum_usd: f64,
    #[serde(rename = "Typical_USD")]
    #[tabled(rename = "Typical_USD")]
    pub typical_usd: f64,
    #[serde(rename = "Maximum_USD")]
    #[tabled(rename = "Maximum_USD")]
    pub maximum_usd: f64,
}
