//! Filter state and the record predicate.
//!
//! Every filter dimension is independent: a record passes when it passes
//! all active constraints, and an unset constraint passes everything.

use crate::types::{Dataset, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Geographic selection. Each level constrains exactly when set; the
/// levels are independent of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSelection {
    pub region: Option<String>,
    pub sub_region: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugSelection {
    pub drug_group: Option<String>,
    pub drug: Option<String>,
}

/// The full filter selection driving every derived view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    /// Inclusive `[min, max]` year bounds.
    pub year_range: (i32, i32),
    pub region: RegionSelection,
    pub drugs: DrugSelection,
    /// Active datasets. An empty set is treated as "no constraint", like
    /// every other unset field.
    pub modes: BTreeSet<Dataset>,
    pub gender: Option<String>,
    pub age: Option<String>,
}

/// The full span of the bundled datasets.
pub const YEAR_MIN: i32 = 2018;
pub const YEAR_MAX: i32 = 2022;

impl Default for FilterState {
    fn default() -> Self {
        FilterState {
            year_range: (YEAR_MIN, YEAR_MAX),
            region: RegionSelection::default(),
            drugs: DrugSelection::default(),
            modes: BTreeSet::new(),
            gender: None,
            age: None,
        }
    }
}

fn matches_exact(constraint: &Option<String>, value: &str) -> bool {
    match constraint {
        Some(wanted) => wanted == value,
        None => true,
    }
}

/// Demographic fields are only present on prevalence records; a record
/// without the field passes the constraint rather than vanishing from
/// every non-demographic view.
fn matches_demographic(constraint: &Option<String>, value: &Option<String>) -> bool {
    match (constraint, value) {
        (Some(wanted), Some(actual)) => wanted == actual,
        _ => true,
    }
}

impl FilterState {
    /// Whether a record passes every active constraint. Pure and
    /// deterministic; records without a year always fail the year check.
    pub fn matches(&self, record: &Record) -> bool {
        let Some(year) = record.year else {
            return false;
        };
        if year < self.year_range.0 || year > self.year_range.1 {
            return false;
        }
        if !self.modes.is_empty() && !self.modes.contains(&record.dataset) {
            return false;
        }
        matches_exact(&self.region.region, &record.region)
            && matches_exact(&self.region.sub_region, &record.sub_region)
            && matches_exact(&self.region.country, &record.country)
            && matches_exact(&self.drugs.drug_group, &record.drug_group)
            && matches_exact(&self.drugs.drug, &record.drug)
            && matches_demographic(&self.gender, &record.gender)
            && matches_demographic(&self.age, &record.age_group)
    }
}

/// A partial update: only the fields that are `Some` replace the current
/// state, and nested selections are replaced wholesale, never merged
/// field-by-field. Callers changing one level of a selection must send
/// the whole selection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterUpdate {
    pub year_range: Option<(i32, i32)>,
    pub region: Option<RegionSelection>,
    pub drugs: Option<DrugSelection>,
    pub modes: Option<BTreeSet<Dataset>>,
    // Doubled options distinguish "leave alone" from "clear".
    pub gender: Option<Option<String>>,
    pub age: Option<Option<String>>,
}

/// Holds the current selection for the presentation layer: read with
/// [`FilterStore::state`], change with [`FilterStore::update`].
#[derive(Debug, Clone, Default)]
pub struct FilterStore {
    state: FilterState,
}

impl FilterStore {
    pub fn new(initial: FilterState) -> Self {
        FilterStore { state: initial }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Shallow-merge a partial update and return the resulting state.
    pub fn update(&mut self, patch: FilterUpdate) -> FilterState {
        if let Some(year_range) = patch.year_range {
            self.state.year_range = year_range;
        }
        if let Some(region) = patch.region {
            self.state.region = region;
        }
        if let Some(drugs) = patch.drugs {
            self.state.drugs = drugs;
        }
        if let Some(modes) = patch.modes {
            self.state.modes = modes;
        }
        if let Some(gender) = patch.gender {
            self.state.gender = gender;
        }
        if let Some(age) = patch.age {
            self.state.age = age;
        }
        self.state.clone()
    }
}
