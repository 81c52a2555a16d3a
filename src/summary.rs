use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::store::StoreView;
use crate::models::TimePeriod;

/// Aggregate counts over a view. All counts are over distinct indicator
/// identities, not raw rows, and all maps iterate in key order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_indicators: usize,
    pub by_domain: BTreeMap<String, usize>,
    pub by_steward: BTreeMap<String, usize>,
    pub periods: Vec<TimePeriod>,
    pub latest_period: Option<TimePeriod>,
}

pub fn summarize(view: &StoreView) -> Summary {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut by_domain: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_steward: BTreeMap<String, usize> = BTreeMap::new();

    for record in view.all() {
        if !seen.insert(&record.id) {
            continue;
        }
        *by_domain.entry(record.domain.clone()).or_default() += 1;
        for steward in &record.stewards {
            *by_steward.entry(steward.clone()).or_default() += 1;
        }
    }

    let periods = view.periods();
    Summary {
        total_indicators: seen.len(),
        by_domain,
        by_steward,
        latest_period: periods.last().cloned(),
        periods,
    }
}
