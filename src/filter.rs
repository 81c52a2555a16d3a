use serde::{Deserialize, Serialize};

use crate::models::{KpiRecord, TimePeriod};
use crate::store::StoreView;

/// Optional selection criteria, AND-combined. An absent criterion places
/// no constraint on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiFilter {
    pub time_period: Option<TimePeriod>,
    pub domain: Option<String>,
    pub steward: Option<String>,
    pub indicator_substring: Option<String>,
    pub tag: Option<String>,
}

impl KpiFilter {
    pub fn is_empty(&self) -> bool {
        self.time_period.is_none()
            && self.domain.is_none()
            && self.steward.is_none()
            && self.indicator_substring.is_none()
            && self.tag.is_none()
    }

    pub fn matches(&self, record: &KpiRecord) -> bool {
        if let Some(period) = &self.time_period {
            if record.time_period != *period {
                return false;
            }
        }
        if let Some(domain) = &self.domain {
            if record.domain != *domain {
                return false;
            }
        }
        if let Some(steward) = &self.steward {
            if !record.stewards.iter().any(|s| s == steward) {
                return false;
            }
        }
        if let Some(needle) = &self.indicator_substring {
            let haystack = record.indicator_name.to_lowercase();
            if !haystack.contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !record.tags.contains(tag) {
                return false;
            }
        }
        true
    }
}

/// Narrows a view to the records matching `filter`. The result shares the
/// underlying records; an empty result is a valid view, not an error.
pub fn apply(view: &StoreView, filter: &KpiFilter) -> StoreView {
    if filter.is_empty() {
        return view.clone();
    }
    let records = view
        .all()
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect();
    view.with_records(records)
}
