use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::models::{IndicatorDefinition, KpiRecord, TimePeriod};

/// One immutable generation of ingested records. Built once by the parser,
/// then read-only for its whole refresh epoch, so concurrent readers need
/// no locking.
#[derive(Debug, Clone, Default)]
pub struct Store {
    records: Vec<Arc<KpiRecord>>,
    definitions: Arc<BTreeMap<String, IndicatorDefinition>>,
}

impl Store {
    pub fn new(
        mut records: Vec<KpiRecord>,
        definitions: BTreeMap<String, IndicatorDefinition>,
    ) -> Self {
        records.sort_by(|a, b| {
            a.id.cmp(&b.id)
                .then_with(|| a.time_period.cmp(&b.time_period))
        });
        Store {
            records: records.into_iter().map(Arc::new).collect(),
            definitions: Arc::new(definitions),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A view over every record. Views share the underlying records, so
    /// taking one is cheap.
    pub fn view(&self) -> StoreView {
        StoreView {
            records: self.records.clone(),
            definitions: self.definitions.clone(),
        }
    }
}

/// A (possibly filtered) window onto one store generation. Records are
/// shared, never copied; dropping a view drops only the references.
#[derive(Debug, Clone)]
pub struct StoreView {
    records: Vec<Arc<KpiRecord>>,
    definitions: Arc<BTreeMap<String, IndicatorDefinition>>,
}

impl StoreView {
    pub fn all(&self) -> &[Arc<KpiRecord>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records for one indicator, ordered by period.
    pub fn by_indicator(&self, id: &str) -> Vec<Arc<KpiRecord>> {
        self.records
            .iter()
            .filter(|record| record.id == id)
            .cloned()
            .collect()
    }

    pub fn indicator_ids(&self) -> BTreeSet<&str> {
        self.records.iter().map(|record| record.id.as_str()).collect()
    }

    /// Distinct periods in chronological order.
    pub fn periods(&self) -> Vec<TimePeriod> {
        let distinct: BTreeSet<&TimePeriod> =
            self.records.iter().map(|record| &record.time_period).collect();
        distinct.into_iter().cloned().collect()
    }

    pub fn domains(&self) -> Vec<String> {
        let distinct: BTreeSet<&str> =
            self.records.iter().map(|record| record.domain.as_str()).collect();
        distinct.into_iter().map(str::to_string).collect()
    }

    pub fn stewards(&self) -> Vec<String> {
        let distinct: BTreeSet<&str> = self
            .records
            .iter()
            .flat_map(|record| record.stewards.iter().map(String::as_str))
            .collect();
        distinct.into_iter().map(str::to_string).collect()
    }

    pub fn tags(&self) -> Vec<String> {
        let distinct: BTreeSet<&str> = self
            .records
            .iter()
            .flat_map(|record| record.tags.iter().map(String::as_str))
            .collect();
        distinct.into_iter().map(str::to_string).collect()
    }

    pub fn definition(&self, id: &str) -> Option<&IndicatorDefinition> {
        self.definitions.get(id)
    }

    pub(crate) fn with_records(&self, records: Vec<Arc<KpiRecord>>) -> StoreView {
        StoreView {
            records,
            definitions: self.definitions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::{MeasurementType, TargetOperation};

    fn record(id: &str, period: &str, value: Option<f64>) -> KpiRecord {
        KpiRecord {
            id: id.to_string(),
            time_period: period.parse().expect("valid period"),
            domain: "Community".to_string(),
            indicator_name: format!("Indicator {id}"),
            measurement_type: MeasurementType::Count,
            unit: "count".to_string(),
            value,
            notes: None,
            stewards: vec!["Standards Office".to_string()],
            target: None,
            target_type: None,
            target_operation: TargetOperation::default(),
            tags: Default::default(),
            image: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn periods_come_back_chronological() {
        let store = Store::new(
            vec![
                record("K1", "2025-T10", Some(1.0)),
                record("K1", "2025-T2", Some(2.0)),
                record("K2", "2024-T4", Some(3.0)),
            ],
            BTreeMap::new(),
        );
        let labels: Vec<String> = store
            .view()
            .periods()
            .iter()
            .map(|p| p.label().to_string())
            .collect();
        assert_eq!(labels, vec!["2024-T4", "2025-T2", "2025-T10"]);
    }

    #[test]
    fn by_indicator_is_period_ordered() {
        let store = Store::new(
            vec![
                record("K1", "2025-T1", Some(9.0)),
                record("K1", "2024-T4", Some(8.0)),
                record("K2", "2024-T4", Some(1.0)),
            ],
            BTreeMap::new(),
        );
        let series = store.view().by_indicator("K1");
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].time_period.label(), "2024-T4");
        assert_eq!(series[1].time_period.label(), "2025-T1");
    }

    #[test]
    fn distinct_inventories_are_sorted() {
        let mut tagged = record("K3", "2025-T1", None);
        tagged.domain = "Adoption".to_string();
        tagged.stewards = vec!["Alpha Org".to_string(), "Beta Org".to_string()];
        let store = Store::new(
            vec![record("K1", "2025-T1", Some(1.0)), tagged],
            BTreeMap::new(),
        );
        let view = store.view();
        assert_eq!(view.domains(), vec!["Adoption", "Community"]);
        assert_eq!(
            view.stewards(),
            vec!["Alpha Org", "Beta Org", "Standards Office"]
        );
        assert_eq!(view.indicator_ids().len(), 2);
    }
}
