use std::collections::BTreeMap;

use crate::models::{Direction, TimePeriod, TrendResult};
use crate::store::StoreView;

/// Period-over-period comparison for every indicator observed in both
/// `period_a` and `period_b`. Indicators missing a present value in either
/// period are skipped; trends are never imputed. Results come back sorted
/// by indicator id.
pub fn trends(view: &StoreView, period_a: &TimePeriod, period_b: &TimePeriod) -> Vec<TrendResult> {
    let mut values: BTreeMap<&str, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for record in view.all() {
        if record.time_period == *period_a {
            values.entry(&record.id).or_default().0 = record.value;
        } else if record.time_period == *period_b {
            values.entry(&record.id).or_default().1 = record.value;
        }
    }

    values
        .into_iter()
        .filter_map(|(id, (value_a, value_b))| {
            let value_a = value_a?;
            let value_b = value_b?;
            let delta = value_b - value_a;
            Some(TrendResult {
                indicator_id: id.to_string(),
                period_a: period_a.clone(),
                period_b: period_b.clone(),
                value_a,
                value_b,
                delta,
                // Undefined on a zero base; callers must handle None rather
                // than receive an infinity.
                percent_change: (value_a != 0.0).then(|| delta / value_a),
                direction: Direction::from_delta(delta),
            })
        })
        .collect()
}

/// Trends across the view's two most recent periods. Empty when the view
/// covers fewer than two periods.
pub fn latest_trend(view: &StoreView) -> Vec<TrendResult> {
    let periods = view.periods();
    if periods.len() < 2 {
        return Vec::new();
    }
    trends(view, &periods[periods.len() - 2], &periods[periods.len() - 1])
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::{KpiRecord, MeasurementType, TargetOperation};
    use crate::store::Store;

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

    fn view_of(records: Vec<KpiRecord>) -> StoreView {
        Store::new(records, BTreeMap::new()).view()
    }

    #[test]
    fn latest_trend_compares_two_most_recent_periods() {
        let view = view_of(vec![
            record("K1", "2024-T4", Some(100.0)),
            record("K1", "2025-T1", Some(90.0)),
        ]);
        let results = latest_trend(&view);
        assert_eq!(results.len(), 1);
        let trend = &results[0];
        assert_eq!(trend.delta, -10.0);
        assert_eq!(trend.percent_change, Some(-0.10));
        assert_eq!(trend.direction, Direction::Down);
        assert_eq!(trend.period_b.label(), "2025-T1");
    }

    #[test]
    fn unpaired_indicator_yields_no_trend() {
        let view = view_of(vec![
            record("K1", "2024-T4", Some(100.0)),
            record("K1", "2025-T1", Some(90.0)),
            record("K2", "2025-T1", Some(40.0)),
        ]);
        let results = latest_trend(&view);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].indicator_id, "K1");
    }

    #[test]
    fn absent_value_is_not_paired() {
        let view = view_of(vec![
            record("K1", "2024-T4", None),
            record("K1", "2025-T1", Some(90.0)),
        ]);
        assert!(latest_trend(&view).is_empty());
    }

    #[test]
    fn percent_change_undefined_on_zero_base() {
        let view = view_of(vec![
            record("K1", "2024-T4", Some(0.0)),
            record("K1", "2025-T1", Some(5.0)),
        ]);
        let results = latest_trend(&view);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].percent_change, None);
        assert_eq!(results[0].delta, 5.0);
        assert_eq!(results[0].direction, Direction::Up);
    }

    #[test]
    fn delta_is_antisymmetric() {
        let a: TimePeriod = "2024-T4".parse().expect("valid period");
        let b: TimePeriod = "2025-T1".parse().expect("valid period");
        let view = view_of(vec![
            record("K1", "2024-T4", Some(37.5)),
            record("K1", "2025-T1", Some(41.25)),
        ]);
        let forward = trends(&view, &a, &b);
        let backward = trends(&view, &b, &a);
        assert_eq!(forward[0].delta, -backward[0].delta);
    }

    #[test]
    fn float_noise_is_a_real_direction() {
        // Values that differ only in representation error still move.
        let view = view_of(vec![
            record("K1", "2024-T4", Some(0.3)),
            record("K1", "2025-T1", Some(0.1 + 0.2)),
        ]);
        let results = latest_trend(&view);
        assert_eq!(results.len(), 1);
        assert_ne!(results[0].direction, Direction::Flat);
    }

    #[test]
    fn single_period_view_has_no_latest_trend() {
        let view = view_of(vec![record("K1", "2025-T1", Some(1.0))]);
        assert!(latest_trend(&view).is_empty());
    }

    #[test]
    fn explicit_pair_missing_from_data_is_empty() {
        let a: TimePeriod = "2020-T1".parse().expect("valid period");
        let b: TimePeriod = "2020-T2".parse().expect("valid period");
        let view = view_of(vec![record("K1", "2025-T1", Some(1.0))]);
        assert!(trends(&view, &a, &b).is_empty());
    }
}
