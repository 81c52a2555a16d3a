use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::alert::{self, AlertConfig};
use crate::errors::{ConfigurationError, ParseWarning};
use crate::filter::{self, KpiFilter};
use crate::models::{Alert, MeasurementType, TargetOperation, TimePeriod, TrendResult};
use crate::parser::{self, RawRow};
use crate::store::{Store, StoreView};
use crate::summary::{self, Summary};
use crate::trend;

/// One immutable store generation plus its refresh-epoch metadata. Cloning
/// is cheap; a clone pins the generation for the lifetime of a request.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub store: Arc<Store>,
    pub epoch: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Outcome of a successful refresh, returned to the triggering collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub epoch: u64,
    pub refreshed_at: DateTime<Utc>,
    pub records: usize,
    pub indicators: usize,
    pub warnings: Vec<ParseWarning>,
}

/// Per-indicator presentation aggregate: the joined definition, the values
/// for the view's two latest periods, and target progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiCard {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub stewards: Vec<String>,
    pub measurement_type: MeasurementType,
    pub unit: String,
    pub tags: BTreeSet<String>,
    pub image: Option<String>,
    pub definition: Option<String>,
    pub current_period: Option<TimePeriod>,
    pub current_value: Option<f64>,
    pub previous_value: Option<f64>,
    pub trend: Option<TrendResult>,
    pub target: Option<f64>,
    pub target_operation: TargetOperation,
    /// Percent of target attained; may exceed 100 for beaten targets.
    pub progress_to_target: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    DomainDistribution,
    TrendComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub chart: &'static str,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Everything the presentation layer needs for one render, computed from a
/// single snapshot so the pieces can never mix generations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardPayload {
    pub epoch: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub cards: Vec<KpiCard>,
    pub summary: Summary,
    pub trends: Vec<TrendResult>,
    pub alerts: Vec<Alert>,
}

/// The core's boundary object. Holds the current store generation behind an
/// atomically swapped handle; every read path works against one pinned
/// snapshot and takes no further locks.
pub struct Dashboard {
    current: RwLock<Snapshot>,
    refresh_gate: Mutex<()>,
    epochs: AtomicU64,
    config: AlertConfig,
}

impl Default for Dashboard {
    fn default() -> Self {
        Dashboard::new(AlertConfig::default())
    }
}

impl Dashboard {
    pub fn new(config: AlertConfig) -> Self {
        Dashboard {
            current: RwLock::new(Snapshot {
                store: Arc::new(Store::default()),
                epoch: 0,
                refreshed_at: None,
            }),
            refresh_gate: Mutex::new(()),
            epochs: AtomicU64::new(0),
            config,
        }
    }

    /// Re-parses the supplied rows and swaps in the new generation. At most
    /// one refresh runs at a time; a failed parse leaves the previous
    /// generation untouched, so a broken feed can never evict a good store.
    pub fn refresh(
        &self,
        kpi_rows: &[RawRow],
        definition_rows: &[RawRow],
    ) -> Result<RefreshReport, ConfigurationError> {
        let _serialized = self
            .refresh_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let (store, warnings) = parser::parse(kpi_rows, definition_rows).map_err(|err| {
            warn!("refresh aborted, keeping previous store: {err}");
            err
        })?;
        for warning in &warnings {
            warn!("ingest: {warning}");
        }

        let epoch = self.epochs.fetch_add(1, Ordering::SeqCst) + 1;
        let refreshed_at = Utc::now();
        let snapshot = Snapshot {
            store: Arc::new(store),
            epoch,
            refreshed_at: Some(refreshed_at),
        };
        let report = RefreshReport {
            epoch,
            refreshed_at,
            records: snapshot.store.len(),
            indicators: snapshot.store.view().indicator_ids().len(),
            warnings,
        };

        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
        info!(
            epoch,
            records = report.records,
            indicators = report.indicators,
            warnings = report.warnings.len(),
            "kpi store refreshed"
        );
        Ok(report)
    }

    /// The current generation. Readers keep the returned snapshot for the
    /// whole request and never observe a partially applied refresh.
    pub fn snapshot(&self) -> Snapshot {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn filtered(&self, filter: &KpiFilter) -> (Snapshot, StoreView) {
        let snapshot = self.snapshot();
        let view = filter::apply(&snapshot.store.view(), filter);
        (snapshot, view)
    }

    pub fn list_indicators(&self, filter: &KpiFilter) -> Vec<KpiCard> {
        let (_, view) = self.filtered(filter);
        build_cards(&view)
    }

    pub fn summary(&self, filter: &KpiFilter) -> Summary {
        let (_, view) = self.filtered(filter);
        summary::summarize(&view)
    }

    /// Trends for an explicit period pair, or for the view's latest pair
    /// when none is given. A pair absent from the data yields an empty
    /// list, not an error.
    pub fn trends(
        &self,
        filter: &KpiFilter,
        pair: Option<(TimePeriod, TimePeriod)>,
    ) -> Vec<TrendResult> {
        let (_, view) = self.filtered(filter);
        match pair {
            Some((a, b)) => trend::trends(&view, &a, &b),
            None => trend::latest_trend(&view),
        }
    }

    pub fn alerts(&self, filter: &KpiFilter) -> Vec<Alert> {
        let (_, view) = self.filtered(filter);
        let trends = trend::latest_trend(&view);
        alert::alerts(&view, &trends, &self.config)
    }

    pub fn chart_data(&self, kind: ChartKind, filter: &KpiFilter) -> ChartData {
        let (_, view) = self.filtered(filter);
        match kind {
            ChartKind::DomainDistribution => domain_distribution(&view),
            ChartKind::TrendComparison => trend_comparison(&view),
        }
    }

    /// The composite bundle for one presentation round trip, all pieces
    /// computed against the same snapshot.
    pub fn dashboard_payload(&self, filter: &KpiFilter) -> DashboardPayload {
        let (snapshot, view) = self.filtered(filter);
        let trends = trend::latest_trend(&view);
        let alerts = alert::alerts(&view, &trends, &self.config);
        DashboardPayload {
            epoch: snapshot.epoch,
            refreshed_at: snapshot.refreshed_at,
            cards: build_cards(&view),
            summary: summary::summarize(&view),
            trends,
            alerts,
        }
    }
}

fn build_cards(view: &StoreView) -> Vec<KpiCard> {
    let periods = view.periods();
    let current = periods.last();
    let previous = periods.len().checked_sub(2).map(|i| &periods[i]);
    let trend_by_id: BTreeMap<String, TrendResult> = trend::latest_trend(view)
        .into_iter()
        .map(|t| (t.indicator_id.clone(), t))
        .collect();

    let mut cards = Vec::new();
    for id in view.indicator_ids() {
        let series = view.by_indicator(id);
        let Some(representative) = series.last() else {
            continue;
        };
        let current_record =
            current.and_then(|p| series.iter().find(|r| r.time_period == *p));
        let previous_record =
            previous.and_then(|p| series.iter().find(|r| r.time_period == *p));
        let current_value = current_record.and_then(|r| r.value);
        let previous_value = previous_record.and_then(|r| r.value);
        let target = current_record.and_then(|r| r.target);
        let target_operation = current_record
            .map(|r| r.target_operation)
            .unwrap_or_default();
        let progress_to_target = match (current_value, target) {
            (Some(value), Some(target)) if target != 0.0 => Some(value / target * 100.0),
            (Some(value), Some(_)) => Some(if value == 0.0 { 100.0 } else { 0.0 }),
            _ => None,
        };

        cards.push(KpiCard {
            id: id.to_string(),
            name: representative.indicator_name.clone(),
            domain: representative.domain.clone(),
            stewards: representative.stewards.clone(),
            measurement_type: representative.measurement_type.clone(),
            unit: representative.unit.clone(),
            tags: representative.tags.clone(),
            image: representative.image.clone(),
            definition: view.definition(id).map(|d| d.definition.clone()),
            current_period: current.cloned(),
            current_value,
            previous_value,
            trend: trend_by_id.get(id).cloned(),
            target,
            target_operation,
            progress_to_target,
        });
    }
    cards.sort_by(|a, b| {
        (a.domain.as_str(), a.name.as_str()).cmp(&(b.domain.as_str(), b.name.as_str()))
    });
    cards
}

fn domain_distribution(view: &StoreView) -> ChartData {
    let by_domain = summary::summarize(view).by_domain;
    ChartData {
        chart: "pie",
        labels: by_domain.keys().cloned().collect(),
        values: by_domain.values().map(|&count| count as f64).collect(),
    }
}

/// Current vs previous values for the first ten trended indicators,
/// current series first, matching the grouped-bar layout the dashboard
/// renders.
fn trend_comparison(view: &StoreView) -> ChartData {
    let trends = trend::latest_trend(view);
    let capped = &trends[..trends.len().min(10)];
    let labels = capped
        .iter()
        .map(|t| {
            let name = view
                .by_indicator(&t.indicator_id)
                .last()
                .map(|r| r.indicator_name.clone())
                .unwrap_or_else(|| t.indicator_id.clone());
            if name.chars().count() > 20 {
                name.chars().take(20).collect::<String>() + "..."
            } else {
                name
            }
        })
        .collect();
    let mut values: Vec<f64> = capped.iter().map(|t| t.value_b).collect();
    values.extend(capped.iter().map(|t| t.value_a));
    ChartData {
        chart: "grouped-bar",
        labels,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, &str)]) -> RawRow {
        cells
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn kpi_row(id: &str, period: &str, value: &str, target: &str) -> RawRow {
        row(&[
            ("ID", id),
            ("Time Period", period),
            ("Domain", "Community"),
            ("Indicator", &format!("Indicator {id}")),
            ("Type", "N"),
            ("Unit", "count"),
            ("Value", value),
            ("Target", target),
            ("Target Operation", "at-least"),
            ("Steward", "Standards Office"),
        ])
    }

    fn sample_rows() -> Vec<RawRow> {
        vec![
            kpi_row("K1", "2024-T4", "100", "120"),
            kpi_row("K1", "2025-T1", "90", "120"),
            kpi_row("K2", "2024-T4", "40", ""),
            kpi_row("K2", "2025-T1", "44", ""),
        ]
    }

    #[test]
    fn refresh_swaps_in_a_new_generation() {
        let dashboard = Dashboard::default();
        assert_eq!(dashboard.snapshot().epoch, 0);
        assert!(dashboard.snapshot().store.is_empty());

        let report = dashboard.refresh(&sample_rows(), &[]).expect("refresh");
        assert_eq!(report.epoch, 1);
        assert_eq!(report.records, 4);
        assert_eq!(report.indicators, 2);
        assert_eq!(dashboard.snapshot().epoch, 1);

        let report = dashboard.refresh(&sample_rows(), &[]).expect("refresh");
        assert_eq!(report.epoch, 2);
    }

    #[test]
    fn failed_refresh_keeps_previous_generation() {
        let dashboard = Dashboard::default();
        dashboard.refresh(&sample_rows(), &[]).expect("refresh");
        let before = dashboard.snapshot();

        let err = dashboard.refresh(&[], &[]).unwrap_err();
        assert_eq!(err, ConfigurationError::NoRows);

        let after = dashboard.snapshot();
        assert_eq!(after.epoch, before.epoch);
        assert_eq!(after.store.len(), before.store.len());
    }

    #[test]
    fn refreshing_identical_rows_is_idempotent() {
        let dashboard = Dashboard::default();
        dashboard.refresh(&sample_rows(), &[]).expect("refresh");
        let first = dashboard.snapshot();
        dashboard.refresh(&sample_rows(), &[]).expect("refresh");
        let second = dashboard.snapshot();
        assert_eq!(first.store.view().all(), second.store.view().all());
    }

    #[test]
    fn cards_join_definitions_and_compute_progress() {
        let dashboard = Dashboard::default();
        let definitions = vec![row(&[("ID", "K1"), ("Definition", "Members in good standing")])];
        dashboard
            .refresh(&sample_rows(), &definitions)
            .expect("refresh");

        let cards = dashboard.list_indicators(&KpiFilter::default());
        assert_eq!(cards.len(), 2);
        let k1 = cards.iter().find(|c| c.id == "K1").expect("K1 card");
        assert_eq!(
            k1.definition.as_deref(),
            Some("Members in good standing")
        );
        assert_eq!(k1.current_value, Some(90.0));
        assert_eq!(k1.previous_value, Some(100.0));
        assert_eq!(k1.progress_to_target, Some(75.0));
        assert!(k1.trend.is_some());

        let k2 = cards.iter().find(|c| c.id == "K2").expect("K2 card");
        assert_eq!(k2.target, None);
        assert_eq!(k2.progress_to_target, None);
    }

    #[test]
    fn trends_with_unknown_pair_are_empty() {
        let dashboard = Dashboard::default();
        dashboard.refresh(&sample_rows(), &[]).expect("refresh");
        let pair = Some((
            "2019-T1".parse().expect("valid period"),
            "2019-T2".parse().expect("valid period"),
        ));
        assert!(dashboard.trends(&KpiFilter::default(), pair).is_empty());
    }

    #[test]
    fn payload_pieces_share_one_generation() {
        let dashboard = Dashboard::default();
        dashboard.refresh(&sample_rows(), &[]).expect("refresh");

        let payload = dashboard.dashboard_payload(&KpiFilter::default());
        assert_eq!(payload.epoch, 1);
        assert_eq!(payload.cards.len(), 2);
        assert_eq!(payload.summary.total_indicators, 2);
        assert_eq!(payload.trends.len(), 2);
        // K1 misses its target in both periods and trends down 10%.
        assert_eq!(payload.alerts.len(), 3);
    }

    #[test]
    fn payload_respects_filters() {
        let dashboard = Dashboard::default();
        dashboard.refresh(&sample_rows(), &[]).expect("refresh");

        let filter = KpiFilter {
            indicator_substring: Some("k2".to_string()),
            ..Default::default()
        };
        let payload = dashboard.dashboard_payload(&filter);
        assert_eq!(payload.summary.total_indicators, 1);
        assert!(payload.alerts.is_empty());
    }

    #[test]
    fn chart_shapes_match_the_dashboard() {
        let dashboard = Dashboard::default();
        dashboard.refresh(&sample_rows(), &[]).expect("refresh");

        let pie = dashboard.chart_data(ChartKind::DomainDistribution, &KpiFilter::default());
        assert_eq!(pie.chart, "pie");
        assert_eq!(pie.labels, vec!["Community"]);
        assert_eq!(pie.values, vec![2.0]);

        let bars = dashboard.chart_data(ChartKind::TrendComparison, &KpiFilter::default());
        assert_eq!(bars.chart, "grouped-bar");
        assert_eq!(bars.labels.len(), 2);
        // Current values for both indicators, then previous values.
        assert_eq!(bars.values, vec![90.0, 44.0, 100.0, 40.0]);
    }
}
