use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{Alert, AlertReason, Direction, KpiRecord, Severity, TargetOperation, TrendResult};
use crate::store::StoreView;

/// One row of the breach-severity table: deviations strictly above
/// `min_deviation` take `severity`. Rows are evaluated in order; keep them
/// sorted from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityRule {
    pub min_deviation: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Minimum percent-change magnitude (as a fraction) for a trend to
    /// raise an alert.
    pub trend_threshold: f64,
    /// Tags marking indicators where falling values are good and rising
    /// values are adverse. Matched case-insensitively against record tags.
    pub lower_is_better_tags: BTreeSet<String>,
    pub severity_rules: Vec<SeverityRule>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            trend_threshold: 0.05,
            lower_is_better_tags: BTreeSet::from(["lower-is-better".to_string()]),
            severity_rules: vec![
                SeverityRule {
                    min_deviation: 0.20,
                    severity: Severity::Critical,
                },
                SeverityRule {
                    min_deviation: 0.0,
                    severity: Severity::Warning,
                },
            ],
        }
    }
}

impl AlertConfig {
    fn severity_for(&self, deviation: f64) -> Severity {
        self.severity_rules
            .iter()
            .find(|rule| deviation > rule.min_deviation)
            .map(|rule| rule.severity)
            .unwrap_or(Severity::Warning)
    }

    fn is_lower_better(&self, record: &KpiRecord) -> bool {
        record.tags.iter().any(|tag| {
            self.lower_is_better_tags
                .iter()
                .any(|marker| marker.eq_ignore_ascii_case(tag))
        })
    }
}

/// Evaluates both alert rule families over a view: target breaches from
/// per-record targets, then adverse trends from the supplied trend results.
pub fn alerts(view: &StoreView, trends: &[TrendResult], config: &AlertConfig) -> Vec<Alert> {
    let mut out = Vec::new();

    for record in view.all() {
        let (Some(value), Some(target)) = (record.value, record.target) else {
            continue;
        };
        let violated = match record.target_operation {
            TargetOperation::AtLeast => value < target,
            TargetOperation::AtMost => value > target,
            TargetOperation::Equal => value != target,
        };
        if !violated {
            continue;
        }
        // A zero target leaves no scale to measure the miss against; any
        // violation of it is maximally off.
        let deviation = if target == 0.0 {
            f64::INFINITY
        } else {
            ((value - target) / target).abs()
        };
        out.push(Alert {
            indicator_id: record.id.clone(),
            indicator_name: record.indicator_name.clone(),
            time_period: record.time_period.clone(),
            severity: config.severity_for(deviation),
            reason: AlertReason::TargetBreach {
                operation: record.target_operation,
            },
            triggering_value: value,
            target: Some(target),
        });
    }

    for trend in trends {
        let Some(percent_change) = trend.percent_change else {
            continue;
        };
        if percent_change.abs() < config.trend_threshold {
            continue;
        }
        let series = view.by_indicator(&trend.indicator_id);
        let Some(record) = series.last() else {
            continue;
        };
        let adverse = match trend.direction {
            Direction::Down => !config.is_lower_better(record),
            Direction::Up => config.is_lower_better(record),
            Direction::Flat => false,
        };
        if !adverse {
            continue;
        }
        out.push(Alert {
            indicator_id: trend.indicator_id.clone(),
            indicator_name: record.indicator_name.clone(),
            time_period: trend.period_b.clone(),
            severity: Severity::Warning,
            reason: AlertReason::AdverseTrend {
                percent_change,
                direction: trend.direction,
            },
            triggering_value: trend.value_b,
            target: None,
        });
    }

    out
}

/// Worst-case status across a batch of alerts.
pub fn max_severity(alerts: &[Alert]) -> Option<Severity> {
    alerts.iter().map(|alert| alert.severity).max()
}
