use std::fmt::Write;

use crate::service::DashboardPayload;

/// Renders one dashboard payload as a markdown report for offline review.
pub fn build_report(scope: Option<&str>, payload: &DashboardPayload) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all indicators");

    let _ = writeln!(output, "# KPI Dashboard Report");
    match &payload.refreshed_at {
        Some(refreshed_at) => {
            let _ = writeln!(
                output,
                "Generated for {} (epoch {}, refreshed {})",
                scope_label,
                payload.epoch,
                refreshed_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
        None => {
            let _ = writeln!(output, "Generated for {} (no data loaded)", scope_label);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(
        output,
        "{} indicators across {} periods",
        payload.summary.total_indicators,
        payload.summary.periods.len()
    );
    for (domain, count) in payload.summary.by_domain.iter() {
        let _ = writeln!(output, "- {domain}: {count} indicators");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");
    if payload.alerts.is_empty() {
        let _ = writeln!(output, "No alerts for this view.");
    } else {
        let mut alerts = payload.alerts.clone();
        alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
        for alert in alerts.iter().take(10) {
            let mut line = format!(
                "- [{}] {} ({}, {}): {}, value {}",
                alert.severity,
                alert.indicator_name,
                alert.indicator_id,
                alert.time_period,
                alert.reason,
                alert.triggering_value
            );
            if let Some(target) = alert.target {
                let _ = write!(line, " vs target {target}");
            }
            let _ = writeln!(output, "{line}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Biggest Movers");
    let mut movers: Vec<_> = payload
        .trends
        .iter()
        .filter_map(|trend| trend.percent_change.map(|pc| (pc, trend)))
        .collect();
    movers.sort_by(|a, b| {
        b.0.abs()
            .partial_cmp(&a.0.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if movers.is_empty() {
        let _ = writeln!(output, "No period-over-period movement to report.");
    } else {
        for (percent_change, trend) in movers.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {:+.1}% (from {} in {} to {} in {})",
                trend.indicator_id,
                percent_change * 100.0,
                trend.value_a,
                trend.period_a,
                trend.value_b,
                trend.period_b
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Indicator Cards");
    if payload.cards.is_empty() {
        let _ = writeln!(output, "No indicators match this view.");
    } else {
        for card in payload.cards.iter() {
            let mut line = format!("- {} [{}]", card.name, card.domain);
            match card.current_value {
                Some(value) => {
                    let _ = write!(line, ": current {} {}", value, card.unit);
                }
                None => {
                    let _ = write!(line, ": no current observation");
                }
            }
            if let Some(progress) = card.progress_to_target {
                let _ = write!(line, ", {progress:.1}% of target");
            }
            let _ = writeln!(output, "{line}");
        }
    }

    output
}
