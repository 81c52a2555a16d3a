use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kpi_dashboard::alert::AlertConfig;
use kpi_dashboard::filter::KpiFilter;
use kpi_dashboard::models::TimePeriod;
use kpi_dashboard::service::{ChartKind, Dashboard};
use kpi_dashboard::{loader, report};

#[derive(Parser)]
#[command(name = "kpi-dashboard")]
#[command(about = "KPI trend and alert pipeline for the indicator dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// CSV or JSON file of raw KPI rows
    #[arg(long)]
    kpis: PathBuf,
    /// Optional CSV or JSON file of indicator definitions
    #[arg(long)]
    definitions: Option<PathBuf>,
}

#[derive(Args)]
struct FilterArgs {
    /// Restrict to one time period, e.g. 2025-T1
    #[arg(long)]
    period: Option<String>,
    #[arg(long)]
    domain: Option<String>,
    #[arg(long)]
    steward: Option<String>,
    /// Case-insensitive substring of the indicator name
    #[arg(long)]
    indicator: Option<String>,
    #[arg(long)]
    tag: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> anyhow::Result<KpiFilter> {
        let time_period = match &self.period {
            Some(raw) => Some(
                raw.parse()
                    .with_context(|| format!("invalid --period {raw}"))?,
            ),
            None => None,
        };
        Ok(KpiFilter {
            time_period,
            domain: self.domain.clone(),
            steward: self.steward.clone(),
            indicator_substring: self.indicator.clone(),
            tag: self.tag.clone(),
        })
    }

    fn scope_label(&self) -> Option<&str> {
        self.steward
            .as_deref()
            .or(self.domain.as_deref())
            .or(self.indicator.as_deref())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the sources and report ingest warnings
    Check {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// List indicator cards with current values and target progress
    Cards {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        json: bool,
    },
    /// Summary statistics for the filtered view
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        json: bool,
    },
    /// Period-over-period trends
    Trends {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filter: FilterArgs,
        /// Base period of an explicit pair; defaults to the latest pair
        #[arg(long, requires = "to")]
        from: Option<String>,
        #[arg(long, requires = "from")]
        to: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Target-breach and adverse-trend alerts
    Alerts {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filter: FilterArgs,
        /// Minimum percent-change magnitude (fraction) for trend alerts
        #[arg(long, default_value_t = 0.05)]
        trend_threshold: f64,
        #[arg(long)]
        json: bool,
    },
    /// Chart data for the presentation layer
    Chart {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filter: FilterArgs,
        /// domain-distribution or trend-comparison
        #[arg(long)]
        kind: String,
    },
    /// Write a markdown dashboard report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { source } => {
            let dashboard = load_dashboard(&source, AlertConfig::default())?;
            let snapshot = dashboard.snapshot();
            println!(
                "Parsed {} records across {} indicators.",
                snapshot.store.len(),
                snapshot.store.view().indicator_ids().len()
            );
        }
        Commands::Cards {
            source,
            filter,
            json,
        } => {
            let dashboard = load_dashboard(&source, AlertConfig::default())?;
            let cards = dashboard.list_indicators(&filter.to_filter()?);
            if json {
                println!("{}", serde_json::to_string_pretty(&cards)?);
                return Ok(());
            }
            if cards.is_empty() {
                println!("No indicators match this view.");
                return Ok(());
            }
            for card in cards.iter() {
                let current = match card.current_value {
                    Some(value) => format!("current {} {}", value, card.unit),
                    None => "no current observation".to_string(),
                };
                let progress = match card.progress_to_target {
                    Some(progress) => format!(", {progress:.1}% of target"),
                    None => String::new(),
                };
                println!(
                    "- {} ({}, {}) {}{}",
                    card.name, card.id, card.domain, current, progress
                );
            }
        }
        Commands::Summary {
            source,
            filter,
            json,
        } => {
            let dashboard = load_dashboard(&source, AlertConfig::default())?;
            let summary = dashboard.summary(&filter.to_filter()?);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }
            println!(
                "{} indicators across {} periods.",
                summary.total_indicators,
                summary.periods.len()
            );
            for (domain, count) in summary.by_domain.iter() {
                println!("- {domain}: {count} indicators");
            }
            for (steward, count) in summary.by_steward.iter() {
                println!("- steward {steward}: {count} indicators");
            }
        }
        Commands::Trends {
            source,
            filter,
            from,
            to,
            json,
        } => {
            let dashboard = load_dashboard(&source, AlertConfig::default())?;
            let pair = match (from, to) {
                (Some(from), Some(to)) => Some((parse_period(&from)?, parse_period(&to)?)),
                _ => None,
            };
            let trends = dashboard.trends(&filter.to_filter()?, pair);
            if json {
                println!("{}", serde_json::to_string_pretty(&trends)?);
                return Ok(());
            }
            if trends.is_empty() {
                println!("No paired observations for this view.");
                return Ok(());
            }
            for trend in trends.iter() {
                let change = match trend.percent_change {
                    Some(pc) => format!("{:+.1}%", pc * 100.0),
                    None => "change undefined (zero base)".to_string(),
                };
                println!(
                    "- {}: {} (from {} in {} to {} in {})",
                    trend.indicator_id,
                    change,
                    trend.value_a,
                    trend.period_a,
                    trend.value_b,
                    trend.period_b
                );
            }
        }
        Commands::Alerts {
            source,
            filter,
            trend_threshold,
            json,
        } => {
            let config = AlertConfig {
                trend_threshold,
                ..Default::default()
            };
            let dashboard = load_dashboard(&source, config)?;
            let alerts = dashboard.alerts(&filter.to_filter()?);
            if json {
                println!("{}", serde_json::to_string_pretty(&alerts)?);
                return Ok(());
            }
            if alerts.is_empty() {
                println!("No alerts for this view.");
                return Ok(());
            }
            for alert in alerts.iter() {
                println!(
                    "- [{}] {} ({}, {}): {}, value {}",
                    alert.severity,
                    alert.indicator_name,
                    alert.indicator_id,
                    alert.time_period,
                    alert.reason,
                    alert.triggering_value
                );
            }
        }
        Commands::Chart {
            source,
            filter,
            kind,
        } => {
            let dashboard = load_dashboard(&source, AlertConfig::default())?;
            let chart = dashboard.chart_data(parse_chart_kind(&kind)?, &filter.to_filter()?);
            println!("{}", serde_json::to_string_pretty(&chart)?);
        }
        Commands::Report {
            source,
            filter,
            out,
        } => {
            let dashboard = load_dashboard(&source, AlertConfig::default())?;
            let payload = dashboard.dashboard_payload(&filter.to_filter()?);
            let rendered = report::build_report(filter.scope_label(), &payload);
            std::fs::write(&out, rendered)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn load_dashboard(source: &SourceArgs, config: AlertConfig) -> anyhow::Result<Dashboard> {
    let kpi_rows = loader::load_rows(&source.kpis)?;
    let definition_rows = match &source.definitions {
        Some(path) => loader::load_rows(path)?,
        None => Vec::new(),
    };
    let dashboard = Dashboard::new(config);
    let report = dashboard
        .refresh(&kpi_rows, &definition_rows)
        .context("refresh failed")?;
    if !report.warnings.is_empty() {
        eprintln!("{} ingest warnings:", report.warnings.len());
        for warning in &report.warnings {
            eprintln!("- {warning}");
        }
    }
    Ok(dashboard)
}

fn parse_period(raw: &str) -> anyhow::Result<TimePeriod> {
    raw.parse()
        .with_context(|| format!("invalid time period {raw}"))
}

fn parse_chart_kind(raw: &str) -> anyhow::Result<ChartKind> {
    match raw {
        "domain-distribution" => Ok(ChartKind::DomainDistribution),
        "trend-comparison" => Ok(ChartKind::TrendComparison),
        other => anyhow::bail!("unknown chart kind `{other}`"),
    }
}
