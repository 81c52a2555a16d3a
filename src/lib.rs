//! KPI dashboard core: parses flat tabular KPI exports into an immutable
//! in-memory store, derives period-over-period trends and threshold/trend
//! alerts, and serves filtered, aggregated views to a presentation layer.

pub mod alert;
pub mod errors;
pub mod filter;
pub mod loader;
pub mod models;
pub mod parser;
pub mod report;
pub mod service;
pub mod store;
pub mod summary;
pub mod trend;

pub use alert::{alerts, max_severity, AlertConfig, SeverityRule};
pub use errors::{ConfigurationError, ParseWarning};
pub use filter::KpiFilter;
pub use models::{
    Alert, AlertReason, Direction, IndicatorDefinition, KpiRecord, MeasurementType, Severity,
    TargetOperation, TimePeriod, TrendResult,
};
pub use parser::{parse, RawRow};
pub use service::{
    ChartData, ChartKind, Dashboard, DashboardPayload, KpiCard, RefreshReport, Snapshot,
};
pub use store::{Store, StoreView};
pub use summary::{summarize, Summary};
pub use trend::{latest_trend, trends};
