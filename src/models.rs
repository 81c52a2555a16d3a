use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A discrete reporting interval: a year, optionally refined by a coded
/// sub-period such as `2025-T1` or `2024-Q4`. Ordering is chronological,
/// never lexical, so `2025-T2` sorts before `2025-T10`.
#[derive(Debug, Clone)]
pub struct TimePeriod {
    label: String,
    year: i32,
    sub: Option<SubPeriod>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct SubPeriod {
    index: u32,
    code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized time period `{0}`")]
pub struct PeriodParseError(pub String);

impl TimePeriod {
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl FromStr for TimePeriod {
    type Err = PeriodParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let invalid = || PeriodParseError(input.to_string());

        let (year_part, sub_part) = match trimmed.split_once('-') {
            Some((year, rest)) => (year, Some(rest)),
            None => (trimmed, None),
        };
        let year: i32 = year_part.trim().parse().map_err(|_| invalid())?;

        let sub = match sub_part {
            None => None,
            Some(rest) => {
                let rest = rest.trim();
                let digits_at = rest
                    .find(|c: char| c.is_ascii_digit())
                    .ok_or_else(invalid)?;
                let (code, digits) = rest.split_at(digits_at);
                if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(invalid());
                }
                let index: u32 = digits.parse().map_err(|_| invalid())?;
                Some(SubPeriod {
                    index,
                    code: code.to_ascii_uppercase(),
                })
            }
        };

        let label = match &sub {
            Some(sub) => format!("{year}-{}{}", sub.code, sub.index),
            None => year.to_string(),
        };
        Ok(TimePeriod { label, year, sub })
    }
}

// Identity lives in (year, sub); the label is display-only.
impl PartialEq for TimePeriod {
    fn eq(&self, other: &Self) -> bool {
        self.year == other.year && self.sub == other.sub
    }
}

impl Eq for TimePeriod {}

impl Hash for TimePeriod {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.year.hash(state);
        self.sub.hash(state);
    }
}

impl Ord for TimePeriod {
    fn cmp(&self, other: &Self) -> Ordering {
        // A bare year precedes its own sub-periods.
        self.year
            .cmp(&other.year)
            .then_with(|| match (&self.sub, &other.sub) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for TimePeriod {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl Serialize for TimePeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label)
    }
}

impl<'de> Deserialize<'de> for TimePeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    Count,
    Percentage,
    Other(String),
}

impl MeasurementType {
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "N" | "n" | "count" | "Count" => MeasurementType::Count,
            "%" | "percentage" | "Percentage" => MeasurementType::Percentage,
            other => MeasurementType::Other(other.to_string()),
        }
    }
}

/// How a record's value is compared against its target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetOperation {
    #[default]
    AtLeast,
    AtMost,
    Equal,
}

impl TargetOperation {
    pub fn from_token(token: &str) -> Option<Self> {
        let normalized = token.trim().to_ascii_lowercase().replace([' ', '_'], "-");
        match normalized.as_str() {
            "at-least" | "minimum" | "min" => Some(TargetOperation::AtLeast),
            "at-most" | "maximum" | "max" => Some(TargetOperation::AtMost),
            "equal" | "exact" => Some(TargetOperation::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for TargetOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TargetOperation::AtLeast => "at-least",
            TargetOperation::AtMost => "at-most",
            TargetOperation::Equal => "equal",
        };
        f.write_str(text)
    }
}

/// One KPI observation for one time period. `value: None` means no
/// observation was reported, which is not the same as a reported zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiRecord {
    pub id: String,
    pub time_period: TimePeriod,
    pub domain: String,
    pub indicator_name: String,
    pub measurement_type: MeasurementType,
    pub unit: String,
    pub value: Option<f64>,
    pub notes: Option<String>,
    /// Owning organizations, primary steward first.
    pub stewards: Vec<String>,
    pub target: Option<f64>,
    /// Source scope token for the target (`period`, `annual`), kept opaque.
    pub target_type: Option<String>,
    pub target_operation: TargetOperation,
    pub tags: BTreeSet<String>,
    /// Opaque asset filename; resolution belongs to the static-file layer.
    pub image: Option<String>,
    /// Columns the parser did not recognize, preserved verbatim.
    pub extra: BTreeMap<String, String>,
}

impl KpiRecord {
    pub fn primary_steward(&self) -> Option<&str> {
        self.stewards.first().map(String::as_str)
    }
}

/// Static indicator metadata, joined to records by indicator id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorDefinition {
    pub id: String,
    pub definition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    /// Exact comparison against zero; no epsilon, so float noise counts.
    pub fn from_delta(delta: f64) -> Self {
        if delta > 0.0 {
            Direction::Up
        } else if delta < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        }
    }
}

/// Comparison of one indicator between two periods, both observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub indicator_id: String,
    pub period_a: TimePeriod,
    pub period_b: TimePeriod,
    pub value_a: f64,
    pub value_b: f64,
    pub delta: f64,
    /// `delta / value_a`; `None` when the base value is zero.
    pub percent_change: Option<f64>,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AlertReason {
    TargetBreach { operation: TargetOperation },
    AdverseTrend { percent_change: f64, direction: Direction },
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertReason::TargetBreach { operation } => {
                write!(f, "target breach ({operation})")
            }
            AlertReason::AdverseTrend { percent_change, .. } => {
                write!(f, "adverse trend ({:+.1}%)", percent_change * 100.0)
            }
        }
    }
}

/// A derived signal; recomputed on every request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub indicator_id: String,
    pub indicator_name: String,
    pub time_period: TimePeriod,
    pub severity: Severity,
    pub reason: AlertReason,
    pub triggering_value: f64,
    pub target: Option<f64>,
}
