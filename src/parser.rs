use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{ConfigurationError, ParseWarning};
use crate::models::{
    IndicatorDefinition, KpiRecord, MeasurementType, TargetOperation, TimePeriod,
};
use crate::store::Store;

/// An untyped source row: column name to raw cell text. Produced by the
/// loader collaborator; the parser never reads files itself.
pub type RawRow = BTreeMap<String, String>;

// Accepted column spellings: the raw CSV export uses title case, JSON
// sources use snake_case.
const ID: &[&str] = &["ID", "id"];
const TIME_PERIOD: &[&str] = &["Time Period", "time_period"];
const DOMAIN: &[&str] = &["Domain", "domain"];
const INDICATOR: &[&str] = &["Indicator", "indicator_name", "indicator"];
const TYPE: &[&str] = &["Type", "measurement_type", "type"];
const UNIT: &[&str] = &["Unit", "unit"];
const VALUE: &[&str] = &["Value", "value"];
const NOTES: &[&str] = &["Notes", "notes"];
const STEWARD: &[&str] = &["Steward", "stewards", "steward"];
const TARGET: &[&str] = &["Target", "target"];
const TARGET_TYPE: &[&str] = &["Target Type", "target_type"];
const TARGET_OPERATION: &[&str] = &["Target Operation", "target_operation"];
const TAGS: &[&str] = &["Tags", "tags"];
const IMAGE: &[&str] = &["Image", "image"];
const TREND_DIRECTION: &[&str] = &["Trend Direction", "trend_direction"];

const KNOWN_COLUMNS: &[&[&str]] = &[
    ID,
    TIME_PERIOD,
    DOMAIN,
    INDICATOR,
    TYPE,
    UNIT,
    VALUE,
    NOTES,
    STEWARD,
    TARGET,
    TARGET_TYPE,
    TARGET_OPERATION,
    TAGS,
    IMAGE,
    TREND_DIRECTION,
];

const DEFINITION: &[&str] = &["Definition", "definition"];

/// Builds one store generation from raw KPI rows and indicator definition
/// rows. Row-level problems become warnings and the offending cell or row
/// is skipped; only structural problems (no rows, mandatory columns absent
/// everywhere) abort the whole parse.
pub fn parse(
    kpi_rows: &[RawRow],
    definition_rows: &[RawRow],
) -> Result<(Store, Vec<ParseWarning>), ConfigurationError> {
    if kpi_rows.is_empty() {
        return Err(ConfigurationError::NoRows);
    }

    let mut missing = Vec::new();
    for (name, aliases) in [
        ("id", ID),
        ("time_period", TIME_PERIOD),
        ("indicator_name", INDICATOR),
    ] {
        let present = kpi_rows
            .iter()
            .any(|row| aliases.iter().any(|alias| row.contains_key(*alias)));
        if !present {
            missing.push(name.to_string());
        }
    }
    if !missing.is_empty() {
        return Err(ConfigurationError::MissingColumns { columns: missing });
    }

    let mut warnings = Vec::new();
    let mut records: BTreeMap<(String, TimePeriod), KpiRecord> = BTreeMap::new();

    for (index, row) in kpi_rows.iter().enumerate() {
        let line = index + 1;
        let Some(record) = parse_record(row, line, &mut warnings) else {
            continue;
        };
        let key = (record.id.clone(), record.time_period.clone());
        if records.insert(key.clone(), record).is_some() {
            warnings.push(ParseWarning::DuplicateKey {
                row: line,
                id: key.0,
                period: key.1.label().to_string(),
            });
        }
    }

    let definitions = parse_definitions(definition_rows, &mut warnings);
    Ok((
        Store::new(records.into_values().collect(), definitions),
        warnings,
    ))
}

fn parse_record(row: &RawRow, line: usize, warnings: &mut Vec<ParseWarning>) -> Option<KpiRecord> {
    let id = match field(row, ID) {
        Some(id) => id.to_string(),
        None => {
            warnings.push(ParseWarning::MissingField {
                row: line,
                field: "id",
            });
            return None;
        }
    };
    let indicator_name = match field(row, INDICATOR) {
        Some(name) => name.to_string(),
        None => {
            warnings.push(ParseWarning::MissingField {
                row: line,
                field: "indicator_name",
            });
            return None;
        }
    };
    let time_period: TimePeriod = match field(row, TIME_PERIOD) {
        Some(raw) => match raw.parse() {
            Ok(period) => period,
            Err(_) => {
                warnings.push(ParseWarning::InvalidPeriod {
                    row: line,
                    raw: raw.to_string(),
                });
                return None;
            }
        },
        None => {
            warnings.push(ParseWarning::MissingField {
                row: line,
                field: "time_period",
            });
            return None;
        }
    };

    let value = match field(row, VALUE) {
        None => None,
        Some(raw) => match parse_number(raw) {
            Some(value) => Some(value),
            None => {
                warnings.push(ParseWarning::InvalidValue {
                    row: line,
                    id: id.clone(),
                    raw: raw.to_string(),
                });
                None
            }
        },
    };
    let target = match field(row, TARGET) {
        None => None,
        Some(raw) => match parse_number(raw) {
            Some(target) => Some(target),
            None => {
                warnings.push(ParseWarning::InvalidTarget {
                    row: line,
                    id: id.clone(),
                    raw: raw.to_string(),
                });
                None
            }
        },
    };

    let mut tags: BTreeSet<String> = field(row, TAGS)
        .map(split_list)
        .unwrap_or_default()
        .into_iter()
        .collect();
    // The source may flag inverted indicators in a dedicated column; fold
    // that into the tag set so downstream rules have one place to look.
    if field(row, TREND_DIRECTION).is_some_and(|d| d.eq_ignore_ascii_case("lower")) {
        tags.insert("lower-is-better".to_string());
    }

    let extra: BTreeMap<String, String> = row
        .iter()
        .filter(|(key, _)| {
            !KNOWN_COLUMNS
                .iter()
                .any(|aliases| aliases.contains(&key.as_str()))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Some(KpiRecord {
        id,
        time_period,
        domain: field(row, DOMAIN).unwrap_or_default().to_string(),
        indicator_name,
        measurement_type: MeasurementType::from_token(field(row, TYPE).unwrap_or_default()),
        unit: field(row, UNIT).unwrap_or_default().to_string(),
        value,
        notes: field(row, NOTES).map(str::to_string),
        stewards: field(row, STEWARD).map(split_list).unwrap_or_default(),
        target,
        target_type: field(row, TARGET_TYPE).map(str::to_string),
        target_operation: field(row, TARGET_OPERATION)
            .and_then(TargetOperation::from_token)
            .unwrap_or_default(),
        tags,
        image: field(row, IMAGE).map(str::to_string),
        extra,
    })
}

fn parse_definitions(
    rows: &[RawRow],
    warnings: &mut Vec<ParseWarning>,
) -> BTreeMap<String, IndicatorDefinition> {
    let mut definitions = BTreeMap::new();
    for (index, row) in rows.iter().enumerate() {
        let Some(id) = field(row, ID) else {
            warnings.push(ParseWarning::MissingField {
                row: index + 1,
                field: "definition id",
            });
            continue;
        };
        let definition = field(row, DEFINITION).unwrap_or_default().to_string();
        definitions.insert(
            id.to_string(),
            IndicatorDefinition {
                id: id.to_string(),
                definition,
            },
        );
    }
    definitions
}

/// First non-empty cell among the accepted spellings for a column.
fn field<'a>(row: &'a RawRow, aliases: &[&str]) -> Option<&'a str> {
    aliases.iter().find_map(|alias| {
        row.get(*alias)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    })
}

/// Numeric coercion; a trailing `%` is cosmetic in the source and dropped.
fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').trim().parse().ok()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
