use serde::Serialize;
use thiserror::Error;

/// Row-level ingest issue. Warnings are collected and returned next to a
/// best-effort store; they never abort a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ParseWarning {
    #[error("row {row}: missing mandatory field `{field}`, row skipped")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: unrecognized time period `{raw}`, row skipped")]
    InvalidPeriod { row: usize, raw: String },
    #[error("row {row}: unparsable value `{raw}` for `{id}`, treated as absent")]
    InvalidValue { row: usize, id: String, raw: String },
    #[error("row {row}: unparsable target `{raw}` for `{id}`, target ignored")]
    InvalidTarget { row: usize, id: String, raw: String },
    #[error("row {row}: duplicate record for `{id}` in {period}, later row wins")]
    DuplicateKey {
        row: usize,
        id: String,
        period: String,
    },
}

/// Structural ingest failure. A refresh that returns one of these is
/// aborted and the previous store generation stays in place.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ConfigurationError {
    #[error("no KPI rows supplied")]
    NoRows,
    #[error("mandatory columns missing from every row: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },
}
