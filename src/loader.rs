use std::fs::File;
use std::path::Path;

use anyhow::Context;

use crate::parser::RawRow;

/// Reads a tabular source file into the untyped rows the core consumes.
/// Dispatches on extension: `.json` expects an array of flat objects,
/// anything else is read as headered CSV.
pub fn load_rows(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => read_json_rows(path),
        _ => read_csv_rows(path),
    }
}

pub fn read_csv_rows(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read headers from {}", path.display()))?
        .clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.with_context(|| format!("malformed CSV in {}", path.display()))?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.to_string(), cell.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

pub fn read_json_rows(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let objects: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_reader(file)
            .with_context(|| format!("{} is not an array of flat objects", path.display()))?;

    Ok(objects
        .into_iter()
        .map(|object| {
            object
                .into_iter()
                .map(|(key, value)| {
                    let text = match value {
                        serde_json::Value::String(text) => text,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (key, text)
                })
                .collect()
        })
        .collect())
}
