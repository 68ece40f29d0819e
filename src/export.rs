//! JSON and CSV renderings of a finished pass.
//!
//! Both are pure functions of the result list: the same results always give
//! the same bytes. A timestamp only ever appears in the artifact file name.

use crate::batch::BatchResult;
use crate::constants::{CSV_HEADER, EXPORT_FILE_PREFIX};
use crate::error::Result;
use crate::settings::{CaptionStyle, Captions};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
    Both,
}

impl ExportFormat {
    fn includes_json(&self) -> bool {
        matches!(self, ExportFormat::Json | ExportFormat::Both)
    }

    fn includes_csv(&self) -> bool {
        matches!(self, ExportFormat::Csv | ExportFormat::Both)
    }
}

#[derive(Serialize)]
struct ExportRecord<'a> {
    filename: &'a str,
    #[serde(flatten)]
    captions: Option<&'a Captions>,
}

/// Pretty-printed array of `{filename, short?, detailed?, alt?, creative?}`.
pub fn to_json(results: &[BatchResult]) -> Result<Vec<u8>> {
    let records: Vec<ExportRecord<'_>> = results
        .iter()
        .map(|result| ExportRecord {
            filename: &result.source_name,
            captions: result.captions(),
        })
        .collect();

    Ok(serde_json::to_vec_pretty(&records)?)
}

/// Header `filename,short,detailed,alt,creative`, every field quoted,
/// rows joined with `\n`.
pub fn to_csv(results: &[BatchResult]) -> Vec<u8> {
    let mut lines = Vec::with_capacity(results.len() + 1);
    lines.push(csv_row(CSV_HEADER.iter().copied()));

    for result in results {
        let captions = result.captions();
        let caption = |style: CaptionStyle| captions.and_then(|c| c.get(style)).unwrap_or("");
        lines.push(csv_row(
            std::iter::once(result.source_name.as_str())
                .chain(CaptionStyle::ALL.into_iter().map(caption)),
        ));
    }

    lines.join("\n").into_bytes()
}

fn csv_row<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    fields.map(quote_csv_field).collect::<Vec<_>>().join(",")
}

/// Wraps a field in double quotes, doubling any quote inside it.
pub fn quote_csv_field(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// `BATCH_EXPORT_<millis>.<ext>`
pub fn artifact_name(extension: &str, timestamp_millis: i64) -> String {
    format!("{}{}.{}", EXPORT_FILE_PREFIX, timestamp_millis, extension)
}

/// Writes the requested artifacts into `dir` and returns their paths.
pub fn write_exports(
    results: &[BatchResult],
    dir: &Path,
    format: ExportFormat,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let timestamp = chrono::Utc::now().timestamp_millis();
    let mut written = Vec::new();

    if format.includes_json() {
        let path = dir.join(artifact_name("json", timestamp));
        fs::write(&path, to_json(results)?)?;
        written.push(path);
    }
    if format.includes_csv() {
        let path = dir.join(artifact_name("csv", timestamp));
        fs::write(&path, to_csv(results))?;
        written.push(path);
    }

    Ok(written)
}
