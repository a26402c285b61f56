//! Output rendering
//!
//! Renderers build the full text and leave writing to the caller, so stdout
//! and stderr routing stays in one place.

use serde::Serialize;
use std::collections::BTreeMap;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::batch::BatchResult;
use crate::client::{BlobRef, RecordEntry};
use crate::error::Result;
use crate::uri::rkey_of;
use crate::value::{Fields, RecordValue};

const RKEY_WIDTH: usize = 13;
const TEXT_WIDTH: usize = 50;
const FIELD_WIDTH: usize = 20;
const MAX_LISTED_FAILURES: usize = 10;
const HIDDEN_FIELDS: &[&str] = &["$type"];
const ROW_PREFIX_KEYS: &[&str] = &["rkey", "uri", "cid"];

/// Output format for records
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
    Compact,
}

impl OutputFormat {
    /// Machine-readable formats keep stdout parseable
    pub fn is_structured(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Yaml)
    }
}

#[derive(Serialize)]
struct RecordRow<'a> {
    rkey: &'a str,
    uri: &'a str,
    cid: Option<&'a str>,
    #[serde(flatten)]
    fields: BTreeMap<&'a str, &'a RecordValue>,
}

impl<'a> RecordRow<'a> {
    fn new(entry: &'a RecordEntry, fields: &'a Fields) -> Self {
        Self {
            rkey: rkey_of(&entry.uri),
            uri: &entry.uri,
            cid: entry.cid.as_deref(),
            fields: fields
                .iter()
                .filter(|(k, _)| !ROW_PREFIX_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.as_str(), v))
                .collect(),
        }
    }
}

/// Render a page of records from `collection`
pub fn render_records(
    collection: &str,
    records: &[RecordEntry],
    format: OutputFormat,
) -> Result<String> {
    if records.is_empty() {
        return Ok(match format {
            OutputFormat::Json => String::new(),
            _ => format!("no records in {collection}"),
        });
    }

    let fields: Vec<Fields> = records.iter().map(RecordEntry::fields).collect();
    match format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let rows: Vec<RecordRow<'_>> = records
                .iter()
                .zip(&fields)
                .map(|(entry, fields)| RecordRow::new(entry, fields))
                .collect();
            structured(&rows, format)
        }
        OutputFormat::Compact => {
            let mut out = header(collection, records.len());
            for (entry, fields) in records.iter().zip(&fields) {
                out.push('\n');
                out.push_str(&compact_line(entry, fields)?);
            }
            Ok(out)
        }
        OutputFormat::Table => Ok(records_table(collection, records, &fields)),
    }
}

/// Render a single record
pub fn render_record(entry: &RecordEntry, format: OutputFormat) -> Result<String> {
    let fields = entry.fields();
    match format {
        OutputFormat::Json | OutputFormat::Yaml => {
            structured(&RecordRow::new(entry, &fields), format)
        }
        OutputFormat::Compact => compact_line(entry, &fields),
        OutputFormat::Table => {
            let mut rows: Vec<(&str, String)> = vec![
                ("uri", entry.uri.clone()),
                ("cid", entry.cid.clone().unwrap_or_default()),
            ];
            rows.extend(
                fields
                    .iter()
                    .filter(|(k, _)| !HIDDEN_FIELDS.contains(&k.as_str()))
                    .map(|(k, v)| (k.as_str(), v.to_display())),
            );

            let key_width = rows.iter().map(|(k, _)| k.width()).max().unwrap_or(0);
            let lines: Vec<String> = rows
                .iter()
                .map(|(k, v)| format!("{}  {v}", pad(k, key_width)))
                .collect();
            Ok(lines.join("\n"))
        }
    }
}

/// Line announcing the next page cursor
pub fn cursor_line(cursor: &str) -> String {
    format!("\nnext page cursor: {cursor}")
}

/// Confirmation for a single write
pub fn render_success(operation: &str, uri: Option<&str>, cid: Option<&str>) -> String {
    let mut out = format!("✓ {operation}");
    if let Some(uri) = uri.filter(|u| !u.is_empty()) {
        out.push_str(&format!("\n\nuri: {uri}"));
    }
    if let Some(cid) = cid.filter(|c| !c.is_empty()) {
        out.push_str(&format!("\ncid: {cid}"));
    }
    out
}

/// Summary of a batch: success rate, then the first few failures
pub fn render_batch_result(result: &BatchResult, operation: &str) -> String {
    let mut lines = Vec::new();

    if !result.successful.is_empty() {
        lines.push(format!(
            "✓ successfully {operation} {}/{} records ({:.0}%)",
            result.successful.len(),
            result.total(),
            result.success_rate()
        ));
    }

    if !result.failed.is_empty() {
        lines.push(format!("\n✗ {} operations failed:", result.failed.len()));
        for (id, error) in result.failed.iter().take(MAX_LISTED_FAILURES) {
            let message = error.to_string();
            let first_line = message.lines().next().unwrap_or_default();
            lines.push(format!("  {}: {first_line}", rkey_of(id)));
        }
        if result.failed.len() > MAX_LISTED_FAILURES {
            lines.push(format!(
                "  ... and {} more",
                result.failed.len() - MAX_LISTED_FAILURES
            ));
        }
    }

    lines.join("\n")
}

/// Blob reference as pretty JSON, ready to paste into a record
pub fn render_blob(blob: &BlobRef) -> Result<String> {
    Ok(serde_json::to_string_pretty(blob)?)
}

fn structured<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?.trim_end().to_string()),
        _ => Ok(serde_json::to_string_pretty(value)?),
    }
}

fn compact_line(entry: &RecordEntry, fields: &Fields) -> Result<String> {
    Ok(format!(
        "{}: {}",
        rkey_of(&entry.uri),
        serde_json::to_string(fields)?
    ))
}

fn header(collection: &str, count: usize) -> String {
    let noun = if count == 1 { "record" } else { "records" };
    format!("{collection} ({count} {noun})")
}

fn records_table(collection: &str, records: &[RecordEntry], fields: &[Fields]) -> String {
    // Columns come from the first record's scalar fields
    let columns: Vec<(&str, usize)> = fields
        .first()
        .map(|first| {
            first
                .iter()
                .filter(|(k, v)| v.is_scalar() && !HIDDEN_FIELDS.contains(&k.as_str()))
                .map(|(k, _)| {
                    let limit = if k == "text" { TEXT_WIDTH } else { FIELD_WIDTH };
                    (k.as_str(), limit)
                })
                .collect()
        })
        .unwrap_or_default();

    let rows: Vec<Vec<String>> = records
        .iter()
        .zip(fields)
        .map(|(entry, fields)| {
            let mut row = vec![truncate_to_width(rkey_of(&entry.uri), RKEY_WIDTH)];
            row.extend(columns.iter().map(|(key, limit)| {
                let cell = fields
                    .get(*key)
                    .filter(|v| v.is_scalar())
                    .map(RecordValue::to_display)
                    .unwrap_or_default();
                truncate_to_width(&cell, *limit)
            }));
            row
        })
        .collect();

    let titles: Vec<&str> = std::iter::once("rkey")
        .chain(columns.iter().map(|(key, _)| *key))
        .collect();
    let widths: Vec<usize> = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            if i == 0 {
                return RKEY_WIDTH;
            }
            rows.iter()
                .map(|row| row[i].width())
                .chain(std::iter::once(title.width()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = vec![header(collection, records.len())];
    lines.push(table_line(titles.iter().copied(), &widths));
    lines.push(
        widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in &rows {
        lines.push(table_line(row.iter().map(String::as_str), &widths));
    }
    lines.join("\n")
}

fn table_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| pad(cell, *width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn pad(s: &str, width: usize) -> String {
    let padding = width.saturating_sub(s.width());
    format!("{s}{}", " ".repeat(padding))
}

/// Cut `s` to at most `max_width` columns, ending in an ellipsis when cut
fn truncate_to_width(s: &str, max_width: usize) -> String {
    let s = s.replace('\n', " ");
    if s.width() <= max_width {
        return s;
    }

    let mut result = String::new();
    let mut current_width = 0;
    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            break;
        }
        result.push(c);
        current_width += char_width;
    }
    result.push('…');
    result
}
