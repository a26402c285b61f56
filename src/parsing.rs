//! Command-line value parsing
//!
//! `key=value` tokens become record fields, and JSON Lines on stdin become
//! batches of records or updates.

use std::io::BufRead;

use crate::error::{PdsxError, Result};
use crate::value::{fields_from_json, Fields, RecordValue};

/// Parse `key=value` tokens into a field map.
///
/// Values starting with `{` or `[` must be valid JSON. Everything else is
/// coerced in a fixed order: `true`/`false`, `null` (case-insensitive),
/// all-digit integers, floats, and finally the raw string.
pub fn parse_key_value_args<S: AsRef<str>>(args: &[S]) -> Result<Fields> {
    let mut fields = Fields::new();

    for arg in args {
        let arg = arg.as_ref();
        let Some((key, value)) = arg.split_once('=') else {
            return Err(PdsxError::InvalidArgument(format!(
                "invalid argument format: {arg} (use key=value format)"
            )));
        };

        let parsed = if value.starts_with('{') || value.starts_with('[') {
            let json: serde_json::Value = serde_json::from_str(value).map_err(|e| {
                PdsxError::InvalidArgument(format!("invalid JSON for {key}: {e}"))
            })?;
            RecordValue::from(json)
        } else {
            parse_scalar(value)
        };

        fields.insert(key.to_string(), parsed);
    }

    Ok(fields)
}

/// Coerce a bare command-line value.
///
/// `"5"` is always the integer 5 (digit strings wider than `i64` stay
/// strings), `"5.0"` is a float, and anything that
/// fails float parsing (e.g. `"1.2.3"`) stays a string. Non-finite floats
/// (`nan`, `inf`) stay strings so the record remains valid JSON.
pub fn parse_scalar(value: &str) -> RecordValue {
    let lower = value.to_ascii_lowercase();
    match lower.as_str() {
        "true" => return RecordValue::Bool(true),
        "false" => return RecordValue::Bool(false),
        "null" => return RecordValue::Null,
        _ => {}
    }

    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return match value.parse::<i64>() {
            Ok(i) => RecordValue::Integer(i),
            // Too wide for an integer; a float would drop digits
            Err(_) => RecordValue::String(value.to_string()),
        };
    }

    match value.trim().parse::<f64>() {
        Ok(f) if f.is_finite() => RecordValue::Float(f),
        _ => RecordValue::String(value.to_string()),
    }
}

/// Read bare URIs, one per line, skipping blank lines
pub fn read_uris<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut uris = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            uris.push(trimmed.to_string());
        }
    }
    Ok(uris)
}

/// Read JSON Lines records for a batch create.
///
/// Line numbers in errors count every physical line, blank ones included.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<Fields>> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(fields) = parse_object_line(&line, index + 1)? {
            records.push(fields);
        }
    }
    Ok(records)
}

/// Read JSON Lines updates for a batch update.
///
/// Each object must carry a string `uri`, which is removed from the fields.
pub fn read_updates<R: BufRead>(reader: R) -> Result<Vec<(String, Fields)>> {
    let mut updates = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_num = index + 1;
        let line = line?;
        let Some(mut fields) = parse_object_line(&line, line_num)? else {
            continue;
        };

        let uri = match fields.remove("uri") {
            Some(RecordValue::String(uri)) => uri,
            Some(_) => {
                return Err(PdsxError::InvalidArgument(format!(
                    "line {line_num}: 'uri' must be a string"
                )))
            }
            None => {
                return Err(PdsxError::InvalidArgument(format!(
                    "line {line_num}: missing 'uri' field"
                )))
            }
        };
        updates.push((uri, fields));
    }
    Ok(updates)
}

fn parse_object_line(line: &str, line_num: usize) -> Result<Option<Fields>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let json: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
        PdsxError::InvalidArgument(format!("line {line_num}: invalid JSON - {e}"))
    })?;

    match json {
        serde_json::Value::Object(map) => Ok(Some(fields_from_json(map))),
        other => Err(PdsxError::InvalidArgument(format!(
            "line {line_num}: expected JSON object, got {}",
            RecordValue::from(other).type_name()
        ))),
    }
}
