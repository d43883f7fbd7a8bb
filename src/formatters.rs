use std::fmt::Write;

use crate::models::{FieldValue, Record};

/// Formats records as InfluxDB line protocol, one line per record,
/// timestamps in seconds.
pub fn format_line_protocol(records: &[Record]) -> String {
    let mut output = String::new();
    for record in records {
        if let Some(line) = format_record(record) {
            output.push_str(&line);
            output.push('\n');
        }
    }
    output
}

/// Formats a single record; `None` when no field is writable.
pub fn format_record(record: &Record) -> Option<String> {
    let fields: Vec<String> = record
        .fields
        .iter()
        .filter_map(|(key, value)| Some(format!("{}={}", escape_key(key), format_field(value)?)))
        .collect();
    if fields.is_empty() {
        return None;
    }

    let mut line = escape_measurement(&record.measurement);
    for (key, value) in &record.tags {
        // Influx rejects empty tag values
        if value.is_empty() {
            continue;
        }
        let _ = write!(line, ",{}={}", escape_key(key), escape_key(value));
    }
    let _ = write!(line, " {} {}", fields.join(","), record.time.timestamp());
    Some(line)
}

fn format_field(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Integer(i) => Some(format!("{i}i")),
        FieldValue::Float(f) if f.is_finite() => Some(format!("{f}")),
        FieldValue::Float(_) => None,
        FieldValue::Text(s) => Some(format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))),
    }
}

fn escape_measurement(name: &str) -> String {
    escape(name, &[',', ' '])
}

/// Tag keys, tag values and field keys
fn escape_key(key: &str) -> String {
    escape(key, &[',', '=', ' '])
}

fn escape(input: &str, special: &[char]) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        if special.contains(&c) {
            output.push('\\');
        }
        output.push(c);
    }
    output
}
