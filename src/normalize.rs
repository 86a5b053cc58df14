//! Turns a parsed gviz table into a stable record shape.
//!
//! Sheet owners rename columns freely, so every column label is collapsed
//! into a camelCase field key, and every record is floored with the known
//! card fields so downstream consumers never see a missing property.

use crate::gviz::GvizTable;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// One normalized row, keyed by field key. Values are strings, numbers, or
/// the empty string standing in for an absent cell.
pub type Record = Map<String, Value>;

/// Fields guaranteed to exist on every record, defaulting to the empty
/// string when the sheet does not produce them.
pub const DEFAULT_FIELDS: [&str; 9] = [
    "sport",
    "league",
    "year",
    "cardSet",
    "athlete",
    "team",
    "lowPrice",
    "highPrice",
    "quantity",
];

/// Fields coerced to numbers when their value parses cleanly.
const NUMERIC_FIELDS: [&str; 4] = ["year", "lowPrice", "highPrice", "quantity"];

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// The full result of one fetch. Replaces the previous set wholesale; `seq`
/// lets a sink discard a delivery that arrives after a newer one.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSet {
    pub seq: u64,
    pub fetched_at: DateTime<Utc>,
    /// Column order for tabular sinks: `id`, then sheet columns, then any
    /// default fields the sheet did not produce.
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Derives a stable field key from a column label.
///
/// Deterministic for a given label and position. Labels that are empty, or
/// that clean down to nothing (all punctuation), fall back to the positional
/// `col<N>` placeholder (1-based). Two labels may derive the same key; the
/// normalizer does not de-duplicate, so the later column wins.
pub fn field_key(label: &str, idx: usize) -> String {
    let clean = label.trim();
    if clean.is_empty() {
        return format!("col{}", idx + 1);
    }

    let lowered = clean.to_lowercase();
    let spaced = NON_ALNUM.replace_all(&lowered, " ");
    let mut key = String::with_capacity(spaced.len());
    for (i, token) in spaced.trim().split(' ').filter(|t| !t.is_empty()).enumerate() {
        if i == 0 {
            key.push_str(token);
        } else {
            let mut chars = token.chars();
            if let Some(first) = chars.next() {
                key.push(first.to_ascii_uppercase());
                key.push_str(chars.as_str());
            }
        }
    }

    if key.is_empty() {
        return format!("col{}", idx + 1);
    }
    key
}

fn coerce_numeric(value: &Value) -> Option<Value> {
    let text = match value {
        Value::Number(_) => return None, // already numeric
        Value::String(s) if !s.trim().is_empty() => s.trim(),
        _ => return None,
    };
    let parsed: f64 = text.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 {
        Some(Value::Number(Number::from(parsed as i64)))
    } else {
        Number::from_f64(parsed).map(Value::Number)
    }
}

/// Builds a `RecordSet` from a parsed table. Pure; `seq` is supplied by the
/// pipeline that triggered the fetch.
pub fn normalize(table: &GvizTable, seq: u64) -> RecordSet {
    let fields: Vec<String> = table
        .cols
        .iter()
        .enumerate()
        .map(|(idx, col)| field_key(&col.label, idx))
        .collect();

    let mut columns: Vec<String> = Vec::with_capacity(1 + fields.len() + DEFAULT_FIELDS.len());
    columns.push("id".to_string());
    for field in &fields {
        if !columns.contains(field) {
            columns.push(field.clone());
        }
    }
    for field in DEFAULT_FIELDS {
        if !columns.iter().any(|c| c == field) {
            columns.push(field.to_string());
        }
    }

    let records = table
        .rows
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            let mut record = Record::new();
            record.insert("id".to_string(), Value::from(row_idx as u64));

            for field in DEFAULT_FIELDS {
                record.insert(field.to_string(), Value::String(String::new()));
            }

            for (col_idx, field) in fields.iter().enumerate() {
                let value = row
                    .c
                    .get(col_idx)
                    .and_then(|cell| cell.as_ref())
                    .and_then(|cell| cell.v.clone())
                    .unwrap_or(Value::Null);
                let value = match value {
                    Value::Null => Value::String(String::new()),
                    other => other,
                };
                record.insert(field.clone(), value);
            }

            for field in NUMERIC_FIELDS {
                if let Some(coerced) = record.get(field).and_then(coerce_numeric) {
                    record.insert(field.to_string(), coerced);
                }
            }

            record
        })
        .collect();

    RecordSet {
        seq,
        fetched_at: Utc::now(),
        columns,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gviz::parse_gviz_response;
    use serde_json::json;

    fn wrap(json: &str) -> String {
        format!("/*O_o*/\ngoogle.visualization.Query.setResponse({json});")
    }

    #[test]
    fn field_key_is_deterministic() {
        for label in ["Low Price", "", "  ", "Card  Set!!", "Ärger 9"] {
            assert_eq!(field_key(label, 3), field_key(label, 3));
        }
    }

    #[test]
    fn blank_labels_fall_back_to_position() {
        assert_eq!(field_key("", 0), "col1");
        assert_eq!(field_key("   ", 4), "col5");
        // All punctuation cleans to nothing and also falls back.
        assert_eq!(field_key("!!!", 1), "col2");
    }

    #[test]
    fn labels_collapse_to_camel_case() {
        assert_eq!(field_key("Low Price", 0), "lowPrice");
        assert_eq!(field_key("Card  Set!!", 0), "cardSet");
        assert_eq!(field_key("YEAR", 0), "year");
        assert_eq!(field_key(" Athlete ", 0), "athlete");
        assert_eq!(field_key("high-price ($)", 0), "highPrice");
    }

    #[test]
    fn round_trip_preserves_row_count_and_shape() {
        let payload = wrap(
            r#"{"table":{"cols":[{"label":"Sport"},{"label":"Grade"}],"rows":[
                {"c":[{"v":"Baseball"},{"v":"PSA 9"}]},
                {"c":[{"v":"Hockey"},{"v":"BGS 8.5"}]},
                {"c":[{"v":"Soccer"},null]}]}}"#,
        );
        let table = parse_gviz_response(&payload).unwrap();
        let set = normalize(&table, 1);

        assert_eq!(set.len(), 3);
        for (idx, record) in set.records.iter().enumerate() {
            assert_eq!(record["id"], json!(idx));
            // Sheet keys, every default, and id.
            assert!(record.contains_key("sport"));
            assert!(record.contains_key("grade"));
            for field in DEFAULT_FIELDS {
                assert!(record.contains_key(field), "missing default {field}");
            }
            assert_eq!(record.len(), 1 + DEFAULT_FIELDS.len() + 1); // id + defaults + grade
        }
        assert_eq!(set.records[2]["grade"], json!(""));
    }

    #[test]
    fn sheet_values_override_defaults() {
        let payload = wrap(
            r#"{"table":{"cols":[{"label":"Team"}],"rows":[{"c":[{"v":"Mariners"}]}]}}"#,
        );
        let table = parse_gviz_response(&payload).unwrap();
        let set = normalize(&table, 1);
        assert_eq!(set.records[0]["team"], json!("Mariners"));
    }

    #[test]
    fn numeric_fields_coerce_best_effort() {
        let payload = wrap(
            r#"{"table":{"cols":[{"label":"Year"},{"label":"Low Price"},{"label":"Quantity"}],"rows":[
                {"c":[{"v":"42"},{"v":"12.50"},{"v":"N/A"}]}]}}"#,
        );
        let table = parse_gviz_response(&payload).unwrap();
        let record = &normalize(&table, 1).records[0];

        assert_eq!(record["year"], json!(42));
        assert_eq!(record["lowPrice"], json!(12.5));
        assert_eq!(record["quantity"], json!("N/A"));
        // Empty default stays an empty string, never zero.
        assert_eq!(record["highPrice"], json!(""));
    }

    #[test]
    fn end_to_end_example() {
        let payload = wrap(
            r#"{"table":{"cols":[{"label":"Year"},{"label":""}],"rows":[{"c":[{"v":"2020"},{"v":"X"}]}]}}"#,
        );
        let table = parse_gviz_response(&payload).unwrap();
        let set = normalize(&table, 7);

        assert_eq!(set.seq, 7);
        assert_eq!(set.len(), 1);
        let record = &set.records[0];
        assert_eq!(record["id"], json!(0));
        assert_eq!(record["year"], json!(2020));
        assert_eq!(record["col2"], json!("X"));
        for field in DEFAULT_FIELDS {
            if field != "year" {
                assert_eq!(record[field], json!(""), "default for {field}");
            }
        }
    }

    #[test]
    fn short_rows_pad_with_empty_strings() {
        let payload = wrap(
            r#"{"table":{"cols":[{"label":"Athlete"},{"label":"Team"}],"rows":[{"c":[{"v":"Griffey"}]}]}}"#,
        );
        let table = parse_gviz_response(&payload).unwrap();
        let record = &normalize(&table, 1).records[0];

        assert_eq!(record["athlete"], json!("Griffey"));
        assert_eq!(record["team"], json!(""));
    }

    #[test]
    fn colliding_labels_last_column_wins() {
        let payload = wrap(
            r#"{"table":{"cols":[{"label":"Team"},{"label":"team!"}],"rows":[{"c":[{"v":"first"},{"v":"second"}]}]}}"#,
        );
        let table = parse_gviz_response(&payload).unwrap();
        let set = normalize(&table, 1);
        assert_eq!(set.records[0]["team"], json!("second"));
        // The column list keeps a single entry for the collided key.
        assert_eq!(set.columns.iter().filter(|c| *c == "team").count(), 1);
    }

    #[test]
    fn numeric_cells_already_numbers_stay_numbers() {
        let payload = wrap(
            r#"{"table":{"cols":[{"label":"Quantity"}],"rows":[{"c":[{"v":3}]}]}}"#,
        );
        let table = parse_gviz_response(&payload).unwrap();
        assert_eq!(normalize(&table, 1).records[0]["quantity"], json!(3));
    }
}
