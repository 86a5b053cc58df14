//! Delivery targets for normalized record sets.
//!
//! Sinks stand in for the page's table widget at its `setData`-style
//! interface. Each delivery carries the fetch `seq`; sinks keep the last
//! accepted seq and drop anything older, so overlapping pipeline runs
//! cannot regress the rendered data.

use crate::error::{Error, Result};
use crate::normalize::RecordSet;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

/// Receives coarse user-facing status messages.
pub trait StatusSink: Send + Sync {
    fn status(&self, level: StatusLevel, message: &str);
}

/// Routes status messages onto the tracing subscriber.
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn status(&self, level: StatusLevel, message: &str) {
        match level {
            StatusLevel::Info => info!("{message}"),
            StatusLevel::Success => info!("{message}"),
            StatusLevel::Error => error!("{message}"),
        }
    }
}

/// Receives complete record sets. All-or-nothing: the pipeline never
/// delivers a partial set.
pub trait RecordSink: Send + Sync {
    fn deliver(&self, set: &RecordSet) -> Result<()>;
}

/// Returns true when the delivery supersedes `last_seq`, updating it.
/// Stale deliveries are logged and dropped without error.
fn accept_seq(last_seq: &Mutex<u64>, set: &RecordSet) -> bool {
    let mut last = last_seq.lock().unwrap();
    if set.seq <= *last {
        warn!(
            "Dropping stale delivery seq={} (already rendered seq={})",
            set.seq, *last
        );
        return false;
    }
    *last = set.seq;
    true
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Renders an aligned text table to a writer (stdout for the CLI).
pub struct TableSink<W: Write + Send> {
    out: Mutex<W>,
    last_seq: Mutex<u64>,
}

impl<W: Write + Send> TableSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            last_seq: Mutex::new(0),
        }
    }
}

impl<W: Write + Send> RecordSink for TableSink<W> {
    fn deliver(&self, set: &RecordSet) -> Result<()> {
        if !accept_seq(&self.last_seq, set) {
            return Ok(());
        }

        let mut widths: Vec<usize> = set.columns.iter().map(|c| c.len()).collect();
        let rows: Vec<Vec<String>> = set
            .records
            .iter()
            .map(|record| {
                set.columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| {
                        let text = record.get(col).map(cell_text).unwrap_or_default();
                        widths[i] = widths[i].max(text.len());
                        text
                    })
                    .collect()
            })
            .collect();

        let mut out = self.out.lock().unwrap();
        let header: Vec<String> = set
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect();
        writeln!(out, "{}", header.join("  "))?;
        for row in rows {
            let line: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
                .collect();
            writeln!(out, "{}", line.join("  "))?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Writes the record set as pretty-printed JSON.
pub struct JsonSink<W: Write + Send> {
    out: Mutex<W>,
    last_seq: Mutex<u64>,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            last_seq: Mutex::new(0),
        }
    }
}

impl<W: Write + Send> RecordSink for JsonSink<W> {
    fn deliver(&self, set: &RecordSet) -> Result<()> {
        if !accept_seq(&self.last_seq, set) {
            return Ok(());
        }
        let mut out = self.out.lock().unwrap();
        serde_json::to_writer_pretty(&mut *out, &set.records)?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }
}

/// Writes the record set as CSV in column order, header row first.
pub struct CsvSink<W: Write + Send> {
    out: Mutex<W>,
    last_seq: Mutex<u64>,
}

impl<W: Write + Send> CsvSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            last_seq: Mutex::new(0),
        }
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl<W: Write + Send> RecordSink for CsvSink<W> {
    fn deliver(&self, set: &RecordSet) -> Result<()> {
        if !accept_seq(&self.last_seq, set) {
            return Ok(());
        }
        let mut out = self.out.lock().unwrap();
        let header: Vec<String> = set.columns.iter().map(|c| csv_escape(c)).collect();
        writeln!(out, "{}", header.join(","))?;
        for record in &set.records {
            let line: Vec<String> = set
                .columns
                .iter()
                .map(|col| csv_escape(&record.get(col).map(cell_text).unwrap_or_default()))
                .collect();
            writeln!(out, "{}", line.join(","))?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Holds the latest accepted record set.
#[derive(Default)]
pub struct MemorySink {
    latest: Mutex<Option<RecordSet>>,
    last_seq: Mutex<u64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<RecordSet> {
        self.latest.lock().unwrap().clone()
    }
}

impl RecordSink for MemorySink {
    fn deliver(&self, set: &RecordSet) -> Result<()> {
        if !accept_seq(&self.last_seq, set) {
            return Ok(());
        }
        *self.latest.lock().unwrap() = Some(set.clone());
        Ok(())
    }
}

/// Opens `path` for writing, failing fast if the target is unusable.
pub fn create_output_file(path: &Path) -> Result<File> {
    File::create(path)
        .map_err(|e| Error::SinkUnavailable(format!("cannot write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RecordSet;
    use chrono::Utc;
    use serde_json::json;

    fn set_with_seq(seq: u64, value: &str) -> RecordSet {
        let mut record = crate::normalize::Record::new();
        record.insert("id".into(), json!(0));
        record.insert("athlete".into(), json!(value));
        RecordSet {
            seq,
            fetched_at: Utc::now(),
            columns: vec!["id".into(), "athlete".into()],
            records: vec![record],
        }
    }

    #[test]
    fn stale_deliveries_are_dropped() {
        let sink = MemorySink::new();
        sink.deliver(&set_with_seq(2, "newer")).unwrap();
        sink.deliver(&set_with_seq(1, "older")).unwrap();

        let latest = sink.latest().unwrap();
        assert_eq!(latest.seq, 2);
        assert_eq!(latest.records[0]["athlete"], json!("newer"));
    }

    #[test]
    fn csv_escapes_quotes_and_commas() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn csv_sink_writes_header_and_rows() {
        let sink = CsvSink::new(Vec::new());
        sink.deliver(&set_with_seq(1, "Griffey, Ken")).unwrap();
        let written = String::from_utf8(sink.out.into_inner().unwrap()).unwrap();
        assert_eq!(written, "id,athlete\n0,\"Griffey, Ken\"\n");
    }

    #[test]
    fn table_sink_aligns_columns() {
        let sink = TableSink::new(Vec::new());
        sink.deliver(&set_with_seq(1, "Ichiro")).unwrap();
        let written = String::from_utf8(sink.out.into_inner().unwrap()).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next().unwrap(), "id  athlete");
        assert_eq!(lines.next().unwrap(), "0   Ichiro ");
    }
}
