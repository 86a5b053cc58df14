//! Parser for the Google Sheets gviz export format.
//!
//! The export endpoint wraps a JSON document in a fixed function-call frame:
//! a 47-character prefix (`/*O_o*/\ngoogle.visualization.Query.setResponse(`)
//! and a `);` suffix. When the sheet is not shared for unauthenticated reads
//! the endpoint returns an HTML sign-in page instead, which must surface as
//! an access problem rather than a parse failure.

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

/// Length of the `google.visualization.Query.setResponse(` call frame,
/// including the `/*O_o*/` comment line that precedes it.
const FRAME_PREFIX_LEN: usize = 47;

/// The closing `);` of the call frame.
const FRAME_SUFFIX_LEN: usize = 2;

#[derive(Debug, Deserialize)]
pub struct GvizResponse {
    pub table: GvizTable,
}

#[derive(Debug, Deserialize)]
pub struct GvizTable {
    #[serde(default)]
    pub cols: Vec<GvizCol>,
    #[serde(default)]
    pub rows: Vec<GvizRow>,
}

#[derive(Debug, Deserialize)]
pub struct GvizCol {
    /// Column label as authored by the sheet owner. May be empty,
    /// duplicated, or full of punctuation.
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct GvizRow {
    /// Cells in column order. The export emits `null` for blank cells and
    /// may omit trailing cells entirely.
    #[serde(default)]
    pub c: Vec<Option<GvizCell>>,
}

#[derive(Debug, Deserialize)]
pub struct GvizCell {
    #[serde(default)]
    pub v: Option<Value>,
}

fn looks_like_html(text: &str) -> bool {
    let head = text.trim_start();
    let lower = head
        .chars()
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    lower.starts_with("<!doctype") || lower.starts_with("<html")
}

/// Strips the gviz call frame and decodes the embedded JSON document.
pub fn parse_gviz_response(text: &str) -> Result<GvizTable> {
    if looks_like_html(text) {
        return Err(Error::AccessDenied);
    }

    let inner = text
        .get(FRAME_PREFIX_LEN..text.len().saturating_sub(FRAME_SUFFIX_LEN))
        .filter(|_| text.len() > FRAME_PREFIX_LEN + FRAME_SUFFIX_LEN)
        .ok_or_else(|| Error::Parse(format!("response too short to be framed: {text:?}")))?;

    if looks_like_html(inner) {
        return Err(Error::AccessDenied);
    }

    let response: GvizResponse = serde_json::from_str(inner)
        .map_err(|e| Error::Parse(format!("{e}; content: {}", truncate(inner, 200))))?;
    Ok(response.table)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
