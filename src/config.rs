use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Evaluation proxy the card images are POSTed to. The service appends a
/// row to the sheet on success.
const DEFAULT_INGEST_URL: &str =
    "https://script.google.com/macros/s/AKfycbz0mQu6EYhZqIccIlbVskmM_32N3YaGiAwzRofG87eGqz4SQPC54up0FNMK3xXP87eI/exec";

/// Spreadsheet holding the evaluated cards.
const DEFAULT_SHEET_ID: &str = "1SYM9bU00-EkKelZTiWis8xlsl46ByhDSxt7kDlLyenM";

/// Delay between a successful upload and the follow-up refresh, giving the
/// evaluation service time to append its row.
const DEFAULT_REFRESH_DELAY_MS: u64 = 750;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_sheet_id")]
    pub sheet_id: String,
    #[serde(default = "default_ingest_url")]
    pub ingest_url: String,
    #[serde(default = "default_refresh_delay_ms")]
    pub refresh_delay_ms: u64,
}

fn default_sheet_id() -> String {
    DEFAULT_SHEET_ID.to_string()
}

fn default_ingest_url() -> String {
    DEFAULT_INGEST_URL.to_string()
}

fn default_refresh_delay_ms() -> u64 {
    DEFAULT_REFRESH_DELAY_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheet_id: default_sheet_id(),
            ingest_url: default_ingest_url(),
            refresh_delay_ms: default_refresh_delay_ms(),
        }
    }
}

impl Config {
    /// Loads `cardsheet.toml` if present, otherwise starts from the built-in
    /// defaults. `CARDSHEET_SHEET_ID` / `CARDSHEET_INGEST_URL` environment
    /// variables override either.
    pub fn load() -> Result<Self> {
        let config_path = "cardsheet.toml";
        let mut config = if Path::new(config_path).exists() {
            let config_content = fs::read_to_string(config_path).map_err(|e| {
                Error::Config(format!("Failed to read config file '{config_path}': {e}"))
            })?;
            toml::from_str(&config_content)?
        } else {
            Config::default()
        };

        if let Ok(sheet_id) = std::env::var("CARDSHEET_SHEET_ID") {
            if !sheet_id.trim().is_empty() {
                config.sheet_id = sheet_id;
            }
        }
        if let Ok(ingest_url) = std::env::var("CARDSHEET_INGEST_URL") {
            if !ingest_url.trim().is_empty() {
                config.ingest_url = ingest_url;
            }
        }

        Ok(config)
    }

    /// gviz export URL for the configured sheet.
    pub fn export_url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}/gviz/tq?tqx=out:json",
            self.sheet_id
        )
    }
}
