use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unparseable sheet export: {0}")]
    Parse(String),

    #[error("Sheet export returned an HTML page instead of data; check that the sheet is shared for unauthenticated reads")]
    AccessDenied,

    #[error("Record sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("Ingestion endpoint rejected the upload: {message}")]
    Ingest { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
