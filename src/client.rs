//! HTTP collaborators: the sheet export endpoint and the card-evaluation
//! ingestion endpoint.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{debug, info, instrument};

/// Source of raw sheet-export text. Seam for tests and offline runs.
#[async_trait::async_trait]
pub trait SheetSource: Send + Sync {
    async fn fetch_export(&self) -> Result<String>;
}

/// Fetches the gviz export of the configured sheet.
pub struct SheetClient {
    client: reqwest::Client,
    export_url: String,
}

impl SheetClient {
    pub fn new(export_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            export_url,
        }
    }
}

#[async_trait::async_trait]
impl SheetSource for SheetClient {
    #[instrument(skip(self))]
    async fn fetch_export(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.export_url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await?;
        let text = response.text().await?;
        debug!("Fetched sheet export, {} bytes", text.len());
        Ok(text)
    }
}

/// Posts card images to the evaluation proxy, which appends a row to the
/// sheet on success. The proxy speaks plain text: anything starting with
/// `ERROR` is a rejection, everything else an acknowledgment.
pub struct IngestClient {
    client: reqwest::Client,
    ingest_url: String,
}

impl IngestClient {
    pub fn new(ingest_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            ingest_url,
        }
    }

    /// Uploads one image for evaluation. Returns the acknowledgment text.
    #[instrument(skip(self, image_bytes))]
    pub async fn ingest_image(&self, image_bytes: &[u8]) -> Result<String> {
        let body = BASE64.encode(image_bytes);
        debug!("Uploading image, {} base64 bytes", body.len());

        let response = self
            .client
            .post(&self.ingest_url)
            .query(&[("action", "ingest")])
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let ack = interpret_ingest_response(status.is_success(), &status.to_string(), text)?;

        info!("Ingestion endpoint accepted the upload");
        Ok(ack)
    }
}

/// Applies the proxy's plain-text protocol: a non-success HTTP status or a
/// body starting with `ERROR` is a rejection.
fn interpret_ingest_response(status_ok: bool, status: &str, text: String) -> Result<String> {
    if !status_ok || text.starts_with("ERROR") {
        return Err(Error::Ingest {
            message: if text.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                text
            },
        });
    }
    Ok(text)
}
