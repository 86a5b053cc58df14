//! Fetch → parse → normalize → deliver, all-or-nothing per run.
//!
//! Runs are not mutually excluded; each run takes the next value of a
//! monotonic counter and stamps its record set with it, so a sink can tell
//! a late-arriving older delivery from a newer one.

use crate::client::SheetSource;
use crate::error::Result;
use crate::gviz::parse_gviz_response;
use crate::normalize::normalize;
use crate::sink::{RecordSink, StatusLevel, StatusSink};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, instrument};

/// Outcome of one successful pipeline run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub seq: u64,
    pub rows: usize,
    pub columns: usize,
}

pub struct Pipeline<S: SheetSource> {
    source: S,
    seq: AtomicU64,
}

impl<S: SheetSource> Pipeline<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            seq: AtomicU64::new(0),
        }
    }

    /// Runs the pipeline once. On any failure the sink receives nothing and
    /// the status sink gets the error message; the pipeline stays usable
    /// for a later run.
    #[instrument(skip(self, sink, status))]
    pub async fn run(&self, sink: &dyn RecordSink, status: &dyn StatusSink) -> Result<RunSummary> {
        match self.run_inner(sink).await {
            Ok(summary) => {
                status.status(
                    StatusLevel::Success,
                    &format!("Loaded {} row(s).", summary.rows),
                );
                Ok(summary)
            }
            Err(e) => {
                status.status(StatusLevel::Error, &format!("ERROR loading sheet: {e}"));
                Err(e)
            }
        }
    }

    async fn run_inner(&self, sink: &dyn RecordSink) -> Result<RunSummary> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let raw = self.source.fetch_export().await?;
        let table = parse_gviz_response(&raw)?;
        let set = normalize(&table, seq);

        info!(
            "Run {} normalized {} row(s) across {} column(s)",
            seq,
            set.len(),
            set.columns.len()
        );

        let summary = RunSummary {
            seq,
            rows: set.len(),
            columns: set.columns.len(),
        };
        sink.deliver(&set)?;
        Ok(summary)
    }
}
