//! Run report artifact
//!
//! One JSON document per run, written once at the end: totals, success
//! rate, and the ordered per-file outcome list. Not streamed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::workflow::WorkflowResult;

/// The serialized shape of the report file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// When the report was written
    pub generated_at: DateTime<Utc>,

    #[serde(flatten)]
    pub result: WorkflowResult,
}

impl RunReport {
    pub fn new(result: WorkflowResult) -> Self {
        Self {
            generated_at: Utc::now(),
            result,
        }
    }
}

/// Write the run report to `path`, creating parent directories as needed.
pub async fn write_report(path: &Path, result: &WorkflowResult) -> io::Result<()> {
    let report = RunReport::new(result.clone());
    let json = serde_json::to_string_pretty(&report).map_err(io::Error::other)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;

    tracing::info!(
        path = %path.display(),
        organized = result.organized_files,
        total = result.total_files,
        "Wrote run report"
    );
    Ok(())
}
