//! Intermediate-artifact persistence.
//!
//! Each run leaves behind three plain-text artifacts (the extracted vendor
//! data, the matching prompt, and the raw match result) plus a
//! `run_manifest.json` summarizing the run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use invoicematch_shared::{InvoiceMatchError, Result};

/// Current schema version for the run manifest format.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// The `run_manifest.json` structure written next to the workbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Vendor invoice file name as submitted.
    pub vendor_file: String,
    /// Catalog file name used for matching.
    pub catalog_file: String,
    /// Model passed to both assistant runs.
    pub model: String,
    /// Tool version that produced this run.
    pub tool_version: String,
    /// Number of match records written to the workbook.
    pub record_count: usize,
    /// OCR phase duration in seconds.
    pub ocr_secs: f64,
    /// Extraction-assistant phase duration in seconds.
    pub extraction_secs: f64,
    /// Matching-assistant phase duration in seconds.
    pub matching_secs: f64,
    /// Whole-run duration in seconds.
    pub total_secs: f64,
    /// When the run completed.
    pub created_at: DateTime<Utc>,
}

/// Write a plain-text log artifact as `{dir}/{name}.txt`, creating the
/// directory if needed. Returns the written path.
pub fn write_log(dir: &Path, name: &str, data: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| InvoiceMatchError::io(dir, e))?;
    let path = dir.join(format!("{name}.txt"));
    std::fs::write(&path, data).map_err(|e| InvoiceMatchError::io(&path, e))?;
    debug!(path = %path.display(), bytes = data.len(), "log artifact written");
    Ok(path)
}

/// Write the run manifest as `{dir}/run_manifest.json`. Returns the
/// written path.
pub fn write_manifest(dir: &Path, manifest: &RunManifest) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| InvoiceMatchError::io(dir, e))?;
    let path = dir.join("run_manifest.json");
    let content = serde_json::to_string_pretty(manifest)
        .map_err(|e| InvoiceMatchError::format(format!("manifest serialization: {e}")))?;
    std::fs::write(&path, content).map_err(|e| InvoiceMatchError::io(&path, e))?;
    debug!(path = %path.display(), "run manifest written");
    Ok(path)
}
