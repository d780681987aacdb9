//! Core domain types for invoice matching.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed column order for the output workbook. Field names are the wire
/// schema produced by the matching assistant and must not be renamed.
pub const MATCH_HEADERS: [&str; 6] = [
    "vendor_sku",
    "vendor_product",
    "bzbs_product",
    "bzbs_sku",
    "probability",
    "quantity",
];

// ---------------------------------------------------------------------------
// MatchRecord
// ---------------------------------------------------------------------------

/// One reconciled line item: a vendor invoice line paired with the catalog
/// product it most likely refers to. The atomic unit written to the output
/// sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// SKU as printed on the vendor invoice.
    #[serde(default)]
    pub vendor_sku: String,
    /// Product name as printed on the vendor invoice.
    #[serde(default)]
    pub vendor_product: String,
    /// Matched catalog product name.
    #[serde(default)]
    pub bzbs_product: String,
    /// Matched catalog SKU.
    #[serde(default)]
    pub bzbs_sku: String,
    /// Match confidence reported by the assistant, 0.0–1.0.
    #[serde(default)]
    pub probability: f64,
    /// Invoiced quantity.
    #[serde(default)]
    pub quantity: i64,
}

// ---------------------------------------------------------------------------
// DocumentStatus
// ---------------------------------------------------------------------------

/// Status of a remote OCR job, parsed from the document service's
/// `DocumentStatus` field.
///
/// Upstream only documents `pending`; anything else is terminal. `failed`
/// and `error` map to [`DocumentStatus::Failed`] so callers can distinguish
/// a failed extraction from a successful one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Extraction still in progress; keep polling.
    Pending,
    /// Extraction finished successfully.
    Done,
    /// Extraction finished with a remote failure.
    Failed,
    /// Terminal status we do not recognize; content is still returned.
    Other(String),
}

impl DocumentStatus {
    /// Parse a raw status string, case-insensitively.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "done" | "success" | "succeeded" => Self::Done,
            "failed" | "error" => Self::Failed,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    /// Whether the job has left the queue, successfully or not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

// ---------------------------------------------------------------------------
// PollPolicy
// ---------------------------------------------------------------------------

/// Bounded-polling parameters shared by both remote clients: a fixed sleep
/// interval and an overall deadline. Every polling loop carries an attempt
/// count and fails with a timeout error once the deadline passes.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Fixed sleep between status checks.
    pub interval: Duration,
    /// Overall deadline measured from the first check.
    pub deadline: Duration,
}

impl PollPolicy {
    /// Build a policy from the config file's millisecond/second fields.
    pub fn from_millis_secs(interval_ms: u64, deadline_secs: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            deadline: Duration::from_secs(deadline_secs),
        }
    }
}
