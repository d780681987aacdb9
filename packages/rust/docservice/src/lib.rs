//! Document (OCR) service client.
//!
//! The document service converts an uploaded file reference into extracted
//! text. Submission registers a remote file by URL; extraction is
//! asynchronous, so the client polls the detail endpoint until the job
//! leaves `pending` or the configured deadline passes.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use invoicematch_shared::{DocumentStatus, InvoiceMatchError, PollPolicy, Result};
use invoicematch_shared::config::DocumentConfig;

/// Service tag used in error messages.
const SERVICE: &str = "document";

/// Default timeout for a single HTTP request (polling has its own deadline).
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// User-Agent string for document service requests.
const USER_AGENT: &str = concat!("invoicematch/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Response envelope for `POST {endpoint}/add`.
#[derive(Debug, Deserialize)]
struct AddFileResponse {
    #[serde(rename = "Data")]
    data: AddFileData,
}

#[derive(Debug, Deserialize)]
struct AddFileData {
    #[serde(rename = "DocumentReferenceId")]
    document_reference_id: String,
}

/// Response envelope for `GET {endpoint}/detail`.
#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(rename = "Data")]
    data: DetailData,
}

#[derive(Debug, Deserialize)]
struct DetailData {
    #[serde(rename = "DocumentStatus")]
    document_status: String,
    #[serde(rename = "Content", default)]
    content: String,
}

// ---------------------------------------------------------------------------
// DocumentClient
// ---------------------------------------------------------------------------

/// Client for the document service, owning its HTTP connection and config.
pub struct DocumentClient {
    client: reqwest::Client,
    endpoint: String,
    blob_url: String,
}

impl DocumentClient {
    /// Create a new client from the `[document]` config section.
    pub fn new(config: &DocumentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(3))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                InvoiceMatchError::service(SERVICE, format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            blob_url: config.blob_url.clone(),
        })
    }

    /// Register a vendor file for OCR extraction.
    ///
    /// The file itself lives in blob storage; the service receives
    /// `{blob_url}{file_name}` and returns a document reference id used for
    /// all subsequent status checks.
    #[instrument(skip(self))]
    pub async fn submit(&self, file_name: &str) -> Result<String> {
        let url = format!("{}/add", self.endpoint);
        let body = serde_json::json!({
            "FileUrl": format!("{}{}", self.blob_url, file_name),
        });

        info!(%url, file_name, "submitting file to document service");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| InvoiceMatchError::service(SERVICE, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvoiceMatchError::service(
                SERVICE,
                format!("{url}: HTTP {status}"),
            ));
        }

        let parsed: AddFileResponse = response.json().await.map_err(|e| {
            InvoiceMatchError::format(format!("add response did not match schema: {e}"))
        })?;

        debug!(document_id = %parsed.data.document_reference_id, "file registered");
        Ok(parsed.data.document_reference_id)
    }

    /// Poll the detail endpoint until extraction finishes, returning the
    /// extracted text.
    ///
    /// `pending` sleeps for the policy interval and retries; the loop fails
    /// with a timeout error once the deadline passes. A `failed` status is a
    /// service error. Terminal statuses we do not recognize still return the
    /// content, with a warning, since upstream does not enumerate them.
    #[instrument(skip(self, policy))]
    pub async fn await_text(&self, document_id: &str, policy: &PollPolicy) -> Result<String> {
        let start = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let detail = self.fetch_detail(document_id).await?;
            let status = DocumentStatus::parse(&detail.document_status);

            match status {
                DocumentStatus::Pending => {
                    debug!(attempts, "document still pending");
                    if start.elapsed() + policy.interval >= policy.deadline {
                        return Err(InvoiceMatchError::Timeout {
                            waiting_for: "document extraction",
                            attempts,
                            elapsed: start.elapsed(),
                        });
                    }
                    tokio::time::sleep(policy.interval).await;
                }
                DocumentStatus::Done => {
                    info!(attempts, elapsed = ?start.elapsed(), "document extraction complete");
                    return Ok(detail.content);
                }
                DocumentStatus::Failed => {
                    return Err(InvoiceMatchError::service(
                        SERVICE,
                        format!(
                            "extraction failed for document {document_id} \
                             (status {:?})",
                            detail.document_status
                        ),
                    ));
                }
                DocumentStatus::Other(raw) => {
                    warn!(status = %raw, "unrecognized terminal status, returning content");
                    return Ok(detail.content);
                }
            }
        }
    }

    /// One status check against the detail endpoint.
    async fn fetch_detail(&self, document_id: &str) -> Result<DetailData> {
        // "DocumentRefernceId" is the upstream API's own spelling.
        let url = format!(
            "{}/detail?DocumentRefernceId={}",
            self.endpoint, document_id
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| InvoiceMatchError::service(SERVICE, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvoiceMatchError::service(
                SERVICE,
                format!("{url}: HTTP {status}"),
            ));
        }

        let parsed: DetailResponse = response.json().await.map_err(|e| {
            InvoiceMatchError::format(format!("detail response did not match schema: {e}"))
        })?;

        Ok(parsed.data)
    }
}
