//! End-to-end match pipeline: invoice → OCR → extraction → matching → workbook.
//!
//! The flow is strictly linear; no two remote calls are ever in flight at
//! once, and each run handles one vendor/catalog pair.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use invoicematch_assistant::{AssistantClient, ReplyFormat};
use invoicematch_docservice::DocumentClient;
use invoicematch_shared::config::{AssistantConfig, DocumentConfig};
use invoicematch_shared::{InvoiceMatchError, PollPolicy, Result};

use crate::artifacts::{self, MANIFEST_SCHEMA_VERSION, RunManifest};
use crate::prompt;

/// Output workbook file name.
const WORKBOOK_FILE_NAME: &str = "match_result.xlsx";

/// Configuration for one match run, merged from config file + CLI input.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Vendor invoice file name (resolved against the document service's
    /// blob URL, not the local filesystem).
    pub vendor_file: String,
    /// Catalog file name, read from `catalog_dir`.
    pub catalog_file: String,
    /// Document service settings.
    pub document: DocumentConfig,
    /// Assistant API settings.
    pub assistant: AssistantConfig,
    /// Resolved assistant API key.
    pub api_key: String,
    /// Polling policy for OCR status checks.
    pub document_poll: PollPolicy,
    /// Polling policy for assistant replies.
    pub assistant_poll: PollPolicy,
    /// Directory holding local catalog files.
    pub catalog_dir: PathBuf,
    /// Directory for plain-text log artifacts.
    pub log_dir: PathBuf,
    /// Directory for the workbook and run manifest.
    pub output_dir: PathBuf,
    /// Tool version string.
    pub tool_version: String,
}

/// Result of one match run.
#[derive(Debug)]
pub struct MatchRunResult {
    /// Path to the written workbook.
    pub workbook_path: PathBuf,
    /// Path to the run manifest.
    pub manifest_path: PathBuf,
    /// Number of match records written.
    pub record_count: usize,
    /// OCR phase duration.
    pub ocr_elapsed: Duration,
    /// Extraction-assistant phase duration.
    pub extraction_elapsed: Duration,
    /// Matching-assistant phase duration.
    pub matching_elapsed: Duration,
    /// Whole-run duration.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &MatchRunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &MatchRunResult) {}
}

/// Run the full match pipeline.
///
/// 1. Submit the vendor file to the document service; await OCR text
/// 2. Extraction assistant: OCR text → vendor line items (verbatim reply)
/// 3. Read the catalog file (pass-through, not parsed)
/// 4. Matching assistant: prompt → fenced-JSON match records
/// 5. Parse records, write the workbook and run manifest
#[instrument(skip_all, fields(vendor = %config.vendor_file, catalog = %config.catalog_file))]
pub async fn run_match(
    config: &MatchConfig,
    progress: &dyn ProgressReporter,
) -> Result<MatchRunResult> {
    let start = Instant::now();

    // Fail on a missing catalog before any remote work is done.
    let catalog_path = config.catalog_dir.join(&config.catalog_file);
    if !catalog_path.is_file() {
        return Err(InvoiceMatchError::validation(format!(
            "catalog file not found: {}",
            catalog_path.display()
        )));
    }

    let documents = DocumentClient::new(&config.document)?;
    let extractor = AssistantClient::new(
        &config.assistant,
        &config.assistant.extractor_assistant_id,
        &config.api_key,
    )?;
    let matcher = AssistantClient::new(
        &config.assistant,
        &config.assistant.matching_assistant_id,
        &config.api_key,
    )?;

    // --- Phase 1: OCR ---
    progress.phase("Submitting vendor invoice");
    let document_id = documents.submit(&config.vendor_file).await?;

    progress.phase("Waiting for OCR extraction");
    let ocr_text = documents
        .await_text(&document_id, &config.document_poll)
        .await?;
    let ocr_elapsed = start.elapsed();
    info!(elapsed = ?ocr_elapsed, "OCR phase complete");

    // --- Phase 2: Extraction assistant ---
    progress.phase("Extracting vendor line items");
    let extraction_start = Instant::now();
    let vendor_data = extractor
        .chat(&ocr_text, ReplyFormat::PlainText, &config.assistant_poll)
        .await?;
    let extraction_elapsed = extraction_start.elapsed();
    info!(elapsed = ?extraction_elapsed, "first agent finished");
    artifacts::write_log(&config.log_dir, "vendor", &vendor_data)?;

    // --- Phase 3: Catalog + prompt ---
    let catalog_data = std::fs::read_to_string(&catalog_path)
        .map_err(|e| InvoiceMatchError::io(&catalog_path, e))?;

    let matching_prompt = prompt::build_matching_prompt(&vendor_data, &catalog_data);
    artifacts::write_log(&config.log_dir, "prompt", &matching_prompt)?;

    // --- Phase 4: Matching assistant ---
    progress.phase("Matching against catalog");
    let matching_start = Instant::now();
    let match_json = matcher
        .chat(
            &matching_prompt,
            ReplyFormat::FencedJson,
            &config.assistant_poll,
        )
        .await?;
    let matching_elapsed = matching_start.elapsed();
    info!(elapsed = ?matching_elapsed, "matching agent finished");
    artifacts::write_log(&config.log_dir, "result", &match_json)?;

    // --- Phase 5: Report ---
    progress.phase("Writing workbook");
    let records = invoicematch_report::parse_match_records(&match_json)?;

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| InvoiceMatchError::io(&config.output_dir, e))?;
    let workbook_path = config.output_dir.join(WORKBOOK_FILE_NAME);
    invoicematch_report::write_workbook(&records, &workbook_path)?;

    let elapsed = start.elapsed();
    let manifest = RunManifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        vendor_file: config.vendor_file.clone(),
        catalog_file: config.catalog_file.clone(),
        model: config.assistant.model.clone(),
        tool_version: config.tool_version.clone(),
        record_count: records.len(),
        ocr_secs: ocr_elapsed.as_secs_f64(),
        extraction_secs: extraction_elapsed.as_secs_f64(),
        matching_secs: matching_elapsed.as_secs_f64(),
        total_secs: elapsed.as_secs_f64(),
        created_at: chrono::Utc::now(),
    };
    let manifest_path = artifacts::write_manifest(&config.output_dir, &manifest)?;

    let result = MatchRunResult {
        workbook_path,
        manifest_path,
        record_count: records.len(),
        ocr_elapsed,
        extraction_elapsed,
        matching_elapsed,
        elapsed,
    };

    info!(
        records = result.record_count,
        elapsed = ?result.elapsed,
        workbook = %result.workbook_path.display(),
        "match pipeline complete"
    );
    progress.done(&result);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MATCH_REPLY: &str = "```json\n[{\"vendor_sku\":\"A1\",\"vendor_product\":\"Widget\",\
        \"bzbs_product\":\"Widget Pro\",\"bzbs_sku\":\"B9\",\"probability\":0.5,\"quantity\":3}]\n```";

    fn assistant_reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "data": [ { "role": "assistant", "content": [ { "text": { "value": text } } ] } ]
        })
    }

    /// Mock both remote services for one scripted pipeline run: OCR text,
    /// a plain-text extraction reply, and a fenced-JSON matching reply.
    async fn mount_scripted_services(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/add"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Data": { "DocumentReferenceId": "doc-1" }
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/detail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Data": { "DocumentStatus": "done", "Content": "INVOICE #42\nWidget x3" }
            })))
            .mount(server)
            .await;

        // First thread goes to the extractor, second to the matcher.
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "id": "thread_extract" })),
            )
            .up_to_n_times(1)
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "id": "thread_match" })),
            )
            .mount(server)
            .await;

        for thread in ["thread_extract", "thread_match"] {
            Mock::given(method("POST"))
                .and(path(format!("/threads/{thread}/messages")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({ "id": "msg_1" })),
                )
                .mount(server)
                .await;

            Mock::given(method("POST"))
                .and(path(format!("/threads/{thread}/runs")))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "id": "run_1",
                    "status": "queued",
                })))
                .mount(server)
                .await;
        }

        Mock::given(method("GET"))
            .and(path("/threads/thread_extract/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(assistant_reply("A1 Widget quantity 3")),
            )
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/threads/thread_match/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(assistant_reply(MATCH_REPLY)),
            )
            .mount(server)
            .await;
    }

    fn test_config(server: &MockServer, root: &std::path::Path) -> MatchConfig {
        MatchConfig {
            vendor_file: "invoice-042.pdf".into(),
            catalog_file: "catalog.csv".into(),
            document: DocumentConfig {
                endpoint: server.uri(),
                blob_url: "https://blob.example.com/invoices/".into(),
            },
            assistant: AssistantConfig {
                endpoint: server.uri(),
                extractor_assistant_id: "asst_extract".into(),
                matching_assistant_id: "asst_match".into(),
                ..AssistantConfig::default()
            },
            api_key: "test-key".into(),
            document_poll: PollPolicy::from_millis_secs(10, 2),
            assistant_poll: PollPolicy::from_millis_secs(10, 2),
            catalog_dir: root.join("catalog"),
            log_dir: root.join("log"),
            output_dir: root.join("output"),
            tool_version: "0.1.0-test".into(),
        }
    }

    #[tokio::test]
    async fn scripted_run_produces_one_row_and_artifacts() {
        let server = MockServer::start().await;
        mount_scripted_services(&server).await;

        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(&server, dir.path());

        std::fs::create_dir_all(&config.catalog_dir).unwrap();
        std::fs::write(
            config.catalog_dir.join("catalog.csv"),
            "B9,Widget Pro\nB4,Gadget Max\n",
        )
        .unwrap();

        let result = run_match(&config, &SilentProgress).await.unwrap();

        assert_eq!(result.record_count, 1);
        assert!(result.workbook_path.exists());
        assert!(result.manifest_path.exists());

        // The extraction reply is persisted verbatim.
        let vendor_log =
            std::fs::read_to_string(config.log_dir.join("vendor.txt")).unwrap();
        assert_eq!(vendor_log, "A1 Widget quantity 3");

        // The prompt embeds both payloads.
        let prompt_log =
            std::fs::read_to_string(config.log_dir.join("prompt.txt")).unwrap();
        assert!(prompt_log.contains("A1 Widget quantity 3"));
        assert!(prompt_log.contains("B9,Widget Pro"));

        // The raw matching reply (fence already stripped) is persisted.
        let result_log =
            std::fs::read_to_string(config.log_dir.join("result.txt")).unwrap();
        let records = invoicematch_report::parse_match_records(&result_log).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vendor_sku, "A1");
        assert_eq!(records[0].bzbs_sku, "B9");
        assert_eq!(records[0].probability, 0.5);
        assert_eq!(records[0].quantity, 3);
    }

    #[tokio::test]
    async fn missing_catalog_fails_before_any_remote_call() {
        let server = MockServer::start().await;
        // No mocks mounted: any request would 404 and fail differently.

        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(&server, dir.path());

        let err = run_match(&config, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, InvoiceMatchError::Validation { .. }));
        assert!(err.to_string().contains("catalog file not found"));
        assert_eq!(server.received_requests().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn document_failure_propagates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/add"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(&server, dir.path());
        std::fs::create_dir_all(&config.catalog_dir).unwrap();
        std::fs::write(config.catalog_dir.join("catalog.csv"), "B9,Widget Pro\n").unwrap();

        let err = run_match(&config, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, InvoiceMatchError::Service { .. }));
    }
}
