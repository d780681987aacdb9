//! Application configuration for invoicematch.
//!
//! User config lives at `~/.invoicematch/invoicematch.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{InvoiceMatchError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "invoicematch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".invoicematch";

// ---------------------------------------------------------------------------
// Config structs (matching invoicematch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Document (OCR) service settings.
    #[serde(default)]
    pub document: DocumentConfig,

    /// Assistant API settings.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Polling intervals and deadlines.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Local input/output directories.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// `[document]` section — the OCR document service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Base URL of the document service (e.g. `https://ocr.example.com/demo`).
    #[serde(default)]
    pub endpoint: String,

    /// Blob storage URL prefix prepended to vendor file names.
    #[serde(default)]
    pub blob_url: String,
}

/// `[assistant]` section — the hosted assistant (thread/run) API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Base URL of the assistant API.
    #[serde(default)]
    pub endpoint: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API version sent as a query parameter on every request.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Model name passed when starting a run.
    #[serde(default = "default_model")]
    pub model: String,

    /// Assistant that extracts line items from OCR text.
    #[serde(default)]
    pub extractor_assistant_id: String,

    /// Assistant that matches vendor items against the catalog.
    #[serde(default)]
    pub matching_assistant_id: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key_env: default_api_key_env(),
            api_version: default_api_version(),
            model: default_model(),
            extractor_assistant_id: String::new(),
            matching_assistant_id: String::new(),
        }
    }
}

fn default_api_key_env() -> String {
    "INVOICEMATCH_ASSISTANT_API_KEY".into()
}
fn default_api_version() -> String {
    "2024-05-01-preview".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}

/// `[polling]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between document status checks, in milliseconds.
    #[serde(default = "default_document_interval_ms")]
    pub document_interval_ms: u64,

    /// Overall deadline for OCR extraction, in seconds.
    #[serde(default = "default_document_deadline_secs")]
    pub document_deadline_secs: u64,

    /// Interval between thread message-list checks, in milliseconds.
    #[serde(default = "default_assistant_interval_ms")]
    pub assistant_interval_ms: u64,

    /// Overall deadline for an assistant reply, in seconds.
    #[serde(default = "default_assistant_deadline_secs")]
    pub assistant_deadline_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            document_interval_ms: default_document_interval_ms(),
            document_deadline_secs: default_document_deadline_secs(),
            assistant_interval_ms: default_assistant_interval_ms(),
            assistant_deadline_secs: default_assistant_deadline_secs(),
        }
    }
}

fn default_document_interval_ms() -> u64 {
    1500
}
fn default_document_deadline_secs() -> u64 {
    120
}
fn default_assistant_interval_ms() -> u64 {
    5000
}
fn default_assistant_deadline_secs() -> u64 {
    300
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding local catalog files.
    #[serde(default = "default_catalog_dir")]
    pub catalog_dir: String,

    /// Directory for plain-text log artifacts.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Directory for the output workbook and run manifest.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalog_dir: default_catalog_dir(),
            log_dir: default_log_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_catalog_dir() -> String {
    "input/catalog".into()
}
fn default_log_dir() -> String {
    "log".into()
}
fn default_output_dir() -> String {
    "output".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.invoicematch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| InvoiceMatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.invoicematch/invoicematch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| InvoiceMatchError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        InvoiceMatchError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| InvoiceMatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| InvoiceMatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| InvoiceMatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the assistant API key env var is set and non-empty, and that
/// the remote endpoints are valid URLs.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    for (name, value) in [
        ("document.endpoint", &config.document.endpoint),
        ("assistant.endpoint", &config.assistant.endpoint),
    ] {
        url::Url::parse(value).map_err(|e| {
            InvoiceMatchError::config(format!("{name} is not a valid URL ({value:?}): {e}"))
        })?;
    }

    let var_name = &config.assistant.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(InvoiceMatchError::config(format!(
            "assistant API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("blob_url"));
        assert!(toml_str.contains("INVOICEMATCH_ASSISTANT_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.polling.document_interval_ms, 1500);
        assert_eq!(parsed.polling.assistant_interval_ms, 5000);
        assert_eq!(parsed.assistant.api_key_env, "INVOICEMATCH_ASSISTANT_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[document]
endpoint = "https://ocr.example.com/demo"
blob_url = "https://blob.example.com/invoices/"

[assistant]
endpoint = "https://ai.example.com/openai"
extractor_assistant_id = "asst_extract"
matching_assistant_id = "asst_match"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.document.endpoint, "https://ocr.example.com/demo");
        assert_eq!(config.assistant.matching_assistant_id, "asst_match");
        assert_eq!(config.polling.document_deadline_secs, 120);
        assert_eq!(config.paths.log_dir, "log");
    }

    #[test]
    fn api_key_validation_reports_missing_var() {
        let mut config = AppConfig::default();
        config.document.endpoint = "https://ocr.example.com/demo".into();
        config.assistant.endpoint = "https://ai.example.com/openai".into();
        // Use a unique env var name to avoid interfering with other tests
        config.assistant.api_key_env = "IM_TEST_NONEXISTENT_KEY_98765".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn bad_endpoint_rejected_before_key_lookup() {
        let mut config = AppConfig::default();
        config.document.endpoint = "not a url".into();
        let err = validate_api_key(&config).unwrap_err();
        assert!(err.to_string().contains("document.endpoint"));
    }
}
