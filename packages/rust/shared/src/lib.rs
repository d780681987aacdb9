//! Shared types, error model, and configuration for invoicematch.
//!
//! This crate is the foundation depended on by all other invoicematch crates.
//! It provides:
//! - [`InvoiceMatchError`] — the unified error type
//! - Domain types ([`MatchRecord`], [`DocumentStatus`], [`PollPolicy`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssistantConfig, DocumentConfig, PathsConfig, PollingConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{InvoiceMatchError, Result};
pub use types::{DocumentStatus, MATCH_HEADERS, MatchRecord, PollPolicy};
