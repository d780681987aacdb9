//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use invoicematch_core::pipeline::{MatchConfig, MatchRunResult, ProgressReporter, run_match};
use invoicematch_shared::{AppConfig, PollPolicy, init_config, load_config, validate_api_key};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// invoicematch — reconcile vendor invoices against the product catalog.
#[derive(Parser)]
#[command(
    name = "invoicematch",
    version,
    about = "Match vendor invoice line items against the product catalog via OCR and hosted assistants.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the match pipeline for one vendor/catalog file pair.
    Match {
        /// Vendor invoice file name (prompted for when omitted).
        #[arg(long)]
        vendor_file: Option<String>,

        /// Catalog file name (prompted for when omitted).
        #[arg(long)]
        catalog_file: Option<String>,

        /// Output directory for the workbook (defaults to config paths.output_dir).
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "invoicematch=info",
        1 => "invoicematch=debug",
        _ => "invoicematch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Match {
            vendor_file,
            catalog_file,
            out,
        } => cmd_match(vendor_file, catalog_file, out.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// match command
// ---------------------------------------------------------------------------

async fn cmd_match(
    vendor_file: Option<String>,
    catalog_file: Option<String>,
    out: Option<&str>,
) -> Result<()> {
    // Validate config and API key before doing anything
    let config = load_config()?;
    let api_key = validate_api_key(&config)?;

    for (name, value) in [
        (
            "assistant.extractor_assistant_id",
            &config.assistant.extractor_assistant_id,
        ),
        (
            "assistant.matching_assistant_id",
            &config.assistant.matching_assistant_id,
        ),
    ] {
        if value.is_empty() {
            return Err(eyre!(
                "{name} is not set — run `invoicematch config init` and edit the config file"
            ));
        }
    }

    let vendor_file = prompt_if_missing(vendor_file, "Vendor invoice file name")?;
    let catalog_file = prompt_if_missing(catalog_file, "Catalog file name")?;

    let output_dir = match out {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from(&config.paths.output_dir),
    };

    let match_config = MatchConfig {
        vendor_file: vendor_file.clone(),
        catalog_file: catalog_file.clone(),
        document: config.document.clone(),
        assistant: config.assistant.clone(),
        api_key,
        document_poll: PollPolicy::from_millis_secs(
            config.polling.document_interval_ms,
            config.polling.document_deadline_secs,
        ),
        assistant_poll: PollPolicy::from_millis_secs(
            config.polling.assistant_interval_ms,
            config.polling.assistant_deadline_secs,
        ),
        catalog_dir: PathBuf::from(&config.paths.catalog_dir),
        log_dir: PathBuf::from(&config.paths.log_dir),
        output_dir,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    info!(vendor = %vendor_file, catalog = %catalog_file, "starting match run");

    let reporter = CliProgress::new();
    let result = run_match(&match_config, &reporter).await?;

    println!();
    println!("  Match run complete!");
    println!("  Records:    {}", result.record_count);
    println!("  Workbook:   {}", result.workbook_path.display());
    println!("  Manifest:   {}", result.manifest_path.display());
    println!("  OCR:        {:.1}s", result.ocr_elapsed.as_secs_f64());
    println!(
        "  Extraction: {:.1}s",
        result.extraction_elapsed.as_secs_f64()
    );
    println!(
        "  Matching:   {:.1}s",
        result.matching_elapsed.as_secs_f64()
    );
    println!("  Total:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

/// Use the flag value when given, otherwise prompt interactively.
fn prompt_if_missing(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => {
            let answer: String = Input::new()
                .with_prompt(prompt)
                .interact_text()
                .map_err(|e| eyre!("failed to read {prompt}: {e}"))?;
            if answer.trim().is_empty() {
                return Err(eyre!("{prompt} must not be empty"));
            }
            Ok(answer.trim().to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &MatchRunResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
