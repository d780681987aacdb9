//! invoicematch CLI — vendor invoice reconciliation tool.
//!
//! Runs a vendor invoice through OCR and two hosted assistants, matches the
//! extracted line items against a local product catalog, and writes the
//! reconciled matches to a workbook.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
