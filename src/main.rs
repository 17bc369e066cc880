mod batch;
mod config;
mod error;
mod llm;
mod logger;
mod report;
mod repair;

#[cfg(test)]
mod testing;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::batch::{document::DocumentArgs, repair::RepairArgs, routes::RoutesArgs};
use crate::config::Config;
use crate::report::{MergeArgs, ReportArgs};

#[derive(Parser)]
#[command(
    name = "testscribe",
    version,
    about = "Repairs failing Pest tests with an LLM, documents them, and builds test reports."
)]
struct Cli {
    /// Config file [default: <config dir>/testscribe/config.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run each failing test, ask the LLM for a fix, repeat until it passes
    Repair(RepairArgs),
    /// Write IEEE 829 test case documentation for each test file
    Document(DocumentArgs),
    /// Generate one integration test per route declaration
    Routes(RoutesArgs),
    /// Concatenate documentation files into one combined file
    Merge(MergeArgs),
    /// Render a combined documentation file as a paginated report
    Report(ReportArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logger::init(cli.verbose);

    let cfg = Config::load(cli.config.as_deref())?;
    debug!(provider = ?cfg.llm.provider, model = %cfg.llm.model, "config loaded");

    match cli.command {
        CliCommand::Repair(args) => batch::repair::run(args, &cfg)?,
        CliCommand::Document(args) => batch::document::run(args, &cfg)?,
        CliCommand::Routes(args) => batch::routes::run(args, &cfg)?,
        CliCommand::Merge(args) => report::run_merge(args)?,
        CliCommand::Report(args) => report::run_report(args)?,
    }

    Ok(())
}
