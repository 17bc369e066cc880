//! Combines per-file documentation and turns it into a paginated report.

pub mod merge;
pub mod parse;
pub mod render;

use std::fs;
use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::error::{Result, ScribeError};

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[arg(long, default_value = "tests/results", help = "Directory of documentation files")]
    pub input: PathBuf,

    #[arg(long, default_value = "combined_results.txt", help = "Combined output file")]
    pub output: PathBuf,

    #[arg(short, long, help = "Include sub-directories")]
    pub recursive: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long, default_value = "combined_results.txt", help = "Merged documentation file")]
    pub input: PathBuf,

    #[arg(long, default_value = "test_report.txt", help = "Report output file")]
    pub output: PathBuf,

    #[arg(long, default_value = "Test Case Documentation Report")]
    pub title: String,
}

pub fn run_merge(args: MergeArgs) -> Result<()> {
    let count = merge::merge_to_file(&args.input, args.recursive, &args.output)?;
    if count == 0 {
        println!("No .txt files found in {}", args.input.display());
    } else {
        println!("Merged {count} files into {}", args.output.display());
    }
    Ok(())
}

pub fn run_report(args: ReportArgs) -> Result<()> {
    let combined =
        fs::read_to_string(&args.input).map_err(|e| ScribeError::io(&args.input, e))?;

    let sections = parse::parse(&combined);
    let records: usize = sections.iter().map(|s| s.records.len()).sum();
    info!("parsed {} files, {records} test cases", sections.len());

    if sections.is_empty() {
        println!("No test cases found in {}", args.input.display());
        return Ok(());
    }

    let text = render::render(&sections, &args.title);
    fs::write(&args.output, text).map_err(|e| ScribeError::io(&args.output, e))?;

    println!(
        "Report written to {} ({} files, {records} test cases)",
        args.output.display(),
        sections.len()
    );
    Ok(())
}
