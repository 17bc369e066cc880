use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use regex::Regex;
use tracing::{error, info, warn};

use crate::batch::{discover, pause, BatchCounts};
use crate::config::Config;
use crate::error::{Result, ScribeError};
use crate::llm::backend::{clean_quotes, strip_code_fences, Oracle};
use crate::llm::budget::TokenBudget;
use crate::llm::client::LlmClient;
use crate::llm::prompt::PromptTemplate;
use crate::repair::engine::write;

#[derive(Args, Debug, Clone, Default)]
pub struct RoutesArgs {
    #[arg(long, help = "Named profile from the config file")]
    pub profile: Option<String>,

    #[arg(long, help = "Directory holding the route files [default: routes]")]
    pub input: Option<PathBuf>,

    #[arg(long, help = "Directory receiving generated tests [default: tests/Integration]")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Seconds to wait after each generated test")]
    pub delay: Option<f64>,
}

const ROUTE_VERBS: &str = "get|post|put|patch|delete|any|match|resource|apiResource";

/// Route declarations in source order, comments removed.
pub fn extract_routes(source: &str) -> Result<Vec<String>> {
    let comments = Regex::new(r"//[^\n]*|(?s:/\*.*?\*/)")
        .map_err(|e| ScribeError::Pattern(e.to_string()))?;
    let route = Regex::new(&format!(r"(?s)Route::({ROUTE_VERBS})\s*\(.*?\);"))
        .map_err(|e| ScribeError::Pattern(e.to_string()))?;

    let stripped = comments.replace_all(source, "");
    Ok(route
        .find_iter(&stripped)
        .map(|m| m.as_str().trim().to_string())
        .collect())
}

/// `web.php`, route 2 → `web_Route2_Test.php`.
pub fn route_test_name(route_file: &Path, index: usize) -> String {
    let stem = route_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "routes".into());
    format!("{stem}_Route{index}_Test.php")
}

pub fn run(args: RoutesArgs, cfg: &Config) -> Result<()> {
    let profile = cfg.profile(args.profile.as_deref())?;
    let template = profile.template(PromptTemplate::route())?;

    let input = args
        .input
        .or(profile.input_dir)
        .unwrap_or_else(|| PathBuf::from("routes"));
    let output = args
        .output
        .or(profile.output_dir)
        .unwrap_or_else(|| PathBuf::from("tests/Integration"));
    let pattern = profile.pattern.unwrap_or_else(|| "*.php".into());
    let delay = args
        .delay
        .map(|d| Duration::from_secs_f64(d.max(0.0)))
        .unwrap_or_else(|| cfg.batch_delay());

    let client = LlmClient::new(cfg.provider_config()?)?;

    let files = discover(&input, &pattern)?;
    if files.is_empty() {
        println!("No route files in {}", input.display());
        return Ok(());
    }

    let counts = generate_all(&files, &output, &client, &template, &cfg.budget, delay);
    counts.print("Route test generation", &output);
    Ok(())
}

pub fn generate_all(
    route_files: &[PathBuf],
    output_root: &Path,
    oracle: &dyn Oracle,
    template: &PromptTemplate,
    budget: &TokenBudget,
    delay: Duration,
) -> BatchCounts {
    let mut counts = BatchCounts::default();

    for file in route_files {
        let source = match fs::read_to_string(file) {
            Ok(s) => s,
            Err(e) => {
                error!("{}", ScribeError::io(file, e));
                counts.failed += 1;
                continue;
            }
        };

        let routes = match extract_routes(&source) {
            Ok(r) => r,
            Err(e) => {
                error!("{}: {e}", file.display());
                counts.failed += 1;
                continue;
            }
        };
        info!("{}: {} routes", file.display(), routes.len());

        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for (i, route) in routes.iter().enumerate() {
            let out = output_root.join(route_test_name(file, i + 1));
            if out.exists() {
                info!("skipping, test exists: {}", out.display());
                counts.skipped += 1;
                continue;
            }

            let mut prompt =
                template.render(&[("artifact", file_name.as_str()), ("route", route.as_str())]);
            prompt.user = budget.trim(&prompt.user);

            match oracle.complete(&prompt) {
                Ok(reply) => {
                    let code = strip_code_fences(&clean_quotes(&reply.text));
                    if code.is_empty() {
                        warn!("empty reply for route {} of {}", i + 1, file_name);
                        counts.failed += 1;
                    } else if let Err(e) = write(&out, &code) {
                        error!("{e}");
                        counts.failed += 1;
                    } else {
                        info!("generated {}", out.display());
                        counts.processed += 1;
                    }
                }
                Err(e) => {
                    error!("route {} of {}: {e}", i + 1, file_name);
                    counts.failed += 1;
                }
            }
            pause(delay);
        }
    }

    counts
}
