use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use tracing::{error, info, warn};

use crate::batch::summary::RunSummary;
use crate::batch::{discover, output_path_for, pause, BatchCounts, OutputLayout};
use crate::config::Config;
use crate::error::{Result, ScribeError};
use crate::llm::client::LlmClient;
use crate::llm::prompt::PromptTemplate;
use crate::repair::engine::{Artifact, RepairLoop, RepairOutcome};
use crate::repair::verdict::CommandChecker;

#[derive(Args, Debug, Clone, Default)]
pub struct RepairArgs {
    #[arg(long, help = "Named profile from the config file")]
    pub profile: Option<String>,

    #[arg(long, help = "Directory holding the failing test files [default: tests/filtered]")]
    pub input: Option<PathBuf>,

    #[arg(long, help = "Directory receiving passing files [default: tests/correct-tc]")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Glob relative to the input directory [default: *.php]")]
    pub pattern: Option<String>,

    #[arg(long, help = "Attempts per file before giving up")]
    pub max_attempts: Option<u32>,

    #[arg(long, help = "Seconds to wait between attempts and between files")]
    pub delay: Option<f64>,

    #[arg(long, help = "Test runner timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long = "mirror", help = "Extra directory that receives a copy of each passing file")]
    pub mirrors: Vec<PathBuf>,

    #[arg(long, default_value_t = false, help = "Do not check the test runner at startup")]
    pub skip_probe: bool,
}

/// Resolved inputs of one repair batch.
#[derive(Debug, Clone)]
pub struct RepairPlan {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub pattern: String,
    pub layout: OutputLayout,
    pub mirror_roots: Vec<PathBuf>,
    pub delay: Duration,
}

impl RepairPlan {
    pub fn artifacts(&self) -> Result<Vec<Artifact>> {
        let files = discover(&self.input_root, &self.pattern)?;

        Ok(files
            .into_iter()
            .map(|path| {
                let out = self.output_for(&self.output_root, &path);
                let mut artifact = Artifact::new(&path, out);
                artifact.mirrors = self
                    .mirror_roots
                    .iter()
                    .map(|root| self.output_for(root, &path))
                    .collect();
                artifact
            })
            .collect())
    }

    fn output_for(&self, root: &Path, input: &Path) -> PathBuf {
        output_path_for(&self.input_root, root, input, self.layout, None)
    }
}

pub fn run(args: RepairArgs, cfg: &Config) -> Result<()> {
    let profile = cfg.profile(args.profile.as_deref())?;
    let template = profile.template(PromptTemplate::repair())?;

    let mut policy = cfg.repair.clone();
    if let Some(n) = args.max_attempts {
        policy.max_attempts = n.max(1);
    }
    if let Some(d) = args.delay {
        policy.attempt_delay = Duration::from_secs_f64(d.max(0.0));
    }

    let mut mirror_roots = profile.mirror_dirs.clone();
    mirror_roots.extend(args.mirrors.iter().cloned());

    let plan = RepairPlan {
        input_root: args
            .input
            .or(profile.input_dir)
            .unwrap_or_else(|| PathBuf::from("tests/filtered")),
        output_root: args
            .output
            .or(profile.output_dir)
            .unwrap_or_else(|| PathBuf::from("tests/correct-tc")),
        pattern: args
            .pattern
            .or(profile.pattern)
            .unwrap_or_else(|| "*.php".into()),
        layout: profile.layout.unwrap_or_default(),
        mirror_roots,
        delay: args
            .delay
            .map(|d| Duration::from_secs_f64(d.max(0.0)))
            .unwrap_or_else(|| cfg.batch_delay()),
    };

    let client = LlmClient::new(cfg.provider_config()?)?;

    let timeout = Duration::from_secs(args.timeout.unwrap_or(cfg.runner.timeout_secs));
    let mut checker = CommandChecker::from_command(&cfg.runner.command, timeout)?;
    if let Some(dir) = &cfg.runner.working_dir {
        checker = checker.with_working_dir(dir);
    }
    if !args.skip_probe {
        let version = checker.probe()?;
        info!("test runner found: {version}");
    }

    let artifacts = plan.artifacts()?;
    if artifacts.is_empty() {
        println!(
            "No files matching {} in {}",
            plan.pattern,
            plan.input_root.display()
        );
        return Ok(());
    }
    info!("found {} test files", artifacts.len());

    let repair = RepairLoop::new(&checker, &client, policy, template);
    let (summary, counts) = repair_all(&artifacts, &repair, plan.delay);

    match summary.write(&plan.output_root) {
        Ok(path) => println!("Summary saved to: {}", path.display()),
        Err(e) => error!("could not write summary: {e}"),
    }

    println!(
        "Total: {}, ✅ Passed: {}, ❌ Failed: {}",
        summary.entries().len(),
        summary.passed(),
        summary.failed()
    );
    counts.print("Repair", &plan.output_root);
    Ok(())
}

/// Drives every artifact to `Repaired` or `Exhausted`, one at a time.
pub fn repair_all(
    artifacts: &[Artifact],
    repair: &RepairLoop<'_>,
    delay: Duration,
) -> (RunSummary, BatchCounts) {
    let mut summary = RunSummary::new();
    let mut counts = BatchCounts::default();
    info!("run {}", summary.run_id());

    for (i, artifact) in artifacts.iter().enumerate() {
        info!("file {}/{}: {}", i + 1, artifacts.len(), artifact.name);

        if !artifact.output_path.exists() {
            match fs::read_to_string(&artifact.working_path) {
                Ok(code) if code.trim().is_empty() => {
                    info!("empty file, skipping {}", artifact.name);
                    counts.skipped += 1;
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    // never reached the runner, so no pause either
                    error!("{}", ScribeError::io(&artifact.working_path, e));
                    counts.failed += 1;
                    summary.record(&artifact.name, false);
                    continue;
                }
            }
        }

        match repair.run(artifact) {
            Ok(outcome) => {
                summary.record(&artifact.name, outcome.is_success());
                match outcome {
                    RepairOutcome::AlreadyDone => {
                        counts.skipped += 1;
                        continue;
                    }
                    RepairOutcome::Repaired { attempts } => {
                        info!("{} passed after {attempts} attempt(s)", artifact.name);
                        counts.processed += 1;
                    }
                    RepairOutcome::Exhausted { attempts } => {
                        warn!("{} failed after {attempts} attempts", artifact.name);
                        counts.failed += 1;
                    }
                }
            }
            Err(e) => {
                error!("{}: {e}", artifact.name);
                counts.failed += 1;
                summary.record(&artifact.name, false);
            }
        }

        if i + 1 < artifacts.len() {
            pause(delay);
        }
    }

    (summary, counts)
}
