//! Bounded verdict → rewrite loop for a single artifact.
//!
//! The artifact is repaired in place: the checker always runs against
//! `working_path`, and the on-disk content before attempt `k` is exactly the
//! candidate produced by attempt `k - 1`.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use similar::{ChangeTag, TextDiff};
use tracing::{debug, info, warn};

use crate::error::{Result, ScribeError};
use crate::llm::backend::{strip_code_fences, Oracle};
use crate::llm::budget::TokenBudget;
use crate::llm::prompt::PromptTemplate;
use crate::repair::diagnostics::{clip, extract, STREAM_CAP};
use crate::repair::verdict::{Checker, Verdict};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub working_path: PathBuf,
    pub output_path: PathBuf,
    /// Extra copies written next to `output_path` on success.
    pub mirrors: Vec<PathBuf>,
}

impl Artifact {
    pub fn new(working_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        let working_path = working_path.into();
        let name = working_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| working_path.display().to_string());

        Self {
            name,
            working_path,
            output_path: output_path.into(),
            mirrors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RepairPolicy {
    pub max_attempts: u32,
    #[serde(with = "secs")]
    pub attempt_delay: Duration,
    /// Upper bound on the failure excerpt embedded in a repair prompt.
    pub excerpt_cap: usize,
    #[serde(skip)]
    pub budget: TokenBudget,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_delay: Duration::from_secs(6),
            excerpt_cap: 1500,
            budget: TokenBudget::default(),
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        f64::deserialize(d).map(Duration::from_secs_f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Output already present; no attempts spent.
    AlreadyDone,
    Repaired { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl RepairOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, RepairOutcome::Exhausted { .. })
    }
}

/// One failed attempt, alive only until the next candidate is produced.
#[derive(Debug)]
struct AttemptRecord<'v> {
    attempt: u32,
    verdict: &'v Verdict,
    excerpt: String,
}

pub struct RepairLoop<'a> {
    checker: &'a dyn Checker,
    oracle: &'a dyn Oracle,
    policy: RepairPolicy,
    template: PromptTemplate,
}

impl<'a> RepairLoop<'a> {
    pub fn new(
        checker: &'a dyn Checker,
        oracle: &'a dyn Oracle,
        policy: RepairPolicy,
        template: PromptTemplate,
    ) -> Self {
        Self {
            checker,
            oracle,
            policy,
            template,
        }
    }

    /// Only I/O on the artifact's own files escapes as `Err`.
    pub fn run(&self, artifact: &Artifact) -> Result<RepairOutcome> {
        if artifact.output_path.exists() {
            info!(
                "skipping {}: already exists in {}",
                artifact.name,
                artifact.output_path.display()
            );
            return Ok(RepairOutcome::AlreadyDone);
        }

        let mut current = read(&artifact.working_path)?;
        let max = self.policy.max_attempts;

        for attempt in 1..=max {
            info!("attempt {attempt}/{max} for {}", artifact.name);
            let verdict = self.checker.check(&artifact.working_path);

            if verdict.success {
                info!("PASS {}", artifact.name);
                self.persist_success(artifact, &current)?;
                return Ok(RepairOutcome::Repaired { attempts: attempt });
            }

            let record = AttemptRecord {
                attempt,
                verdict: &verdict,
                excerpt: clip(&extract(&verdict.stdout, &verdict.stderr), self.policy.excerpt_cap)
                    .to_string(),
            };
            warn!(
                timed_out = record.verdict.timed_out,
                exit = record.verdict.exit_code.unwrap_or(-1),
                secs = record.verdict.duration.as_secs_f64(),
                "FAIL {} (attempt {})",
                artifact.name,
                record.attempt
            );
            debug!("failure excerpt:\n{}", clip(&record.excerpt, STREAM_CAP));

            let next = self.rewrite(artifact, &record, &current);
            write(&artifact.working_path, &next)?;
            current = next;

            if attempt < max && !self.policy.attempt_delay.is_zero() {
                info!(
                    "waiting {}s before next attempt",
                    self.policy.attempt_delay.as_secs_f64()
                );
                thread::sleep(self.policy.attempt_delay);
            }
        }

        warn!("{} still failing after {max} attempts", artifact.name);
        Ok(RepairOutcome::Exhausted { attempts: max })
    }

    /// Asks the oracle for a replacement. Any oracle failure keeps `current`.
    fn rewrite(&self, artifact: &Artifact, record: &AttemptRecord<'_>, current: &str) -> String {
        let mut prompt = self
            .template
            .render(&[
                ("artifact", artifact.name.as_str()),
                ("excerpt", record.excerpt.as_str()),
                ("content", current),
            ])
            .with_temperature(0.0);
        prompt.user = self.policy.budget.trim_lines(&prompt.user);

        let reply = match self.oracle.complete(&prompt) {
            Ok(r) => r,
            Err(e) => {
                warn!("oracle error, keeping current content: {e}");
                return current.to_string();
            }
        };

        debug!(prompt_hash = %reply.prompt_hash, "oracle replied");
        let code = strip_code_fences(&reply.text);
        if code.trim().is_empty() {
            warn!("oracle returned empty content, keeping current content");
            return current.to_string();
        }

        match changed_lines(current, &code) {
            0 => warn!("oracle rewrite identical to current content (no progress)"),
            n => info!("oracle rewrite changed {n} lines"),
        }

        code
    }

    fn persist_success(&self, artifact: &Artifact, content: &str) -> Result<()> {
        write(&artifact.output_path, content)?;
        info!("saved to {}", artifact.output_path.display());

        for mirror in &artifact.mirrors {
            if let Err(e) = write(mirror, content) {
                warn!("could not write mirror copy: {e}");
            }
        }
        Ok(())
    }
}

fn changed_lines(old: &str, new: &str) -> usize {
    TextDiff::from_lines(old, new)
        .iter_all_changes()
        .filter(|c| c.tag() != ChangeTag::Equal)
        .count()
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| ScribeError::io(path, e))
}

pub(crate) fn write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ScribeError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| ScribeError::io(path, e))
}
