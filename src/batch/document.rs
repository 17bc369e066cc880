use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use tracing::{error, info, warn};

use crate::batch::{discover, output_path_for, pause, BatchCounts, OutputLayout};
use crate::config::Config;
use crate::error::{Result, ScribeError};
use crate::llm::backend::Oracle;
use crate::llm::budget::TokenBudget;
use crate::llm::client::LlmClient;
use crate::llm::prompt::PromptTemplate;
use crate::repair::engine::write;

#[derive(Args, Debug, Clone, Default)]
pub struct DocumentArgs {
    #[arg(long, help = "Named profile from the config file")]
    pub profile: Option<String>,

    #[arg(long, help = "Directory holding the test files [default: tests/Unit]")]
    pub input: Option<PathBuf>,

    #[arg(long, help = "Directory receiving the documentation [default: tests/results]")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Glob relative to the input directory [default: **/*.php]")]
    pub pattern: Option<String>,

    #[arg(long, help = "Keep the input's sub-directories in the output")]
    pub mirror_layout: bool,

    #[arg(long, help = "Extension of the generated files [default: txt]")]
    pub extension: Option<String>,

    #[arg(long, help = "Seconds to wait after each generated file")]
    pub delay: Option<f64>,
}

/// Resolved inputs of one documentation batch.
#[derive(Debug, Clone)]
pub struct DocumentPlan {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub pattern: String,
    pub layout: OutputLayout,
    pub extension: String,
    pub prefix_rules: BTreeMap<String, String>,
    pub delay: Duration,
}

pub fn run(args: DocumentArgs, cfg: &Config) -> Result<()> {
    let profile = cfg.profile(args.profile.as_deref())?;
    let template = profile.template(PromptTemplate::document())?;

    let layout = if args.mirror_layout {
        OutputLayout::Mirror
    } else {
        profile.layout.unwrap_or_default()
    };

    let plan = DocumentPlan {
        input_root: args
            .input
            .or(profile.input_dir)
            .unwrap_or_else(|| PathBuf::from("tests/Unit")),
        output_root: args
            .output
            .or(profile.output_dir)
            .unwrap_or_else(|| PathBuf::from("tests/results")),
        pattern: args
            .pattern
            .or(profile.pattern)
            .unwrap_or_else(|| "**/*.php".into()),
        layout,
        extension: args
            .extension
            .or(profile.extension)
            .unwrap_or_else(|| "txt".into()),
        prefix_rules: if profile.prefix_rules.is_empty() {
            default_prefix_rules()
        } else {
            profile.prefix_rules
        },
        delay: args
            .delay
            .map(|d| Duration::from_secs_f64(d.max(0.0)))
            .unwrap_or_else(|| cfg.batch_delay()),
    };

    let client = LlmClient::new(cfg.provider_config()?)?;

    let files = discover(&plan.input_root, &plan.pattern)?;
    if files.is_empty() {
        println!(
            "No files matching {} in {}",
            plan.pattern,
            plan.input_root.display()
        );
        return Ok(());
    }
    info!("found {} test files", files.len());

    let counts = document_all(&files, &plan, &client, &template, &cfg.budget);
    counts.print("Documentation", &plan.output_root);
    Ok(())
}

#[derive(Debug)]
enum Step {
    Skipped,
    Written,
    /// The oracle was called but nothing was written.
    Failed(ScribeError),
}

pub fn document_all(
    files: &[PathBuf],
    plan: &DocumentPlan,
    oracle: &dyn Oracle,
    template: &PromptTemplate,
    budget: &TokenBudget,
) -> BatchCounts {
    let mut counts = BatchCounts::default();

    for (i, path) in files.iter().enumerate() {
        let out = output_path_for(
            &plan.input_root,
            &plan.output_root,
            path,
            plan.layout,
            Some(&plan.extension),
        );
        info!("[{}/{}] {}", i + 1, files.len(), path.display());

        match document_one(path, &out, plan, oracle, template, budget) {
            Ok(Step::Skipped) => counts.skipped += 1,
            Ok(Step::Written) => {
                counts.processed += 1;
                info!("saved {}", out.display());
                pause(plan.delay);
            }
            Ok(Step::Failed(e)) => {
                error!("{}: {e}", path.display());
                counts.failed += 1;
                pause(plan.delay);
            }
            Err(e) => {
                error!("{}: {e}", path.display());
                counts.failed += 1;
            }
        }
    }

    counts
}

fn document_one(
    path: &Path,
    out: &Path,
    plan: &DocumentPlan,
    oracle: &dyn Oracle,
    template: &PromptTemplate,
    budget: &TokenBudget,
) -> Result<Step> {
    if out.exists() {
        info!("skipping, already documented: {}", out.display());
        return Ok(Step::Skipped);
    }

    let content = fs::read_to_string(path).map_err(|e| ScribeError::io(path, e))?;
    if content.trim().is_empty() {
        warn!("empty file, skipping {}", path.display());
        return Ok(Step::Skipped);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = test_id_prefix(path, &plan.prefix_rules);

    let mut prompt = template.render(&[
        ("artifact", name.as_str()),
        ("prefix", prefix.as_str()),
        ("content", content.as_str()),
    ]);
    prompt.user = budget.trim(&prompt.user);

    let reply = match oracle.complete(&prompt) {
        Ok(reply) => reply,
        Err(e) => return Ok(Step::Failed(e)),
    };
    let text = reply.text.trim();
    if text.is_empty() {
        return Ok(Step::Failed(ScribeError::Response(
            "empty documentation reply".into(),
        )));
    }

    Ok(match write(out, text) {
        Ok(()) => Step::Written,
        Err(e) => Step::Failed(e),
    })
}

fn default_prefix_rules() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Admin".to_string(), "Adm".to_string()),
        ("Customer".to_string(), "Cust".to_string()),
    ])
}

/// `AdminUserTest.php` under `.../Admin/` becomes `Adm-AUT`.
pub fn test_id_prefix(path: &Path, rules: &BTreeMap<String, String>) -> String {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let initials = extract_initials(&file);

    let dir = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    rules
        .iter()
        .find(|(fragment, _)| dir.contains(fragment.as_str()))
        .map(|(_, label)| format!("{label}-{initials}"))
        .unwrap_or(initials)
}

/// Capital letters of the base name, or its first three characters
/// upper-cased when it has none.
pub fn extract_initials(file_name: &str) -> String {
    let base = file_name
        .strip_suffix(".php")
        .unwrap_or(file_name)
        .replace("-Test", "");

    let caps: String = base.chars().filter(|c| c.is_ascii_uppercase()).collect();
    if !caps.is_empty() {
        return caps;
    }
    base.chars().take(3).collect::<String>().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOracle;

    #[test]
    fn initials_from_capitals_or_prefix() {
        assert_eq!(extract_initials("UserLoginTest.php"), "ULT");
        assert_eq!(extract_initials("Cart-Test.php"), "C");
        assert_eq!(extract_initials("helpers.php"), "HEL");
        assert_eq!(extract_initials("ab.php"), "AB");
    }

    #[test]
    fn prefix_rules_match_directory() {
        let rules = default_prefix_rules();
        assert_eq!(
            test_id_prefix(Path::new("tests/Unit/Admin/ProductTest.php"), &rules),
            "Adm-PT"
        );
        assert_eq!(
            test_id_prefix(Path::new("tests/Unit/Customer/OrderTest.php"), &rules),
            "Cust-OT"
        );
        assert_eq!(test_id_prefix(Path::new("tests/Unit/OrderTest.php"), &rules), "OT");
    }

    fn plan(root: &Path) -> DocumentPlan {
        DocumentPlan {
            input_root: root.join("Unit"),
            output_root: root.join("results"),
            pattern: "**/*.php".into(),
            layout: OutputLayout::Mirror,
            extension: "txt".into(),
            prefix_rules: default_prefix_rules(),
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn one_shot_batch_counts_every_case() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(dir.path());
        fs::create_dir_all(p.input_root.join("Admin")).unwrap();
        fs::create_dir_all(p.output_root.join("Admin")).unwrap();

        fs::write(p.input_root.join("Admin/AaTest.php"), "<?php a").unwrap();
        fs::write(p.input_root.join("Admin/BbTest.php"), "<?php b").unwrap();
        fs::write(p.output_root.join("Admin/BbTest.txt"), "old").unwrap();
        fs::write(p.input_root.join("CcTest.php"), "\n").unwrap();
        fs::write(p.input_root.join("DdTest.php"), "<?php d").unwrap();

        let files = discover(&p.input_root, &p.pattern).unwrap();
        assert_eq!(files.len(), 4);

        // AaTest gets a reply, DdTest gets an empty one
        let oracle = ScriptedOracle::replies(["Test ID: TC-Adm-AT-001\n", "  "]);
        let counts = document_all(
            &files,
            &p,
            &oracle,
            &PromptTemplate::document(),
            &TokenBudget::default(),
        );

        assert_eq!(
            counts,
            BatchCounts {
                processed: 1,
                skipped: 2,
                failed: 1
            }
        );
        assert_eq!(oracle.calls(), 2);
        assert_eq!(
            fs::read_to_string(p.output_root.join("Admin/AaTest.txt")).unwrap(),
            "Test ID: TC-Adm-AT-001"
        );
        assert_eq!(
            fs::read_to_string(p.output_root.join("Admin/BbTest.txt")).unwrap(),
            "old"
        );
        assert!(!p.output_root.join("DdTest.txt").exists());

        let prompts = oracle.prompts();
        assert!(prompts[0].user.contains("Adm-AT"));
        assert!(prompts[0].user.contains("<?php a"));
    }

    #[test]
    fn unreadable_input_is_a_failure_not_an_abort() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(dir.path());
        fs::create_dir_all(&p.input_root).unwrap();
        fs::write(p.input_root.join("OkTest.php"), "<?php ok").unwrap();

        let files = vec![p.input_root.join("GoneTest.php"), p.input_root.join("OkTest.php")];
        let oracle = ScriptedOracle::replies(["doc"]);
        let counts = document_all(
            &files,
            &p,
            &oracle,
            &PromptTemplate::document(),
            &TokenBudget::default(),
        );

        assert_eq!(counts.failed, 1);
        assert_eq!(counts.processed, 1);
        assert!(p.output_root.join("OkTest.txt").exists());
    }

    #[test]
    fn failed_write_after_a_reply_still_pauses() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = plan(dir.path());
        p.delay = Duration::from_millis(300);
        fs::create_dir_all(&p.input_root).unwrap();
        fs::write(p.input_root.join("OkTest.php"), "<?php ok").unwrap();
        // a regular file where the output directory should be
        fs::write(&p.output_root, "not a dir").unwrap();

        let files = vec![p.input_root.join("OkTest.php")];
        let oracle = ScriptedOracle::replies(["doc"]);
        let started = std::time::Instant::now();
        let counts = document_all(
            &files,
            &p,
            &oracle,
            &PromptTemplate::document(),
            &TokenBudget::default(),
        );

        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(counts.failed, 1);
        assert_eq!(oracle.calls(), 1);
    }

    #[test]
    fn unreadable_input_does_not_pause() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = plan(dir.path());
        p.delay = Duration::from_millis(500);

        let files = vec![p.input_root.join("GoneTest.php")];
        let oracle = ScriptedOracle::replies(["doc"]);
        let started = std::time::Instant::now();
        let counts = document_all(
            &files,
            &p,
            &oracle,
            &PromptTemplate::document(),
            &TokenBudget::default(),
        );

        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(counts.failed, 1);
        assert_eq!(oracle.calls(), 0);
    }
}
