use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, ScribeError};

pub const SUMMARY_MD: &str = "SUMMARY.md";
pub const SUMMARY_JSON: &str = "summary.json";

/// Ordered (artifact, success) pairs for one batch run. Append-only.
#[derive(Debug, Clone)]
pub struct RunSummary {
    run_id: Uuid,
    started_at: DateTime<Local>,
    entries: Vec<(String, bool)>,
}

#[derive(Serialize)]
struct SummaryJson<'a> {
    run_id: String,
    generated_at: String,
    total: usize,
    passed: usize,
    failed: usize,
    results: Vec<EntryJson<'a>>,
}

#[derive(Serialize)]
struct EntryJson<'a> {
    artifact: &'a str,
    success: bool,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Local::now(),
            entries: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record(&mut self, artifact: impl Into<String>, success: bool) {
        self.entries.push((artifact.into(), success));
    }

    pub fn entries(&self) -> &[(String, bool)] {
        &self.entries
    }

    pub fn passed(&self) -> usize {
        self.entries.iter().filter(|(_, ok)| *ok).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.passed()
    }

    pub fn to_markdown(&self) -> String {
        let mut s = String::new();
        s.push_str("# Test Results\n");
        s.push_str(&format!("Generated: {}\n\n", self.started_at.to_rfc3339()));
        s.push_str(&format!("Total files: {}\n", self.entries.len()));
        s.push_str(&format!("Passed: {}\n", self.passed()));
        s.push_str(&format!("Failed: {}\n\n", self.failed()));
        s.push_str("## Details:\n");

        for (name, ok) in &self.entries {
            let mark = if *ok { "✅" } else { "❌" };
            s.push_str(&format!("- {mark} {name}\n"));
        }
        s
    }

    pub fn to_json(&self) -> Result<String> {
        let payload = SummaryJson {
            run_id: self.run_id.to_string(),
            generated_at: self.started_at.to_rfc3339(),
            total: self.entries.len(),
            passed: self.passed(),
            failed: self.failed(),
            results: self
                .entries
                .iter()
                .map(|(artifact, success)| EntryJson {
                    artifact,
                    success: *success,
                })
                .collect(),
        };

        serde_json::to_string_pretty(&payload).map_err(|e| ScribeError::Response(e.to_string()))
    }

    /// Writes `SUMMARY.md` and `summary.json` into `dir`; returns the markdown path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| ScribeError::io(dir, e))?;

        let md = dir.join(SUMMARY_MD);
        fs::write(&md, self.to_markdown()).map_err(|e| ScribeError::io(&md, e))?;

        let json = dir.join(SUMMARY_JSON);
        fs::write(&json, self.to_json()?).map_err(|e| ScribeError::io(&json, e))?;

        Ok(md)
    }
}
