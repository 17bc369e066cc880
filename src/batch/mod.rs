//! Artifact enumeration, output path derivation and pacing shared by the
//! `repair`, `document` and `routes` drivers.

pub mod document;
pub mod repair;
pub mod routes;
pub mod summary;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::{Result, ScribeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    /// Every output lands directly in the output root.
    #[default]
    Flat,
    /// Outputs keep the input's sub-directory structure.
    Mirror,
}

/// Sorted list of files under `root` matching `pattern` (glob syntax,
/// relative to `root`).
pub fn discover(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(ScribeError::Config(format!(
            "input directory not found: {}",
            root.display()
        )));
    }

    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let full = Path::new(&escaped).join(pattern);
    let full = full.to_string_lossy();

    let mut files: Vec<PathBuf> = glob::glob(&full)
        .map_err(|e| ScribeError::Pattern(format!("{full}: {e}")))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();

    files.sort();
    Ok(files)
}

/// Deterministic output location for `input`. `extension` replaces the
/// file extension when given (`"txt"` turns `A-Test.php` into `A-Test.txt`).
pub fn output_path_for(
    input_root: &Path,
    output_root: &Path,
    input: &Path,
    layout: OutputLayout,
    extension: Option<&str>,
) -> PathBuf {
    let rel = match layout {
        OutputLayout::Flat => input.file_name().map(PathBuf::from),
        OutputLayout::Mirror => input.strip_prefix(input_root).ok().map(Path::to_path_buf),
    }
    .unwrap_or_else(|| input.to_path_buf());

    let mut out = output_root.join(rel);
    if let Some(ext) = extension {
        out.set_extension(ext.trim_start_matches('.'));
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchCounts {
    pub fn print(&self, label: &str, output_root: &Path) {
        println!();
        println!("{label} complete");
        println!("  processed: {}", self.processed);
        println!("  skipped:   {}", self.skipped);
        println!("  failed:    {}", self.failed);
        println!("  output:    {}", output_root.display());
    }
}

/// Fixed pause between oracle-bound artifacts.
pub(crate) fn pause(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    info!("waiting {}s for rate limit", delay.as_secs_f64());
    thread::sleep(delay);
}
