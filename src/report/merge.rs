use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, ScribeError};

pub const FILE_RULE_WIDTH: usize = 50;

/// Concatenates every `.txt` under `dir` except `exclude`, each behind a
/// `FILE: <relative path>` header. Returns the text and the file count.
pub fn merge(dir: &Path, recursive: bool, exclude: Option<&Path>) -> Result<(String, usize)> {
    let files = collect(dir, recursive, exclude)?;
    Ok((render(dir, &files)?, files.len()))
}

/// Writes the merged text to `out` and returns how many files went in.
/// `out` itself is never merged, so re-running over the same directory is
/// stable.
pub fn merge_to_file(dir: &Path, recursive: bool, out: &Path) -> Result<usize> {
    let (combined, count) = merge(dir, recursive, Some(out))?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ScribeError::io(parent, e))?;
    }
    fs::write(out, combined).map_err(|e| ScribeError::io(out, e))?;
    Ok(count)
}

fn collect(dir: &Path, recursive: bool, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ScribeError::Config(format!(
            "results directory not found: {}",
            dir.display()
        )));
    }

    let excluded = exclude.and_then(|p| fs::canonicalize(p).ok());
    let depth = if recursive { usize::MAX } else { 1 };

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!("skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .filter(|p| match (&excluded, fs::canonicalize(p)) {
            (Some(x), Ok(c)) => &c != x,
            _ => true,
        })
        .collect();

    files.sort();
    Ok(files)
}

fn render(dir: &Path, files: &[PathBuf]) -> Result<String> {
    let rule = "=".repeat(FILE_RULE_WIDTH);
    let mut out = String::new();

    for path in files {
        let body = fs::read_to_string(path).map_err(|e| ScribeError::io(path, e))?;
        let rel = relative_label(dir, path);
        debug!("merging {rel}");

        out.push_str(&rule);
        out.push('\n');
        out.push_str(&format!("FILE: {rel}\n\n"));
        out.push_str(body.trim_end());
        out.push_str("\n\n");
    }

    Ok(out)
}

/// Relative path with `/` separators on every platform.
fn relative_label(dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(dir).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
