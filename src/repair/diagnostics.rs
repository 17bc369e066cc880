//! Failure excerpt extraction from test runner output.
//!
//! Pure functions only. The excerpt is what the repair prompt sees, so it is
//! kept to a small window around the first failure marker.

/// Substrings that mark the start of an actionable failure in Pest output.
pub const FAILURE_MARKERS: [&str; 4] = ["FAIL", "ErrorException", "Error:", "Whoops"];

const LINES_BEFORE: usize = 2;
const LINES_AFTER: usize = 30;
pub const STREAM_CAP: usize = 500;

pub fn extract(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.split('\n').collect();

    let hit = lines
        .iter()
        .position(|line| FAILURE_MARKERS.iter().any(|m| line.contains(m)));

    let mut out = match hit {
        Some(i) => {
            let start = i.saturating_sub(LINES_BEFORE);
            let end = (i + LINES_AFTER).min(lines.len());
            lines[start..end].join("\n")
        }
        None => clip(stdout, STREAM_CAP).to_string(),
    };

    if !stderr.is_empty() {
        out.push_str("\n\nSTDERR:\n");
        out.push_str(clip(stderr, STREAM_CAP));
    }

    out
}

/// First `max_chars` characters of `s`.
pub fn clip(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
