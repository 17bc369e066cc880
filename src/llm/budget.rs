// src/llm/budget.rs
//
// Character-length token heuristic and prompt trimming.
// No tokenizer. 3.5 characters ≈ 1 token.

use serde::Deserialize;

const CHARS_PER_TOKEN: f64 = 3.5;

pub const DEFAULT_HARD_LIMIT: usize = 8000;
pub const DEFAULT_TARGET_LIMIT: usize = 7800;
pub const DEFAULT_NOTICE: &str = "[PROMPT TOO LONG — TRIMMED, ANALYZE WHAT YOU CAN]";

pub fn estimate(text: &str) -> usize {
    (text.chars().count() as f64 / CHARS_PER_TOKEN) as usize
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TokenBudget {
    pub hard_limit: usize,
    pub target_limit: usize,
    pub notice: String,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            hard_limit: DEFAULT_HARD_LIMIT,
            target_limit: DEFAULT_TARGET_LIMIT,
            notice: DEFAULT_NOTICE.to_string(),
        }
    }
}

impl TokenBudget {
    pub fn fits(&self, text: &str) -> bool {
        estimate(text) <= self.hard_limit
    }

    fn target_chars(&self) -> usize {
        (self.target_limit as f64 * CHARS_PER_TOKEN) as usize
    }

    /// Cuts at the character offset for `target_limit` and appends the notice.
    /// Text already within `hard_limit` is returned untouched.
    pub fn trim(&self, text: &str) -> String {
        if self.fits(text) {
            return text.to_string();
        }

        let cut = byte_offset(text, self.target_chars());
        let mut out = text[..cut].trim_end().to_string();
        self.append_notice(&mut out);
        out
    }

    /// Like [`trim`](Self::trim) but cuts between whole lines. A single line
    /// longer than the whole target is cut inside instead of dropped.
    pub fn trim_lines(&self, text: &str) -> String {
        if self.fits(text) {
            return text.to_string();
        }

        let limit = self.target_chars();
        let mut kept: Vec<&str> = Vec::new();
        let mut used = 0usize;

        for line in text.split('\n') {
            let cost = line.chars().count() + 1;
            if used + cost > limit {
                if cost > limit {
                    let room = limit.saturating_sub(used);
                    kept.push(&line[..byte_offset(line, room)]);
                }
                break;
            }
            kept.push(line);
            used += cost;
        }

        let mut out = kept.join("\n").trim_end().to_string();
        self.append_notice(&mut out);
        out
    }

    fn append_notice(&self, out: &mut String) {
        out.push_str("\n\n");
        out.push_str(&self.notice);
        out.push('\n');
    }
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_budget() -> TokenBudget {
        TokenBudget {
            hard_limit: 100,
            target_limit: 80,
            notice: "[TRIMMED]".into(),
        }
    }

    #[test]
    fn estimate_divides_char_count() {
        assert_eq!(estimate(""), 0);
        assert_eq!(estimate("abcdefg"), 2);
        assert_eq!(estimate(&"x".repeat(35)), 10);
        // multi-byte chars count once
        assert_eq!(estimate(&"é".repeat(7)), 2);
    }

    #[test]
    fn text_under_limit_is_unchanged() {
        let b = small_budget();
        let text = "y".repeat(350);
        assert_eq!(estimate(&text), 100);
        assert_eq!(b.trim(&text), text);
        assert_eq!(b.trim_lines(&text), text);
    }

    #[test]
    fn oversized_text_lands_near_target_with_notice() {
        let b = small_budget();
        let text = "word ".repeat(400);
        let out = b.trim(&text);

        assert!(out.ends_with("[TRIMMED]\n"));
        let body = out.trim_end_matches("\n\n[TRIMMED]\n");
        assert!(!body.ends_with(' '));
        let est = estimate(body);
        assert!((79..=80).contains(&est), "estimate was {est}");
    }

    #[test]
    fn trim_is_idempotent_once_under_limit() {
        let b = small_budget();
        let once = b.trim(&"z".repeat(1000));
        assert!(b.fits(&once));
        assert_eq!(b.trim(&once), once);
    }

    #[test]
    fn trim_respects_char_boundaries() {
        let b = small_budget();
        let text = "ü".repeat(500);
        let out = b.trim(&text);
        assert!(out.starts_with("üü"));
        assert!(out.ends_with("[TRIMMED]\n"));
    }

    #[test]
    fn trim_lines_keeps_whole_lines() {
        let b = small_budget();
        let line = "0123456789".repeat(4);
        let text = vec![line.as_str(); 20].join("\n");
        let out = b.trim_lines(&text);
        let body = out.trim_end_matches("\n\n[TRIMMED]\n");

        assert!(body.lines().all(|l| l == line));
        assert_eq!(body.lines().count(), 6);
    }

    #[test]
    fn trim_lines_cuts_inside_a_line_longer_than_the_target() {
        let b = small_budget();
        let text = format!("CURRENT TEST CODE:\n{}\nlast line", "x".repeat(1000));
        let out = b.trim_lines(&text);
        let body = out.trim_end_matches("\n\n[TRIMMED]\n");

        assert!(body.starts_with("CURRENT TEST CODE:\nxxxx"));
        assert!(!body.contains("last line"));
        assert_eq!(body.chars().count(), 280);
        assert!(b.fits(&out));
    }
}
