use chrono::Local;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::report::parse::{Field, FileSection};

pub const PAGE_BREAK: char = '\x0c';
const VALUE_WIDTH: usize = 64;
const MISSING: &str = "N/A";

/// Paginated plain-text report: title page, index, then one page per file
/// with a two-column table for every record.
pub fn render(sections: &[FileSection], title: &str) -> String {
    let total: usize = sections.iter().map(|s| s.records.len()).sum();
    let mut out = String::new();

    // -------- Title page --------
    out.push_str("\n\n\n");
    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(UnicodeWidthStr::width(title)));
    out.push_str("\n\n");
    out.push_str("IEEE 829-2008 test case documentation\n");
    out.push_str(&format!("Generated: {}\n", Local::now().format("%Y-%m-%d %H:%M")));
    out.push_str(&format!("Files: {}\nTest cases: {total}\n", sections.len()));
    out.push(PAGE_BREAK);
    out.push('\n');

    // -------- Index --------
    out.push_str("Index of Test Files\n\n");
    for (i, section) in sections.iter().enumerate() {
        out.push_str(&format!(
            "{:>4}. {} ({} test cases)\n",
            i + 1,
            section.filename,
            section.records.len()
        ));
    }

    // -------- Content --------
    let label_width = Field::ALL
        .iter()
        .map(|f| UnicodeWidthStr::width(f.label()))
        .max()
        .unwrap_or(0);

    for section in sections {
        out.push(PAGE_BREAK);
        out.push('\n');
        out.push_str(&format!("File: {}\n\n", section.filename));

        for record in &section.records {
            let rows: Vec<(&str, &str)> = Field::ALL
                .iter()
                .map(|f| (f.label(), record.get(*f).unwrap_or(MISSING)))
                .collect();
            out.push_str(&table(&rows, label_width, VALUE_WIDTH));
            out.push('\n');
        }
    }

    out
}

fn table(rows: &[(&str, &str)], label_width: usize, value_width: usize) -> String {
    let border = format!(
        "+{}+{}+\n",
        "-".repeat(label_width + 2),
        "-".repeat(value_width + 2)
    );

    let mut out = border.clone();
    for (label, value) in rows {
        let lines = wrap(value, value_width);
        for (i, line) in lines.iter().enumerate() {
            let l = if i == 0 { *label } else { "" };
            out.push_str(&format!(
                "| {} | {} |\n",
                pad(l, label_width),
                pad(line, value_width)
            ));
        }
        out.push_str(&border);
    }
    out
}

fn pad(s: &str, width: usize) -> String {
    let w = UnicodeWidthStr::width(s);
    format!("{s}{}", " ".repeat(width.saturating_sub(w)))
}

/// Word wrap by display width. Words wider than `width` are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for para in text.lines() {
        let mut line = String::new();
        let mut line_w = 0;

        for word in para.split_whitespace() {
            let word_w = UnicodeWidthStr::width(word);

            if word_w > width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let (chunks, rest) = split_wide(word, width);
                lines.extend(chunks);
                line_w = UnicodeWidthStr::width(rest.as_str());
                line = rest;
                continue;
            }

            let needed = if line.is_empty() { word_w } else { line_w + 1 + word_w };
            if needed > width {
                lines.push(std::mem::take(&mut line));
                line_w = 0;
            }
            if !line.is_empty() {
                line.push(' ');
                line_w += 1;
            }
            line.push_str(word);
            line_w += word_w;
        }

        lines.push(line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Full-width chunks of `word`, plus the remainder that starts the next line.
fn split_wide(word: &str, width: usize) -> (Vec<String>, String) {
    let mut chunks = Vec::new();
    let mut cur = String::new();
    let mut cur_w = 0;

    for c in word.chars() {
        let cw = UnicodeWidthChar::width(c).unwrap_or(0);
        if cur_w + cw > width && !cur.is_empty() {
            chunks.push(std::mem::take(&mut cur));
            cur_w = 0;
        }
        cur.push(c);
        cur_w += cw;
    }

    (chunks, cur)
}
