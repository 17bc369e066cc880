use crate::error::Result;
use crate::llm::client::{LlmClient, LlmRunResult};
use crate::llm::prompt::LlmPrompt;

/// Text-completion service the drivers talk to.
pub trait Oracle {
    fn complete(&self, prompt: &LlmPrompt) -> Result<LlmRunResult>;
}

impl Oracle for LlmClient {
    fn complete(&self, prompt: &LlmPrompt) -> Result<LlmRunResult> {
        self.run(prompt)
    }
}

/// Removes a surrounding markdown fence (```php ... ```) if the model added one.
pub fn strip_code_fences(text: &str) -> String {
    let t = text.trim();

    let Some(rest) = t.strip_prefix("```") else {
        return t.to_string();
    };
    let Some(body) = rest.strip_suffix("```") else {
        return t.to_string();
    };

    // drop the info string (`php`, `PHP`, ...) on the opening line
    let body = match body.find('\n') {
        Some(nl) if !body[..nl].trim().contains(' ') => &body[nl + 1..],
        _ => body,
    };

    body.trim().to_string()
}

/// Replaces typographic quotes with their ASCII forms.
pub fn clean_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_language_tagged_fence() {
        let raw = "```php\n<?php\n\ntest('x', fn () => true);\n```";
        assert_eq!(strip_code_fences(raw), "<?php\n\ntest('x', fn () => true);");
    }

    #[test]
    fn strips_bare_fence() {
        assert_eq!(strip_code_fences("```\nabc\n```\n"), "abc");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  <?php echo 1;\n"), "<?php echo 1;");
        assert_eq!(strip_code_fences("```php\nunterminated"), "```php\nunterminated");
    }

    #[test]
    fn empty_fence_becomes_empty() {
        assert_eq!(strip_code_fences("```php\n```"), "");
    }

    #[test]
    fn smart_quotes_are_straightened() {
        assert_eq!(clean_quotes("\u{2018}a\u{2019} \u{201C}b\u{201D}"), "'a' \"b\"");
    }
}
