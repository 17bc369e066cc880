use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct LlmPrompt {
    pub system: String,
    pub user: String,
    pub temperature: Option<f32>,
}

impl LlmPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }
}

/// System/user template pair with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    pub fn render(&self, vars: &[(&str, &str)]) -> LlmPrompt {
        LlmPrompt::new(
            expand_template(&self.system, vars),
            expand_template(&self.user, vars),
        )
    }

    pub fn repair() -> Self {
        Self {
            system: REPAIR_SYSTEM.trim().to_string(),
            user: REPAIR_USER.trim_start().to_string(),
        }
    }

    pub fn document() -> Self {
        Self {
            system: DOCUMENT_SYSTEM.trim().to_string(),
            user: DOCUMENT_USER.trim_start().to_string(),
        }
    }

    pub fn route() -> Self {
        Self {
            system: ROUTE_SYSTEM.trim().to_string(),
            user: ROUTE_USER.trim_start().to_string(),
        }
    }
}

/// Single pass, so a value containing `{x}` is never expanded again.
pub fn expand_template(template: &str, vars: &[(&str, &str)]) -> String {
    let map: HashMap<&str, &str> = vars.iter().copied().collect();

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find('}') {
            Some(close) if map.contains_key(&after[..close]) => {
                out.push_str(map[&after[..close]]);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/* ============================================================
   Built-in templates
   ============================================================ */

const REPAIR_SYSTEM: &str = r#"
You are an SQA expert in PHP/Laravel with in-depth knowledge of the Pest testing framework.
"#;

const REPAIR_USER: &str = r#"
FIX THIS FAILING TEST. Return ONLY the complete fixed PHP code for a Pest style test.

TEST FILE: {artifact}
FAILURE OUTPUT:
{excerpt}

CURRENT TEST CODE:
{content}

INSTRUCTIONS:
- Fix ALL errors in the test
- Preserve test names, descriptions and structure
- Do not modify production code
- Ensure the test passes with Pest
- Return ONLY the complete fixed PHP code, no explanation, no markdown
"#;

const DOCUMENT_SYSTEM: &str = r#"
You are a QA expert specializing in IEEE 829-2008 test case documentation.
"#;

const DOCUMENT_USER: &str = r#"
Analyze the following PHP Pest test file and produce test case documentation.

For EACH test() or it() function, emit one block in exactly this shape,
each field name alone on its own line followed by its value:

Test ID
TC-{prefix}-001 (increment sequentially per test case)
Title
Objective
Preconditions
Test Data
Steps
Expected Result
Actual Result
Status
Severity

Separate blocks with a line of 40 '=' characters.
Do not use Markdown code blocks or include PHP code in the output.

FILE: {artifact}
{content}
"#;

const ROUTE_SYSTEM: &str = r#"
You are an expert Laravel tester specializing in Pest PHP integration testing.
"#;

const ROUTE_USER: &str = r#"
Generate integration-level Pest test cases for the following Laravel route.

- Do not redefine the route; test the route that exists in the application.
- Use only test() or it(), no describe() blocks.
- Test only observable HTTP behavior.
- Use only straight quotes.
- Output only raw PHP code starting with <?php. No markdown, no explanations.

ROUTE FILE: {artifact}
ROUTE TO TEST:
{route}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_placeholders_only() {
        let out = expand_template("a {x} b {y} {unknown}", &[("x", "1"), ("y", "2")]);
        assert_eq!(out, "a 1 b 2 {unknown}");
    }

    #[test]
    fn substituted_values_are_not_reexpanded() {
        let out = expand_template("{code}", &[("code", "fn() { {code} }")]);
        assert_eq!(out, "fn() { {code} }");
    }

    #[test]
    fn unbalanced_braces_survive() {
        assert_eq!(expand_template("if (a) { b", &[("a", "z")]), "if (a) { b");
    }

    #[test]
    fn repair_template_carries_all_inputs() {
        let p = PromptTemplate::repair().render(&[
            ("artifact", "A-Test.php"),
            ("excerpt", "FAIL  Tests\\Unit\\A"),
            ("content", "<?php test('a', fn() => 1);"),
        ]);

        assert!(p.user.contains("TEST FILE: A-Test.php"));
        assert!(p.user.contains("FAIL  Tests\\Unit\\A"));
        assert!(p.user.contains("<?php test('a'"));
        assert!(!p.system.is_empty());
        assert_eq!(p.temperature, None);
    }
}
