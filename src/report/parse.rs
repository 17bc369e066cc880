use std::collections::BTreeMap;

/// Documentation fields, in the order they are shown in a report table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    TestId,
    Title,
    Objective,
    Preconditions,
    Steps,
    TestData,
    ExpectedResult,
    ActualResult,
    Status,
    Severity,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::TestId,
        Field::Title,
        Field::Objective,
        Field::Preconditions,
        Field::Steps,
        Field::TestData,
        Field::ExpectedResult,
        Field::ActualResult,
        Field::Status,
        Field::Severity,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::TestId => "Test ID",
            Field::Title => "Title",
            Field::Objective => "Objective",
            Field::Preconditions => "Preconditions",
            Field::Steps => "Steps",
            Field::TestData => "Test Data",
            Field::ExpectedResult => "Expected Result",
            Field::ActualResult => "Actual Result",
            Field::Status => "Status",
            Field::Severity => "Severity",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::TestId => &["Test Case ID", "Test Case Id", "TC ID"],
            Field::Steps => &["Test Steps"],
            Field::ExpectedResult => &["Expected Results"],
            Field::ActualResult => &["Actual Results"],
            _ => &[],
        }
    }

    /// Exact, case-sensitive match against the label or one of its aliases.
    pub fn from_label(text: &str) -> Option<Field> {
        Field::ALL
            .into_iter()
            .find(|f| f.label() == text || f.aliases().contains(&text))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestCaseRecord {
    fields: BTreeMap<Field, String>,
}

impl TestCaseRecord {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn append(&mut self, field: Field, text: &str) {
        let slot = self.fields.entry(field).or_default();
        if !slot.is_empty() {
            slot.push('\n');
        }
        slot.push_str(text);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileSection {
    pub filename: String,
    pub records: Vec<TestCaseRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    SeekingField,
    /// `inline` is set when the field opened as `Label: value`; only then
    /// may another `Label: value` line close it.
    Accumulating { field: Field, inline: bool },
}

/// A line that is exactly a field name, with an optional trailing colon.
fn label_line(line: &str) -> Option<Field> {
    Field::from_label(line.strip_suffix(':').unwrap_or(line).trim_end())
}

/// A `Label: value` line with a non-empty value.
fn inline_line(line: &str) -> Option<(Field, &str)> {
    let (label, value) = line.split_once(':')?;
    let field = Field::from_label(label.trim_end())?;
    let value = value.trim();
    (!value.is_empty()).then_some((field, value))
}

pub fn parse_record(text: &str) -> TestCaseRecord {
    let mut record = TestCaseRecord::default();
    let mut state = ParserState::SeekingField;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(field) = label_line(line) {
            state = ParserState::Accumulating { field, inline: false };
            continue;
        }

        let inline_allowed = match state {
            ParserState::SeekingField => true,
            ParserState::Accumulating { inline, .. } => inline,
        };
        if inline_allowed {
            if let Some((field, value)) = inline_line(line) {
                record.append(field, value);
                state = ParserState::Accumulating { field, inline: true };
                continue;
            }
        }

        match state {
            ParserState::SeekingField => {}
            ParserState::Accumulating { field, .. } => record.append(field, line),
        }
    }

    record
}

fn flush(block: &mut Vec<&str>, section: &mut FileSection) {
    let record = parse_record(&block.join("\n"));
    if !record.is_empty() {
        section.records.push(record);
    }
    block.clear();
}

fn is_rule(line: &str, min: usize) -> bool {
    let t = line.trim();
    t.len() >= min && t.chars().all(|c| c == '=')
}

/// Splits merged output into per-file sections of test-case records.
/// Files without any recognisable record are dropped.
pub fn parse(combined: &str) -> Vec<FileSection> {
    let lines: Vec<&str> = combined.lines().collect();
    let mut sections = Vec::new();
    let mut current = FileSection {
        filename: String::new(),
        records: Vec::new(),
    };
    let mut block: Vec<&str> = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let header = lines
            .get(i + 1)
            .and_then(|next| next.trim().strip_prefix("FILE:"))
            .filter(|_| is_rule(line, 50));

        if let Some(name) = header {
            flush(&mut block, &mut current);
            let next = FileSection {
                filename: name.trim().to_string(),
                records: Vec::new(),
            };
            let done = std::mem::replace(&mut current, next);
            if !done.records.is_empty() {
                sections.push(done);
            }
            i += 2;
            continue;
        }

        if is_rule(line, 40) {
            flush(&mut block, &mut current);
        } else {
            block.push(line);
        }
        i += 1;
    }

    flush(&mut block, &mut current);
    if !current.records.is_empty() {
        sections.push(current);
    }
    sections
}
