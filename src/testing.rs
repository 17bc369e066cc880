//! Scripted checker and oracle used by unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, ScribeError};
use crate::llm::backend::Oracle;
use crate::llm::client::LlmRunResult;
use crate::llm::prompt::LlmPrompt;
use crate::repair::verdict::{Checker, Verdict};

pub fn passing_verdict() -> Verdict {
    Verdict {
        success: true,
        stdout: "PASS".into(),
        stderr: String::new(),
        exit_code: Some(0),
        timed_out: false,
        duration: Duration::ZERO,
    }
}

pub fn failing_verdict(stdout: &str, stderr: &str) -> Verdict {
    Verdict {
        success: false,
        stdout: stdout.into(),
        stderr: stderr.into(),
        exit_code: Some(1),
        timed_out: false,
        duration: Duration::ZERO,
    }
}

/// Returns queued verdicts in order, then repeats `fallback`.
/// Records the artifact content it saw at every call.
pub struct ScriptedChecker {
    queue: RefCell<VecDeque<Verdict>>,
    fallback: Verdict,
    seen: RefCell<Vec<String>>,
}

impl ScriptedChecker {
    pub fn new(verdicts: Vec<Verdict>) -> Self {
        Self {
            queue: RefCell::new(verdicts.into()),
            fallback: failing_verdict("FAIL (script exhausted)", ""),
            seen: RefCell::new(Vec::new()),
        }
    }

    pub fn always(verdict: Verdict) -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            fallback: verdict,
            seen: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.borrow().clone()
    }
}

impl Checker for ScriptedChecker {
    fn check(&self, artifact: &Path) -> Verdict {
        let content = fs::read_to_string(artifact).unwrap_or_default();
        self.seen.borrow_mut().push(content);
        self.queue
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Returns queued replies in order; an empty queue is a transport error.
pub struct ScriptedOracle {
    replies: RefCell<VecDeque<Result<String>>>,
    prompts: RefCell<Vec<LlmPrompt>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn replies<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Ok(t.into())).collect())
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }

    pub fn prompts(&self) -> Vec<LlmPrompt> {
        self.prompts.borrow().clone()
    }
}

impl Oracle for ScriptedOracle {
    fn complete(&self, prompt: &LlmPrompt) -> Result<LlmRunResult> {
        self.prompts.borrow_mut().push(prompt.clone());
        let text = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ScribeError::Transport("no scripted reply".into())))?;

        Ok(LlmRunResult {
            text,
            prompt_hash: "<scripted>".into(),
        })
    }
}
