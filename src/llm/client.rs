// src/llm/client.rs

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, ScribeError};
use crate::llm::prompt::LlmPrompt;

const PROMPT_ABI_VERSION: &str = "v1-testscribe";

#[derive(Debug, Clone)]
pub struct LlmRunResult {
    pub text: String,
    pub prompt_hash: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible chat completions (also GitHub Models / Azure inference).
    OpenAi,
    Anthropic,
    Gemini,
}

impl Provider {
    fn default_url(self, model: &str) -> String {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1/chat/completions".into(),
            Provider::Anthropic => "https://api.anthropic.com/v1/messages".into(),
            Provider::Gemini => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                model
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

/// Built once at startup and handed to every driver by reference.
pub struct LlmClient {
    cfg: ProviderConfig,
    http: reqwest::blocking::Client,
}

impl LlmClient {
    pub fn new(cfg: ProviderConfig) -> Result<Self> {
        if cfg.api_key.trim().is_empty() {
            return Err(ScribeError::Config("API key cannot be empty".into()));
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(cfg.timeout)
            .build()?;

        Ok(Self { cfg, http })
    }

    /// Execute LLM request
    pub fn run(&self, prompt: &LlmPrompt) -> Result<LlmRunResult> {
        let prompt_hash = hash_prompt(prompt);
        let (url, headers, body) = build_request(&self.cfg, prompt);

        debug!(model = %self.cfg.model, %prompt_hash, "sending prompt");

        let mut req = self.http.post(url).json(&body);
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let resp = req.send()?;
        let status = resp.status();
        let raw = resp.text()?;

        if !status.is_success() {
            return Err(ScribeError::Api {
                status: status.as_u16(),
                body: raw,
            });
        }

        let json: Value =
            serde_json::from_str(&raw).map_err(|e| ScribeError::Response(e.to_string()))?;

        let text = extract_text(self.cfg.provider, &json)?;

        Ok(LlmRunResult { text, prompt_hash })
    }
}

fn hash_prompt(prompt: &LlmPrompt) -> String {
    let mut h = Sha256::new();
    h.update(PROMPT_ABI_VERSION.as_bytes());
    h.update(prompt.system.as_bytes());
    h.update(prompt.user.as_bytes());
    hex::encode(h.finalize())
}

fn build_request(
    cfg: &ProviderConfig,
    prompt: &LlmPrompt,
) -> (String, Vec<(&'static str, String)>, Value) {
    let url = cfg
        .base_url
        .clone()
        .unwrap_or_else(|| cfg.provider.default_url(&cfg.model));

    match cfg.provider {
        Provider::OpenAi => {
            let mut body = serde_json::json!({
                "model": cfg.model,
                "messages": [
                    { "role": "system", "content": prompt.system },
                    { "role": "user", "content": prompt.user }
                ]
            });

            if let Some(t) = prompt.temperature {
                body["temperature"] = t.into();
                body["top_p"] = 1.into();
            }

            (
                url,
                vec![("Authorization", format!("Bearer {}", cfg.api_key))],
                body,
            )
        }

        Provider::Anthropic => {
            let mut body = serde_json::json!({
                "model": cfg.model,
                "max_tokens": 8192,
                "system": prompt.system,
                "messages": [
                    { "role": "user", "content": prompt.user }
                ]
            });

            if let Some(t) = prompt.temperature {
                body["temperature"] = t.into();
            }

            (
                url,
                vec![
                    ("x-api-key", cfg.api_key.clone()),
                    ("anthropic-version", "2023-06-01".into()),
                ],
                body,
            )
        }

        Provider::Gemini => {
            let mut body = serde_json::json!({
                "systemInstruction": { "parts": [ { "text": prompt.system } ] },
                "contents": [
                    { "role": "user", "parts": [ { "text": prompt.user } ] }
                ]
            });

            if let Some(t) = prompt.temperature {
                body["generationConfig"] = serde_json::json!({ "temperature": t });
            }

            (url, vec![("x-goog-api-key", cfg.api_key.clone())], body)
        }
    }
}

fn extract_text(provider: Provider, v: &Value) -> Result<String> {
    let pointer = match provider {
        Provider::OpenAi => "/choices/0/message/content",
        Provider::Anthropic => "/content/0/text",
        Provider::Gemini => "/candidates/0/content/parts/0/text",
    };

    v.pointer(pointer)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_owned())
        .ok_or_else(|| ScribeError::Response(format!("{:?} response has no text", provider)))
}
