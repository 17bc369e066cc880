use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::batch::OutputLayout;
use crate::error::{Result, ScribeError};
use crate::llm::budget::TokenBudget;
use crate::llm::client::{Provider, ProviderConfig};
use crate::llm::prompt::PromptTemplate;
use crate::repair::engine::RepairPolicy;

pub const DEFAULT_API_KEY_ENV: &str = "TESTSCRIBE_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmSettings,
    pub runner: RunnerSettings,
    pub repair: RepairPolicy,
    pub budget: TokenBudget,
    pub batch: BatchSettings,
    pub profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: Provider,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: "openai/gpt-4.1".into(),
            base_url: Some("https://models.github.ai/inference/chat/completions".into()),
            api_key_env: DEFAULT_API_KEY_ENV.into(),
            timeout_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub working_dir: Option<PathBuf>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            command: ["php", "-d", "memory_limit=2000M", "vendor/bin/pest"]
                .map(String::from)
                .to_vec(),
            timeout_secs: 300,
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Pause between artifacts that reached the oracle.
    pub delay_secs: f64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { delay_secs: 6.0 }
    }
}

/// Named bundle of driver parameters. CLI flags override every field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub pattern: Option<String>,
    pub layout: Option<OutputLayout>,
    pub extension: Option<String>,
    pub mirror_dirs: Vec<PathBuf>,
    pub system_prompt_file: Option<PathBuf>,
    pub user_prompt_file: Option<PathBuf>,
    /// Directory-name fragment → test-ID prefix, e.g. `Admin = "Adm"`.
    pub prefix_rules: BTreeMap<String, String>,
}

impl Profile {
    /// Built-in template with the profile's file overrides applied.
    pub fn template(&self, default: PromptTemplate) -> Result<PromptTemplate> {
        let mut t = default;
        if let Some(path) = &self.system_prompt_file {
            t.system = read_text(path)?;
        }
        if let Some(path) = &self.user_prompt_file {
            t.user = read_text(path)?;
        }
        Ok(t)
    }
}

impl Config {
    /// An explicit path must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };

        if !path.exists() {
            if required {
                return Err(ScribeError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        Self::from_toml(&read_text(&path)?)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut cfg: Config =
            toml::from_str(raw).map_err(|e| ScribeError::Config(e.to_string()))?;
        cfg.repair.budget = cfg.budget.clone();
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if let Some(url) = &self.llm.base_url {
            Url::parse(url)
                .map_err(|e| ScribeError::Config(format!("llm.base_url {url:?}: {e}")))?;
        }
        if self.runner.command.is_empty() {
            return Err(ScribeError::Config("runner.command is empty".into()));
        }
        if self.repair.max_attempts == 0 {
            return Err(ScribeError::Config("repair.max_attempts must be at least 1".into()));
        }
        if self.budget.target_limit > self.budget.hard_limit {
            return Err(ScribeError::Config(
                "budget.target_limit exceeds budget.hard_limit".into(),
            ));
        }
        Ok(())
    }

    pub fn profile(&self, name: Option<&str>) -> Result<Profile> {
        match name {
            None => Ok(Profile::default()),
            Some(n) => self
                .profiles
                .get(n)
                .cloned()
                .ok_or_else(|| ScribeError::Config(format!("unknown profile: {n}"))),
        }
    }

    /// Reads the credential from the configured env var; missing is fatal.
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        let key = std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                ScribeError::Config(format!("{} is missing", self.llm.api_key_env))
            })?;

        Ok(ProviderConfig {
            provider: self.llm.provider,
            model: self.llm.model.clone(),
            api_key: key,
            base_url: self.llm.base_url.clone(),
            timeout: Duration::from_secs(self.llm.timeout_secs),
        })
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs_f64(self.batch.delay_secs.max(0.0))
    }
}

fn default_config_path() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("testscribe");
    dir.push("config.toml");
    dir
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| ScribeError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.llm.provider, Provider::OpenAi);
        assert_eq!(cfg.repair.max_attempts, 5);
        assert_eq!(cfg.repair.excerpt_cap, 1500);
        assert_eq!(cfg.runner.command[0], "php");
        assert_eq!(cfg.runner.timeout_secs, 300);
        assert_eq!(cfg.budget.hard_limit, 8000);
        assert_eq!(cfg.batch_delay(), Duration::from_secs(6));
    }

    #[test]
    fn sections_and_profiles_parse() {
        let cfg = Config::from_toml(
            r#"
            [llm]
            provider = "gemini"
            model = "gemini-2.5-flash"
            base_url = "https://example.test/v1"
            api_key_env = "MY_KEY"

            [runner]
            command = ["vendor/bin/pest"]
            timeout_secs = 60

            [repair]
            max_attempts = 3
            attempt_delay = 0.5

            [budget]
            hard_limit = 100
            target_limit = 90

            [profiles.integration]
            input_dir = "tests/Integration-Testing"
            output_dir = "tests/results"
            layout = "mirror"
            extension = "txt"

            [profiles.integration.prefix_rules]
            Admin = "Adm"
            Customer = "Cust"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.llm.provider, Provider::Gemini);
        assert_eq!(cfg.runner.command, vec!["vendor/bin/pest"]);
        assert_eq!(cfg.repair.max_attempts, 3);
        assert_eq!(cfg.repair.attempt_delay, Duration::from_millis(500));
        assert_eq!(cfg.repair.budget.hard_limit, 100);

        let p = cfg.profile(Some("integration")).unwrap();
        assert_eq!(p.layout, Some(OutputLayout::Mirror));
        assert_eq!(p.prefix_rules.get("Admin").map(String::as_str), Some("Adm"));
        assert!(cfg.profile(Some("nope")).is_err());
        assert!(cfg.profile(None).unwrap().input_dir.is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_toml("[llm]\nbase_url = \"not a url\"").is_err());
        assert!(Config::from_toml("[runner]\ncommand = []").is_err());
        assert!(Config::from_toml("[repair]\nmax_attempts = 0").is_err());
        assert!(Config::from_toml("[budget]\nhard_limit = 10\ntarget_limit = 20").is_err());
        assert!(Config::from_toml("llm = 3").is_err());
    }

    #[test]
    fn missing_credential_is_fatal() {
        let mut cfg = Config::default();
        cfg.llm.api_key_env = "TESTSCRIBE_TEST_UNSET_KEY_6c1f".into();
        let err = cfg.provider_config().unwrap_err();
        assert!(err.to_string().contains("TESTSCRIBE_TEST_UNSET_KEY_6c1f is missing"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("none.toml"))).is_err());
    }

    #[test]
    fn profile_template_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.txt");
        fs::write(&user, "Document {artifact}").unwrap();

        let p = Profile {
            user_prompt_file: Some(user),
            ..Default::default()
        };
        let t = p.template(PromptTemplate::document()).unwrap();
        assert_eq!(t.user, "Document {artifact}");
        assert_eq!(t.system, PromptTemplate::document().system);
    }
}
