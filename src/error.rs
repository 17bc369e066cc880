use std::path::PathBuf;

/// Errors surfaced by the drivers, the oracle client and the config layer.
#[derive(Debug, thiserror::Error)]
pub enum ScribeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("LLM response parse failure: {0}")]
    Response(String),

    #[error("{}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("test runner unavailable: {0}")]
    CheckerUnavailable(String),

    #[error("invalid pattern: {0}")]
    Pattern(String),
}

impl ScribeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScribeError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for ScribeError {
    fn from(e: reqwest::Error) -> Self {
        ScribeError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;
