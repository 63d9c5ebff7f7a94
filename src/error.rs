//! Error types for the insight pipeline.
//!
//! Store and generation failures have their own enums because the
//! orchestrator treats them differently: a [`StoreError`] never ends a
//! submission, a [`GenerationError`] always does.

/// Failure talking to the response store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed cache entry: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid store key: {0}")]
    InvalidKey(String),

    #[error("store authentication failed: {0}")]
    Auth(String),
}

/// Failure calling the generative model.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("model HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed model response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("prompt blocked by model: {reason}")]
    Blocked { reason: String },

    #[error("empty response from model")]
    EmptyResponse,
}

/// Terminal outcome of a submission that produced no response.
#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("Please enter an input prompt.")]
    MissingPrompt,

    #[error("Please upload an image.")]
    MissingImage,

    #[error("error encoding image: {0}")]
    Hash(#[from] std::io::Error),

    #[error("error generating response: {0}")]
    Generation(#[from] GenerationError),

    #[error("No response generated. Check inputs and try again.")]
    NoResponse,
}

impl InsightError {
    /// Whether the submission was rejected before any store or model call.
    pub fn is_validation(&self) -> bool {
        matches!(self, InsightError::MissingPrompt | InsightError::MissingImage)
    }
}

/// Startup configuration problem. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}
