use serde::{Deserialize, Serialize};

use crate::cache::ContentId;

const RESPONSES_DIR: &str = "responses";

/// Text shown for a stored record that lacks a `response` field.
pub const MISSING_RESPONSE: &str = "No response found";

/// Record kept under `/responses/<id>`. Written once on the first miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default)]
    pub encoding: String,
}

impl CacheEntry {
    pub fn new(response: impl Into<String>, id: &ContentId) -> Self {
        Self {
            response: Some(response.into()),
            encoding: id.to_string(),
        }
    }

    /// The text to present for a hit.
    pub fn response_text(&self) -> &str {
        self.response.as_deref().unwrap_or(MISSING_RESPONSE)
    }
}

pub fn response_key(id: &ContentId) -> String {
    format!("{RESPONSES_DIR}/{id}")
}
