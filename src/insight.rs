//! Lookup-or-generate cycle for one submission.
//!
//! hash the upload -> read `/responses/<id>` -> on a hit return the stored
//! text, on a miss call the model and write the result through. Store
//! failures degrade to a miss (read) or a notice (write); they never end
//! the submission.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::cache::{CacheEntry, ContentId, ResponseStore, content_id_from_reader};
use crate::error::InsightError;
use crate::gemini::{GenerationRequest, Generator, INSTRUCTION_TEMPLATE, ImagePayload};

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub payload: ImagePayload,
}

/// One press of the submit button.
#[derive(Debug, Clone)]
pub struct Submission {
    pub prompt: String,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Cached,
    Generated,
}

/// Non-fatal status surfaced alongside a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    LookupFailed { error: String },
    Stored,
    StoreFailed { error: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LookupFailed { error } => {
                write!(f, "Error checking store for existing response: {error}")
            }
            Notice::Stored => f.write_str("Response stored for future requests."),
            Notice::StoreFailed { error } => write!(f, "Error storing response: {error}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub content_id: ContentId,
    pub response: String,
    pub origin: Origin,
    pub notices: Vec<Notice>,
}

#[derive(Clone)]
pub struct InsightService {
    store: Arc<dyn ResponseStore>,
    generator: Arc<dyn Generator>,
    instruction: Arc<str>,
}

impl InsightService {
    pub fn new(store: Arc<dyn ResponseStore>, generator: Arc<dyn Generator>) -> Self {
        Self {
            store,
            generator,
            instruction: Arc::from(INSTRUCTION_TEMPLATE),
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<Arc<str>>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub async fn submit(&self, submission: Submission) -> Result<Insight, InsightError> {
        let image = validate(&submission)?;
        let content_id = content_id_from_reader(&image.payload.data[..]).map_err(|err| {
            error!(error = %err, "failed to hash upload");
            InsightError::Hash(err)
        })?;
        let file_name = image.file_name.as_deref().unwrap_or("<unnamed>");
        let mut notices = Vec::new();

        let cached = match self.store.get(&content_id).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!(
                    store = self.store.name(),
                    %content_id,
                    error = %err,
                    "cache lookup failed, treating as miss"
                );
                notices.push(Notice::LookupFailed {
                    error: err.to_string(),
                });
                None
            }
        };

        if let Some(entry) = cached {
            info!(%content_id, file_name, "response already exists, serving from cache");
            let response = entry.response_text();
            if response.is_empty() {
                return Err(InsightError::NoResponse);
            }
            return Ok(Insight {
                response: response.to_string(),
                content_id,
                origin: Origin::Cached,
                notices,
            });
        }

        info!(%content_id, file_name, "no cached response, generating");
        let request = GenerationRequest {
            instruction: &self.instruction,
            image: &image.payload,
            prompt: &submission.prompt,
        };
        let response = self.generator.generate(request).await.map_err(|err| {
            error!(%content_id, error = %err, "generation failed");
            InsightError::Generation(err)
        })?;
        if response.is_empty() {
            return Err(InsightError::NoResponse);
        }

        let entry = CacheEntry::new(response.as_str(), &content_id);
        match self.store.put(&content_id, &entry).await {
            Ok(()) => {
                info!(store = self.store.name(), %content_id, "response stored");
                notices.push(Notice::Stored);
            }
            Err(err) => {
                warn!(
                    store = self.store.name(),
                    %content_id,
                    error = %err,
                    "failed to store response"
                );
                notices.push(Notice::StoreFailed {
                    error: err.to_string(),
                });
            }
        }

        Ok(Insight {
            content_id,
            response,
            origin: Origin::Generated,
            notices,
        })
    }
}

fn validate(submission: &Submission) -> Result<&ImageUpload, InsightError> {
    if submission.prompt.trim().is_empty() {
        return Err(InsightError::MissingPrompt);
    }
    match submission.image.as_ref() {
        Some(image) if !image.payload.data.is_empty() => Ok(image),
        _ => Err(InsightError::MissingImage),
    }
}
