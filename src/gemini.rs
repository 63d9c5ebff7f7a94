use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::GenerationError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Fixed instruction sent ahead of every image.
pub const INSTRUCTION_TEMPLATE: &str = concat!(
    "Take the persona of a Dashboard analyzer.\n",
    "There will be multiple charts or graphs in the input data.\n",
    "List down all the types of charts.\n",
    "List down all the variables and their values in the input data.\n",
    "Generate a summary of the input data.\n",
    "The output should be in the form of the JSON given below:\n",
    "\n",
    "Output: {\n",
    "  \"Charts\": { },\n",
    "  \"Variables\": {\n",
    "    \"Variable1\":{\n",
    "    \"Sub Variable1\": \"Value1\",\n",
    "    \"Sub Variable2\": \"Value2\"}\n",
    "    \"Variable2\":{\n",
    "    \"Sub Variable1\": \"Value1\",\n",
    "    \"Sub Variable2\": \"Value2\"}\n",
    "    ...\n",
    "  },\n",
    "  \"Summary\": \"Summary of the input data in pointers\"\n",
    "}\n",
    "\n",
    "If you are unable to extract the data, strictly give the response as Null. Do not print anything else\n",
    "In charts the key is the header of the chart and value is description of the chart\n",
    "for variables try to find out all the variables and their values\n",
);

/// Image part of a model call.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: Bytes,
}

/// One model call: instruction, image, then the user's prompt.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub instruction: &'a str,
    pub image: &'a ImagePayload,
    pub prompt: &'a str,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model's text verbatim. `Null` is a valid answer.
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

async fn assert_ok_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, GenerationError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .ok()
        .and_then(|body| body.error)
        .and_then(|err| err.message)
        .unwrap_or(text);
    Err(GenerationError::Api { status, message })
}

/// Client for the Generative Language `generateContent` endpoint.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn with_base_url(
        client: Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        let body = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [
                        {"text": request.instruction},
                        {
                            "inline_data": {
                                "mime_type": request.image.mime_type,
                                "data": STANDARD.encode(&request.image.data),
                            }
                        },
                        {"text": request.prompt}
                    ]
                }
            ]
        });

        debug!(
            model = %self.model,
            image_bytes = request.image.data.len(),
            "calling generateContent"
        );
        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let response = assert_ok_response(response).await?;
        let payload: GenerateContentResponse = serde_json::from_str(&response.text().await?)?;
        extract_text(payload)
    }
}

fn extract_text(payload: GenerateContentResponse) -> Result<String, GenerationError> {
    if let Some(reason) = payload.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerationError::Blocked { reason });
    }
    let candidate = payload
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .ok_or(GenerationError::EmptyResponse)?;
    let finish_reason = candidate.finish_reason;
    let text: String = candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    if text.is_empty() {
        return match finish_reason {
            Some(reason) if matches!(reason.as_str(), "SAFETY" | "RECITATION" | "BLOCKLIST") => {
                Err(GenerationError::Blocked { reason })
            }
            _ => Err(GenerationError::EmptyResponse),
        };
    }
    Ok(text)
}
