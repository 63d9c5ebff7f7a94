use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::AppState;
use crate::error::{GenerationError, InsightError};
use crate::gemini::ImagePayload;
use crate::insight::{ImageUpload, Insight, Submission};

const INDEX_HTML: &str = include_str!("../templates/index.html");
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct InsightResponse {
    #[serde(flatten)]
    insight: Insight,
    messages: Vec<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route(
            "/insights",
            axum::routing::post(handle_submission).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn extension_from_filename(file_name: &str) -> Option<String> {
    if let Some((_, ext)) = file_name.rsplit_once('.') {
        let trimmed = ext.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_lowercase());
        }
    }
    None
}

/// Only jpg, jpeg and png uploads are accepted.
pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    None
}

fn resolve_mime_type(file_name: &str, content_type: Option<&str>, bytes: &[u8]) -> Option<String> {
    if let Some(ext) = extension_from_filename(file_name) {
        return match ext.as_str() {
            "jpg" | "jpeg" => Some("image/jpeg".to_string()),
            "png" => Some("image/png".to_string()),
            _ => None,
        };
    }
    match content_type.map(|value| value.to_ascii_lowercase()) {
        Some(value) if value == "image/png" => Some(value),
        Some(value) if value == "image/jpeg" || value == "image/jpg" => {
            Some("image/jpeg".to_string())
        }
        _ => detect_mime_type(bytes).map(str::to_string),
    }
}

pub async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn handle_submission(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut prompt = String::new();
    let mut file: Option<(String, Option<String>, Bytes)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name().map(str::to_string).as_deref() {
                Some("prompt") => match field.text().await {
                    Ok(text) => prompt = text,
                    Err(err) => {
                        return json_error(
                            StatusCode::BAD_REQUEST,
                            &format!("failed to read prompt: {err}"),
                        );
                    }
                },
                Some("file") => {
                    let content_type = field.content_type().map(|value| value.to_string());
                    let file_name = field.file_name().unwrap_or("").to_string();
                    match field.bytes().await {
                        Ok(data) => file = Some((file_name, content_type, data)),
                        Err(err) => {
                            return json_error(
                                StatusCode::BAD_REQUEST,
                                &format!("failed to read file: {err}"),
                            );
                        }
                    }
                }
                _ => {}
            },
            Ok(None) => break,
            Err(err) => {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    &format!("failed to read form: {err}"),
                );
            }
        }
    }

    let image = match file {
        Some((file_name, content_type, data)) if !data.is_empty() => {
            match resolve_mime_type(&file_name, content_type.as_deref(), &data) {
                Some(mime_type) => Some(ImageUpload {
                    file_name: Some(file_name).filter(|name| !name.is_empty()),
                    payload: ImagePayload { mime_type, data },
                }),
                // A missing prompt is reported before anything about the file.
                None if prompt.trim().is_empty() => None,
                None => {
                    return json_error(
                        StatusCode::UNSUPPORTED_MEDIA_TYPE,
                        "only jpg, jpeg and png images are supported",
                    );
                }
            }
        }
        _ => None,
    };

    match state.insights.submit(Submission { prompt, image }).await {
        Ok(insight) => {
            let messages = insight.notices.iter().map(ToString::to_string).collect();
            (StatusCode::OK, Json(InsightResponse { insight, messages })).into_response()
        }
        Err(err) => {
            warn!(error = %err, "submission failed");
            json_error(status_for(&err), &err.to_string())
        }
    }
}

fn status_for(err: &InsightError) -> StatusCode {
    if err.is_validation() {
        return StatusCode::BAD_REQUEST;
    }
    match err {
        InsightError::Hash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        InsightError::Generation(GenerationError::Blocked { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::BAD_GATEWAY,
    }
}
