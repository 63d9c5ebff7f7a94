//! End-to-end HTTP flow: multipart upload -> local store -> mocked Gemini.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chart_insight::cache::{LocalFileStore, ResponseStore, content_id};
use chart_insight::gemini::GeminiClient;
use chart_insight::{AppState, InsightService, web_pages};
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOUNDARY: &str = "chart-insight-boundary";
const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 9, 9, 9];

fn multipart(prompt: Option<&str>, file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(prompt) = prompt {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"prompt\"\r\n\r\n{prompt}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, content_type, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/insights")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn setup() -> (MockServer, tempfile::TempDir, AppState, Arc<LocalFileStore>) {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalFileStore::new(dir.path().to_path_buf()));
    let generator = Arc::new(GeminiClient::with_base_url(
        reqwest::Client::new(),
        "test_key",
        server.uri(),
        "gemini-1.5-flash",
    ));
    let state = AppState {
        insights: InsightService::new(store.clone(), generator),
    };
    (server, dir, state, store)
}

#[tokio::test]
async fn index_page_renders_form() {
    let (_server, _dir, state, _store) = setup().await;
    let response = web_pages::router(state)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Generate Insights"));
    assert!(html.contains("accept=\".jpg,.jpeg,.png"));
}

#[tokio::test]
async fn generate_then_serve_from_cache() {
    let (server, _dir, state, store) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "Null"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let router = web_pages::router(state);

    let first = router
        .clone()
        .oneshot(request(multipart(
            Some("summarise"),
            Some(("sales.png", "image/png", PNG)),
        )))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = json(first).await;
    assert_eq!(first["origin"], "generated");
    assert_eq!(first["response"], "Null");
    assert_eq!(first["content_id"], content_id(PNG).as_str());
    assert_eq!(first["notices"][0]["kind"], "stored");

    let stored = store.get(&content_id(PNG)).await.unwrap().unwrap();
    assert_eq!(stored.response_text(), "Null");

    let second = router
        .oneshot(request(multipart(
            Some("summarise"),
            Some(("renamed.png", "image/png", PNG)),
        )))
        .await
        .unwrap();
    let second = json(second).await;
    assert_eq!(second["origin"], "cached");
    assert_eq!(second["response"], "Null");
}

#[tokio::test]
async fn missing_prompt_is_bad_request() {
    let (server, _dir, state, _store) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let response = web_pages::router(state)
        .oneshot(request(multipart(None, Some(("a.png", "image/png", PNG)))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "Please enter an input prompt.");
}

#[tokio::test]
async fn missing_image_is_bad_request() {
    let (_server, _dir, state, _store) = setup().await;

    let response = web_pages::router(state)
        .oneshot(request(multipart(Some("summarise"), None)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "Please upload an image.");
}

#[tokio::test]
async fn gif_upload_is_rejected() {
    let (_server, _dir, state, _store) = setup().await;

    let response = web_pages::router(state)
        .oneshot(request(multipart(
            Some("summarise"),
            Some(("anim.gif", "image/gif", &b"GIF89a...."[..])),
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn blank_prompt_is_reported_before_file_type() {
    let (server, _dir, state, _store) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let response = web_pages::router(state)
        .oneshot(request(multipart(
            Some("   "),
            Some(("anim.gif", "image/gif", &b"GIF89a...."[..])),
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "Please enter an input prompt.");
}

#[tokio::test]
async fn model_failure_is_bad_gateway_and_nothing_is_stored() {
    let (server, _dir, state, store) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
            "error": {"code": 503, "message": "The model is overloaded."}
        })))
        .mount(&server)
        .await;

    let response = web_pages::router(state)
        .oneshot(request(multipart(
            Some("summarise"),
            Some(("a.png", "image/png", PNG)),
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json(response).await;
    assert!(body["error"].as_str().unwrap().contains("The model is overloaded."));
    assert!(!store.exists(&content_id(PNG)).await.unwrap());
}
