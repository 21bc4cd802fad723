//! HTTP-level tests: the router is driven with `oneshot` requests, so no
//! socket is opened and images come from an in-memory fetcher.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{init_tracing, jpeg_bytes, page_count, png_bytes, MapFetcher};
use slides_pdf::server::{router, AppState, SLIDES_PDF_ROUTE};
use slides_pdf::{AssemblyConfig, Identity, StaticTokenAuth};
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN: &str = "test-token";

fn fixture_fetcher() -> Arc<MapFetcher> {
    Arc::new(
        MapFetcher::new()
            .with("https://cdn/a.png", png_bytes(160, 90), "image/png")
            .with("https://cdn/c.jpg", jpeg_bytes(64, 48), "image/jpeg"),
    )
}

fn app(fetcher: Arc<MapFetcher>) -> axum::Router {
    init_tracing();
    let auth = StaticTokenAuth::new().with_token(TOKEN, Identity::new("user-1"));
    router(AppState::new(
        Arc::new(auth),
        fetcher,
        AssemblyConfig::default(),
    ))
}

fn post(body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(SLIDES_PDF_ROUTE)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn read_body(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn error_message(response: axum::response::Response) -> String {
    let body: serde_json::Value = serde_json::from_slice(&read_body(response).await).unwrap();
    body["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check() {
    let response = app(fixture_fetcher())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, b"OK");
}

#[tokio::test]
async fn returns_pdf_attachment() {
    let fetcher = fixture_fetcher();
    let body = r#"{"imageUrls":["https://cdn/a.png","https://cdn/dead.png","https://cdn/c.jpg"],"title":"Report"}"#;

    let response = app(fetcher.clone())
        .oneshot(post(body, Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Report.pdf\""
    );
    let pdf = read_body(response).await;
    assert!(pdf.starts_with(b"%PDF-"));
    assert_eq!(page_count(&pdf), 2);
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn missing_title_defaults_to_slides() {
    let response = app(fixture_fetcher())
        .oneshot(post(r#"{"imageUrls":["https://cdn/a.png"]}"#, Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"slides.pdf\""
    );
}

#[tokio::test]
async fn cookie_session_is_accepted() {
    let request = Request::builder()
        .method("POST")
        .uri(SLIDES_PDF_ROUTE)
        .header(header::COOKIE, format!("theme=dark; sb-access-token={TOKEN}"))
        .body(Body::from(r#"{"imageUrls":["https://cdn/a.png"]}"#))
        .unwrap();
    let response = app(fixture_fetcher()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn all_images_failing_still_returns_pdf() {
    let fetcher = fixture_fetcher();
    let response = app(fetcher.clone())
        .oneshot(post(r#"{"imageUrls":["https://cdn/nope"]}"#, Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let pdf = read_body(response).await;
    assert_eq!(page_count(&pdf), 0);
}

// ── Gates ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unauthenticated_request_is_rejected_before_fetching() {
    let fetcher = fixture_fetcher();
    for token in [None, Some("wrong")] {
        let response = app(fetcher.clone())
            .oneshot(post(r#"{"imageUrls":["https://cdn/a.png"]}"#, token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(response).await, "Unauthorized");
    }
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn auth_is_checked_before_body() {
    let response = app(fixture_fetcher())
        .oneshot(post("not json", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_or_empty_image_urls_is_bad_request() {
    let fetcher = fixture_fetcher();
    for body in [r#"{}"#, r#"{"imageUrls":null}"#, r#"{"imageUrls":[]}"#, r#"{"title":"x"}"#] {
        let response = app(fetcher.clone())
            .oneshot(post(body, Some(TOKEN)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(error_message(response).await, "이미지 URL이 필요합니다.");
    }
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let fetcher = fixture_fetcher();
    for body in ["not json", r#"{"imageUrls":"https://cdn/a.png"}"#, "[1,2]"] {
        let response = app(fetcher.clone())
            .oneshot(post(body, Some(TOKEN)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(error_message(response).await, "잘못된 요청 형식입니다.");
    }
    assert_eq!(fetcher.calls(), 0);
}
