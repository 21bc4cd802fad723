//! HTTP surface: `POST /api/studio/slides/pdf`.
//!
//! Every request passes the same gates, in this order: authenticate, parse
//! the body, validate, then assemble. A request rejected at any gate never
//! reaches the fetcher.
//!
//! | Case                               | Status | `error`                     |
//! |------------------------------------|--------|-----------------------------|
//! | no / invalid session               | 401    | `Unauthorized`              |
//! | body not JSON of the right shape   | 400    | `잘못된 요청 형식입니다.`   |
//! | `imageUrls` missing, null or empty | 400    | `이미지 URL이 필요합니다.`  |
//! | assembly failure                   | 500    | `PDF 생성에 실패했습니다.`  |

use crate::assemble::{assemble, SlideRequest};
use crate::auth::{AuthError, AuthProvider};
use crate::config::AssemblyConfig;
use crate::error::SlidesError;
use crate::pipeline::fetch::ImageFetcher;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Route that turns image URLs into a PDF download.
pub const SLIDES_PDF_ROUTE: &str = "/api/studio/slides/pdf";

/// Cookie consulted when no `Authorization: Bearer` header is present.
pub const SESSION_COOKIE: &str = "sb-access-token";

pub const MSG_UNAUTHORIZED: &str = "Unauthorized";
pub const MSG_BAD_BODY: &str = "잘못된 요청 형식입니다.";
pub const MSG_NO_IMAGES: &str = "이미지 URL이 필요합니다.";
pub const MSG_PDF_FAILED: &str = "PDF 생성에 실패했습니다.";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthProvider>,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub config: Arc<AssemblyConfig>,
}

impl AppState {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        fetcher: Arc<dyn ImageFetcher>,
        config: AssemblyConfig,
    ) -> Self {
        Self {
            auth,
            fetcher,
            config: Arc::new(config),
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Request-level failures, one per gate.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("malformed request body: {0}")]
    BadRequest(String),

    #[error("request carries no image URLs")]
    MissingImages,

    #[error("assembly failed: {0}")]
    Assembly(#[from] SlidesError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::MissingImages => StatusCode::BAD_REQUEST,
            ApiError::Assembly(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller; internal detail stays in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => MSG_UNAUTHORIZED,
            ApiError::BadRequest(_) => MSG_BAD_BODY,
            ApiError::MissingImages => MSG_NO_IMAGES,
            ApiError::Assembly(_) => MSG_PDF_FAILED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Unauthorized(AuthError::Backend(detail)) => {
                warn!("Auth backend unavailable: {}", detail)
            }
            ApiError::Assembly(e) => error!("PDF generation failed: {}", e),
            other => info!("Rejected request: {}", other),
        }

        let body = ErrorResponse {
            error: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlidesPdfBody {
    #[serde(default)]
    image_urls: Option<Vec<String>>,
    #[serde(default)]
    title: Option<String>,
}

/// Bearer token from `Authorization`, else the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .filter(|v| !v.is_empty())
}

async fn handle_health() -> &'static str {
    "OK"
}

async fn handle_slides_pdf(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let token = session_token(&headers);
    let identity = state.auth.authenticate(token.as_deref()).await?;

    let body: SlidesPdfBody =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let request = SlideRequest::new(body.image_urls.unwrap_or_default(), body.title)
        .map_err(|_| ApiError::MissingImages)?;

    info!(
        "Slides PDF requested by {}: {} images",
        identity.user_id,
        request.image_refs().len()
    );

    let deck = assemble(&request, state.fetcher.as_ref(), &state.config).await?;
    if deck.stats.skipped() > 0 {
        warn!(
            "Skipped {}/{} images for {}",
            deck.stats.skipped(),
            deck.stats.requested,
            identity.user_id
        );
    }

    let headers = [
        (header::CONTENT_TYPE, deck.media_type.to_string()),
        (header::CONTENT_DISPOSITION, deck.content_disposition()),
    ];
    Ok((StatusCode::OK, headers, deck.pdf).into_response())
}

// ── Router ───────────────────────────────────────────────────────────────

/// Build the application router with tracing and permissive CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(SLIDES_PDF_ROUTE, post(handle_slides_pdf))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("sb-access-token=cookie-token"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sb-access-token=tok%3D1; other=x"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("tok=1"));
    }

    #[test]
    fn no_credentials() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(session_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn statuses_and_messages() {
        let cases = [
            (ApiError::Unauthorized(AuthError::InvalidSession), 401, MSG_UNAUTHORIZED),
            (ApiError::BadRequest("eof".into()), 400, MSG_BAD_BODY),
            (ApiError::MissingImages, 400, MSG_NO_IMAGES),
            (ApiError::Assembly(SlidesError::Internal("x".into())), 500, MSG_PDF_FAILED),
        ];
        for (err, status, msg) in cases {
            assert_eq!(err.status().as_u16(), status);
            assert_eq!(err.public_message(), msg);
        }
    }

    #[test]
    fn body_accepts_camel_case_and_nulls() {
        let body: SlidesPdfBody =
            serde_json::from_str(r#"{"imageUrls":["a","b"],"title":"T"}"#).unwrap();
        assert_eq!(body.image_urls.unwrap(), vec!["a", "b"]);
        assert_eq!(body.title.as_deref(), Some("T"));

        let body: SlidesPdfBody = serde_json::from_str(r#"{"imageUrls":null}"#).unwrap();
        assert!(body.image_urls.is_none());

        assert!(serde_json::from_str::<SlidesPdfBody>(r#"{"imageUrls":"a"}"#).is_err());
    }
}
