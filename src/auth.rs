//! Session checks for the HTTP surface.
//!
//! The server never manages sessions itself. It hands whatever token the
//! caller presented to an [`AuthProvider`] and only proceeds when that
//! provider returns an [`Identity`]. Two providers ship with the crate:
//!
//! * [`SupabaseAuth`] asks the hosted auth service who the token belongs to.
//! * [`StaticTokenAuth`] looks the token up in a fixed table, for
//!   self-hosting and tests.

use crate::error::SlidesError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }
}

/// Why a request could not be tied to a user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No bearer token and no session cookie.
    #[error("No credentials presented")]
    MissingCredentials,

    /// A token was presented but does not belong to a live session.
    #[error("Session is invalid or expired")]
    InvalidSession,

    /// The auth backend could not be reached or answered unexpectedly.
    #[error("Auth backend error: {0}")]
    Backend(String),
}

/// Resolves a presented token to an [`Identity`].
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// `token` is `None` when the request carried no credentials at all.
    async fn authenticate(&self, token: Option<&str>) -> Result<Identity, AuthError>;
}

fn require_token(token: Option<&str>) -> Result<&str, AuthError> {
    token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingCredentials)
}

// ── Supabase ─────────────────────────────────────────────────────────────

/// Validates tokens against a Supabase project's `/auth/v1/user` endpoint.
#[derive(Debug, Clone)]
pub struct SupabaseAuth {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Deserialize)]
struct SupabaseUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl SupabaseAuth {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, SlidesError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SlidesError::InvalidConfig(
                "Supabase URL must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| SlidesError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            anon_key: anon_key.into(),
        })
    }

    fn user_endpoint(&self) -> String {
        format!("{}/auth/v1/user", self.base_url)
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn authenticate(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = require_token(token)?;

        let response = self
            .client
            .get(self.user_endpoint())
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AuthError::InvalidSession);
        }
        if !status.is_success() {
            return Err(AuthError::Backend(format!("auth service returned HTTP {status}")));
        }

        let user: SupabaseUser = response
            .json()
            .await
            .map_err(|e| AuthError::Backend(format!("unreadable user payload: {e}")))?;
        debug!("Authenticated user {}", user.id);

        Ok(Identity {
            user_id: user.id,
            email: user.email,
        })
    }
}

// ── Static tokens ────────────────────────────────────────────────────────

/// Fixed token → identity table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` as belonging to `identity`.
    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    /// Build a table from `TOKEN=USER` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, SlidesError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        pairs.into_iter().try_fold(Self::new(), |auth, pair| {
            let (token, user) = parse_token_pair(pair.as_ref())?;
            Ok(auth.with_token(token, Identity::new(user)))
        })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn authenticate(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = require_token(token)?;
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidSession)
    }
}

/// Split `TOKEN=USER`; both halves must be non-empty.
pub fn parse_token_pair(pair: &str) -> Result<(String, String), SlidesError> {
    match pair.split_once('=') {
        Some((token, user)) if !token.trim().is_empty() && !user.trim().is_empty() => {
            Ok((token.trim().to_string(), user.trim().to_string()))
        }
        _ => Err(SlidesError::InvalidConfig(format!(
            "expected TOKEN=USER, got '{pair}'"
        ))),
    }
}
