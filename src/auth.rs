//! Bearer-token authentication against Supabase Auth

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::Deserialize;
use std::time::Duration;

use crate::config::SupabaseConfig;
use crate::error::{Error, Result};

/// The signed-in caller
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Resolves an access token to a user
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` when the token is missing, expired or rejected
    async fn authenticate(&self, token: &str) -> Result<Option<AuthUser>>;
}

/// Token from an `Authorization: Bearer …` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Supabase Auth `GET /auth/v1/user`
pub struct SupabaseAuth {
    client: reqwest::Client,
    config: SupabaseConfig,
}

impl SupabaseAuth {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        if config.url.is_empty() || config.anon_key.is_empty() {
            return Err(Error::Config("Supabase URL and anon key must be set".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Authenticator for SupabaseAuth {
    async fn authenticate(&self, token: &str) -> Result<Option<AuthUser>> {
        let url = format!("{}/auth/v1/user", self.config.url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("Supabase request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Auth(format!("Supabase returned {}", status)));
        }

        let user: AuthUser = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("Unexpected Supabase user payload: {}", e)))?;
        Ok(Some(user))
    }
}
