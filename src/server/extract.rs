//! Request extractors

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::auth::bearer_token;
use crate::error::Error;
use crate::server::AppState;

/// The authenticated caller. Creates the profile on first use.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: Option<String>,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(Error::Unauthorized)?;
        let user = state
            .auth
            .authenticate(token)
            .await?
            .ok_or(Error::Unauthorized)?;

        state.store.ensure_profile(&user.id, user.email.as_deref())?;

        Ok(CurrentUser {
            id: user.id,
            email: user.email,
        })
    }
}

/// JSON body that rejects with a 400 `{ "error": … }` response
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(error = %rejection.body_text(), "request body rejected");
                Error::bad_request("Invalid JSON body")
            })?;
        Ok(Self(value))
    }
}
