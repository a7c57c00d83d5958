//! Caller identity.
//!
//! Authentication happens at the gateway; the API trusts the
//! `x-user-id` header it injects. Requests arriving without one are
//! rejected before any handler runs.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller, extracted from the gateway header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Missing x-user-id header"))?;

        Ok(AuthUser { id: id.to_string() })
    }
}
