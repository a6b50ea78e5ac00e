//! Authenticated-user extraction.
//!
//! Authentication itself lives outside this system; requests arrive with
//! the opaque user id the auth layer established, carried in the
//! `X-User-Id` header. The core trusts it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user for the current request.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::BadRequest("missing X-User-Id header".to_string()))?;

        let value = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("invalid X-User-Id header".to_string()))?;

        let uuid = Uuid::parse_str(value)
            .map_err(|e| ApiError::BadRequest(format!("invalid X-User-Id header: {e}")))?;

        Ok(Identity(UserId::from_uuid(uuid)))
    }
}
