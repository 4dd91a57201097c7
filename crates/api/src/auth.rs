//! Principal extraction
//!
//! Authentication itself lives upstream; the gateway injects identity
//! headers after validating the bearer token. This extractor consumes
//! `x-user-id`, `x-company-id`, and `x-admin`.

use crate::error::ApiError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracking_model::Principal;

/// The authenticated caller. Rejects with 401 when the identity headers
/// are absent.
#[derive(Debug, Clone)]
pub struct AuthPrincipal(pub Principal);

/// Like [`AuthPrincipal`] but tolerates anonymous callers. Used by the
/// push channel, where unauthenticated sessions may still watch `fleet`.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

fn principal_from_parts(parts: &Parts) -> Option<Principal> {
    let user_id = parts
        .headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())?
        .to_string();
    let company_id = parts
        .headers
        .get("x-company-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let admin = parts
        .headers
        .get("x-admin")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "true")
        .unwrap_or(false);
    Some(Principal {
        user_id,
        company_id,
        admin,
    })
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_parts(parts)
            .map(AuthPrincipal)
            .ok_or(ApiError::Unauthenticated)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybePrincipal {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybePrincipal(principal_from_parts(parts)))
    }
}
