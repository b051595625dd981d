//! Caller identity extraction.
//!
//! Authentication happens upstream; the gateway forwards the verified
//! identity in two headers:
//!
//! ```text
//! x-user-id:   user-42
//! x-user-role: manager        (admin | manager | staff | auditor)
//! ```
//!
//! A missing or unusable identity is 401. Whether the role may perform the
//! operation is decided later by the capability gate (403).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::warn;

use kosh_core::{Caller, Role};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extractor for the calling user.
///
/// ## Usage
/// ```rust,ignore
/// async fn handler(Authenticated(caller): Authenticated) -> ApiResult<...> {
///     state.db.create_order(&caller, &request).await?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Authenticated(pub Caller);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(caller) = parts.extensions.get::<Caller>() {
            return Ok(Authenticated(caller.clone()));
        }

        let user_id = header(parts, USER_ID_HEADER).ok_or_else(|| {
            warn!(uri = %parts.uri, "Request without caller identity");
            ApiError::unauthenticated(format!("missing {USER_ID_HEADER} header"))
        })?;

        let role = header(parts, USER_ROLE_HEADER)
            .ok_or_else(|| ApiError::unauthenticated(format!("missing {USER_ROLE_HEADER} header")))?
            .parse::<Role>()
            .map_err(|err| {
                warn!(uri = %parts.uri, %user_id, "Request with unknown role");
                ApiError::unauthenticated(err.to_string())
            })?;

        let caller = Caller::new(user_id, role);
        parts.extensions.insert(caller.clone());
        Ok(Authenticated(caller))
    }
}

/// Trimmed, non-empty header value.
fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
