use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use compass_core::ids::UserId;

use crate::error::ApiError;

/// The authenticated owner, as asserted by the upstream identity provider.
/// The gateway in front of this service strips and re-writes the header, so
/// its value is trusted unconditionally as the row-ownership key.
pub struct Owner(pub UserId);

const HEADER: &str = "x-user-id";

impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Owner(UserId::from_raw(s)))
            .ok_or_else(ApiError::unauthorized)
    }
}
