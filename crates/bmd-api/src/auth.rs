use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use bmd_core::Identity;

use crate::error::ApiError;

/// Middleware that reads the caller's credentials from the identity headers
/// set by the authenticating front end and injects an [`Identity`].
///
/// `X-Auth-Token`, `X-Project-Id` and `X-User-Id` are required;
/// `X-User-Name` and `X-Project-Name` are optional display names.
pub async fn identity_middleware(mut req: Request, next: Next) -> Response {
    match identity_from_headers(req.headers()) {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, ApiError> {
    let token = header(headers, "x-auth-token").ok_or(ApiError::Unauthorized)?;
    let project_id = header(headers, "x-project-id")
        .ok_or_else(|| ApiError::BadRequest("missing X-Project-Id header".into()))?;
    let user_id = header(headers, "x-user-id")
        .ok_or_else(|| ApiError::BadRequest("missing X-User-Id header".into()))?;

    Ok(Identity {
        token,
        user_id,
        user_name: header(headers, "x-user-name"),
        project_id,
        project_name: header(headers, "x-project-name"),
    })
}
