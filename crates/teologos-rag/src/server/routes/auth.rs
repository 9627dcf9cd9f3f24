//! Bearer token guard

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;

/// Reject requests without `Authorization: Bearer <token>` matching the configured token
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match provided {
        Some(token)
            if !state.auth_token().is_empty()
                && constant_time_eq(token.as_bytes(), state.auth_token().as_bytes()) =>
        {
            Ok(next.run(request).await)
        }
        Some(_) => {
            tracing::warn!("Invalid bearer token on {}", request.uri().path());
            Err(Error::Unauthorized)
        }
        None => Err(Error::Unauthorized),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
