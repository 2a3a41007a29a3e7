use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

/// Rejects requests whose `Authorization: Bearer <key>` does not match the configured key.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    match presented {
        Some(token) if token == state.config.api_key => {}
        Some(token) => {
            warn!(
                "Invalid API key attempt: {}...",
                token.chars().take(10).collect::<String>()
            );
            return Err(AppError::Unauthorized);
        }
        None => return Err(AppError::Unauthorized),
    }

    Ok(next.run(request).await)
}

/// Token from an `Authorization` value; the scheme is matched case-insensitively.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim_start())
}
