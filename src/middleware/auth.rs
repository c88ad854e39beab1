use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::AuthError;
use crate::handlers::AppError;
use crate::services::identity::Claims;
use crate::services::AppState;

pub const API_KEY_HEADER: &str = "apikey";

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn authenticate(state: &AppState, request: &Request) -> Result<Claims, AuthError> {
    let token = bearer_token(request).ok_or(AuthError::Unauthorized)?;
    state.identity.verify_token(token)
}

/// Requires a valid session and exposes its `Claims` to handlers.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(&state, &request)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(&state, &request)?;
    if !claims.is_admin() {
        tracing::warn!(user_id = %claims.sub, role = %claims.role, "Admin route refused");
        return Err(AuthError::Forbidden.into());
    }
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Function endpoints demand the shared `apikey` header when one is configured.
pub async fn require_function_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.config.functions_api_key.as_deref() {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");
        if !verify_api_key(provided, expected) {
            return Err(AppError::Unauthorized("Chave de API inválida".to_string()));
        }
    }
    Ok(next.run(request).await)
}

pub fn verify_api_key(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}
