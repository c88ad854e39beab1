use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiJson, AppError};
use crate::services::identity::Session;
use crate::services::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::BadRequest("E-mail e senha são obrigatórios".to_string()));
    }

    let session = state.identity.login(&request.email, &request.password).await?;
    Ok(Json(session))
}
