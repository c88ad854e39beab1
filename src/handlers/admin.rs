use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiJson, AppError};
use crate::services::identity::Claims;
use crate::services::provisioning::{CreateUserRequest, CreatedUser};
use crate::services::AppState;

#[derive(Serialize)]
pub struct CreateUserResponse {
    pub message: &'static str,
    pub user: CreatedUser,
}

/// `POST /api/admin/create-user` and `POST /functions/v1/create-user`.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    tracing::info!(admin_id = %claims.sub, role = %request.role, "Create user requested");

    let user = state.provisioning.create_user(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            message: "Usuário criado com sucesso",
            user,
        }),
    ))
}
