use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{require_staff, ApiJson, AppError};
use crate::models::{BudgetInput, NewSurgeryRequest, SurgeryRequest};
use crate::services::budgets::{Actor, BudgetView};
use crate::services::identity::Claims;
use crate::services::AppState;

pub async fn create_surgery_request(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiJson(input): ApiJson<NewSurgeryRequest>,
) -> Result<(StatusCode, Json<SurgeryRequest>), AppError> {
    let created_by = claims.user_id()?;
    let request = state.budgets.create_surgery_request(input, Some(created_by)).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn get_surgery_request(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SurgeryRequest>, AppError> {
    let actor = Actor::from_claims(&claims)?;
    Ok(Json(state.budgets.view_surgery_request(id, actor).await?))
}

pub async fn create_budget(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiJson(input): ApiJson<BudgetInput>,
) -> Result<(StatusCode, Json<BudgetView>), AppError> {
    require_staff(&claims)?;
    let view = state.budgets.create_budget(input).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_budget(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<BudgetInput>,
) -> Result<Json<BudgetView>, AppError> {
    require_staff(&claims)?;
    Ok(Json(state.budgets.update_budget(id, input).await?))
}

pub async fn get_budget(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<BudgetView>, AppError> {
    let actor = Actor::from_claims(&claims)?;
    Ok(Json(state.budgets.get_budget(id, actor).await?))
}
