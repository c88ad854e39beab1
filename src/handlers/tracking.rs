use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{require_staff, ApiJson, AppError};
use crate::models::{UserBudgetTracking, UserDecision};
use crate::services::budgets::Actor;
use crate::services::identity::Claims;
use crate::services::AppState;

#[derive(Deserialize)]
pub struct CreateTrackingRequest {
    pub surgery_request_id: Uuid,
    /// Staff may open tracking on behalf of a user; defaults to the caller.
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct AttachBudgetRequest {
    pub budget_id: Uuid,
}

#[derive(Deserialize)]
pub struct DecisionRequest {
    pub decision: UserDecision,
    #[serde(default)]
    pub feedback: Option<String>,
}

fn actor(claims: &Claims) -> Result<Actor, AppError> {
    Ok(Actor::from_claims(claims)?)
}

pub async fn create_tracking(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiJson(request): ApiJson<CreateTrackingRequest>,
) -> Result<(StatusCode, Json<UserBudgetTracking>), AppError> {
    let caller = claims.user_id()?;
    let owner = match request.user_id {
        Some(user_id) if user_id != caller => {
            require_staff(&claims)?;
            user_id
        }
        _ => caller,
    };

    let record = state
        .budgets
        .create_tracking(request.surgery_request_id, owner)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_tracking(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserBudgetTracking>, AppError> {
    Ok(Json(state.budgets.get_tracking(id, actor(&claims)?).await?))
}

pub async fn attach_budget(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<AttachBudgetRequest>,
) -> Result<Json<UserBudgetTracking>, AppError> {
    require_staff(&claims)?;
    Ok(Json(state.budgets.attach_budget(id, request.budget_id).await?))
}

pub async fn record_decision(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<DecisionRequest>,
) -> Result<Json<UserBudgetTracking>, AppError> {
    let record = state
        .budgets
        .record_user_decision(id, actor(&claims)?, request.decision, request.feedback)
        .await?;
    Ok(Json(record))
}
