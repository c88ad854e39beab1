use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppError;
use crate::models::Doctor;
use crate::services::AppState;

pub async fn list_doctors(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Doctor>>, AppError> {
    let doctors = state.repos.doctors.list().await?;
    Ok(Json(doctors))
}
