pub mod admin;
pub mod auth;
pub mod budgets;
pub mod doctors;
pub mod health;
pub mod tracking;

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::{AuthError, BudgetError, ProvisioningError, RepositoryError};
use crate::middleware::auth::{require_admin, require_auth, require_function_key};
use crate::services::identity::Claims;
use crate::services::AppState;

const INTERNAL_ERROR_MESSAGE: &str = "Erro interno do servidor";

/// Error returned by every handler. Client errors carry a pt-BR message;
/// internal errors are logged and answered with a generic one.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl AppError {
    fn internal(err: impl std::fmt::Display, public: &str) -> Self {
        tracing::error!(error = %err, "Request failed");
        AppError::Internal(public.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::BadRequest(m)
            | AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::NotFound(m)
            | AppError::Conflict(m)
            | AppError::Internal(m) => m,
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Requisição inválida: {}", rejection.body_text()))
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => AppError::NotFound("Registro não encontrado".to_string()),
            other => AppError::internal(other, INTERNAL_ERROR_MESSAGE),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::Unauthorized => {
                AppError::Unauthorized(err.to_string())
            }
            AuthError::Forbidden => AppError::Forbidden(err.to_string()),
            other => AppError::internal(other, INTERNAL_ERROR_MESSAGE),
        }
    }
}

impl From<ProvisioningError> for AppError {
    fn from(err: ProvisioningError) -> Self {
        match err {
            ProvisioningError::Validation(_) | ProvisioningError::DoctorNotFound => {
                AppError::BadRequest(err.to_string())
            }
            ProvisioningError::EmailTaken => AppError::Conflict(err.to_string()),
            ProvisioningError::IdentityCreation(ref source) => {
                let public = err.to_string();
                AppError::internal(source, &public)
            }
            ProvisioningError::ProfileCreation(ref source) => {
                let public = err.to_string();
                AppError::internal(source, &public)
            }
            ProvisioningError::Repository(source) => AppError::internal(source, INTERNAL_ERROR_MESSAGE),
        }
    }
}

impl From<BudgetError> for AppError {
    fn from(err: BudgetError) -> Self {
        match err {
            BudgetError::Validation(m) => AppError::BadRequest(m),
            BudgetError::SurgeryRequestNotFound(_)
            | BudgetError::BudgetNotFound(_)
            | BudgetError::TrackingNotFound(_) => AppError::NotFound(err.to_string()),
            BudgetError::NotOwner => AppError::Forbidden(err.to_string()),
            BudgetError::Approval(e) => AppError::Conflict(e.to_string()),
            BudgetError::Repository(e) => e.into(),
        }
    }
}

/// `Json` whose rejections use the `{ "error": ... }` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Budgets and tracking are managed by clinic staff, not by patients.
pub fn require_staff(claims: &Claims) -> Result<(), AppError> {
    if claims.role.is_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Acesso restrito à equipe".to_string()))
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/api/admin/create-user", post(admin::create_user))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let functions = Router::new()
        .route(
            "/functions/v1/create-user",
            post(admin::create_user).route_layer(from_fn_with_state(state.clone(), require_admin)),
        )
        .route("/functions/v1/doctors", get(doctors::list_doctors))
        .route("/functions/v1/health", get(health::health_check))
        .route_layer(from_fn_with_state(state.clone(), require_function_key));

    let api = Router::new()
        .route("/api/doctors", get(doctors::list_doctors))
        .route("/api/surgery-requests", post(budgets::create_surgery_request))
        .route("/api/surgery-requests/:id", get(budgets::get_surgery_request))
        .route("/api/budgets", post(budgets::create_budget))
        .route("/api/budgets/:id", get(budgets::get_budget).put(budgets::update_budget))
        .route("/api/tracking", post(tracking::create_tracking))
        .route("/api/tracking/:id", get(tracking::get_tracking))
        .route("/api/tracking/:id/budget", post(tracking::attach_budget))
        .route("/api/tracking/:id/decision", post(tracking::record_decision))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/login", post(auth::login))
        .merge(admin)
        .merge(functions)
        .merge(api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
