use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{BudgetRepository, RepoResult, SurgeryRequestRepository, TrackingRepository};
use crate::error::RepositoryError;
use crate::models::{
    Budget, BudgetStatus, DecisionUpdate, OpmeQuote, OpmeRequest, SurgeryRequest, TrackingStatus,
    UserBudgetTracking, UserDecision,
};

pub struct PgBudgetRepository {
    pool: PgPool,
}

impl PgBudgetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SURGERY_REQUEST_COLUMNS: &str = "id, patient_id, doctor_id, procedure_id, needs_icu, \
     icu_days, ward_days, room_days, doctor_fee, needs_blood_reserve, blood_units, \
     evoked_potential, opme_requests, created_by, created_at, updated_at";

const BUDGET_COLUMNS: &str = "id, surgery_request_id, hospital_id, icu_daily_cost, \
     ward_daily_cost, room_daily_cost, anesthetist_fee, evoked_potential_fee, doctor_fee, \
     opme_quotes, total_cost, status, created_at, updated_at";

const TRACKING_COLUMNS: &str = "id, surgery_request_id, user_id, budget_id, status, \
     user_approval, user_feedback, created_at, updated_at";

fn surgery_request_from_row(row: &PgRow) -> SurgeryRequest {
    let Json(opme_requests): Json<Vec<OpmeRequest>> = row.get("opme_requests");
    SurgeryRequest {
        id: row.get("id"),
        patient_id: row.get("patient_id"),
        doctor_id: row.get("doctor_id"),
        procedure_id: row.get("procedure_id"),
        needs_icu: row.get("needs_icu"),
        icu_days: row.get("icu_days"),
        ward_days: row.get("ward_days"),
        room_days: row.get("room_days"),
        doctor_fee: row.get("doctor_fee"),
        needs_blood_reserve: row.get("needs_blood_reserve"),
        blood_units: row.get("blood_units"),
        evoked_potential: row.get("evoked_potential"),
        opme_requests,
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn budget_from_row(row: &PgRow) -> RepoResult<Budget> {
    let Json(opme_quotes): Json<Vec<OpmeQuote>> = row.get("opme_quotes");
    let status: String = row.get("status");
    Ok(Budget {
        id: row.get("id"),
        surgery_request_id: row.get("surgery_request_id"),
        hospital_id: row.get("hospital_id"),
        icu_daily_cost: row.get("icu_daily_cost"),
        ward_daily_cost: row.get("ward_daily_cost"),
        room_daily_cost: row.get("room_daily_cost"),
        anesthetist_fee: row.get("anesthetist_fee"),
        evoked_potential_fee: row.get("evoked_potential_fee"),
        doctor_fee: row.get("doctor_fee"),
        opme_quotes,
        total_cost: row.get("total_cost"),
        status: status.parse::<BudgetStatus>().map_err(RepositoryError::Corrupt)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn tracking_from_row(row: &PgRow) -> RepoResult<UserBudgetTracking> {
    let status: String = row.get("status");
    let approval: Option<String> = row.get("user_approval");
    Ok(UserBudgetTracking {
        id: row.get("id"),
        surgery_request_id: row.get("surgery_request_id"),
        user_id: row.get("user_id"),
        budget_id: row.get("budget_id"),
        status: status.parse::<TrackingStatus>().map_err(RepositoryError::Corrupt)?,
        user_approval: approval
            .map(|a| a.parse::<UserDecision>())
            .transpose()
            .map_err(RepositoryError::Corrupt)?,
        user_feedback: row.get("user_feedback"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl SurgeryRequestRepository for PgBudgetRepository {
    async fn insert(&self, request: &SurgeryRequest) -> RepoResult<()> {
        sqlx::query(&format!(
            "INSERT INTO surgery_requests ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            SURGERY_REQUEST_COLUMNS
        ))
        .bind(request.id)
        .bind(request.patient_id)
        .bind(request.doctor_id)
        .bind(request.procedure_id)
        .bind(request.needs_icu)
        .bind(request.icu_days)
        .bind(request.ward_days)
        .bind(request.room_days)
        .bind(request.doctor_fee)
        .bind(request.needs_blood_reserve)
        .bind(request.blood_units)
        .bind(request.evoked_potential)
        .bind(Json(&request.opme_requests))
        .bind(request.created_by)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<SurgeryRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM surgery_requests WHERE id = $1",
            SURGERY_REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(surgery_request_from_row))
    }
}

#[async_trait]
impl BudgetRepository for PgBudgetRepository {
    async fn insert(&self, budget: &Budget) -> RepoResult<()> {
        sqlx::query(&format!(
            "INSERT INTO budgets ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            BUDGET_COLUMNS
        ))
        .bind(budget.id)
        .bind(budget.surgery_request_id)
        .bind(budget.hospital_id)
        .bind(budget.icu_daily_cost)
        .bind(budget.ward_daily_cost)
        .bind(budget.room_daily_cost)
        .bind(budget.anesthetist_fee)
        .bind(budget.evoked_potential_fee)
        .bind(budget.doctor_fee)
        .bind(Json(&budget.opme_quotes))
        .bind(budget.total_cost)
        .bind(budget.status.as_str())
        .bind(budget.created_at)
        .bind(budget.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, budget: &Budget) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE budgets SET surgery_request_id = $2, hospital_id = $3, icu_daily_cost = $4,
                 ward_daily_cost = $5, room_daily_cost = $6, anesthetist_fee = $7,
                 evoked_potential_fee = $8, doctor_fee = $9, opme_quotes = $10,
                 total_cost = $11, status = $12, updated_at = $13
             WHERE id = $1",
        )
        .bind(budget.id)
        .bind(budget.surgery_request_id)
        .bind(budget.hospital_id)
        .bind(budget.icu_daily_cost)
        .bind(budget.ward_daily_cost)
        .bind(budget.room_daily_cost)
        .bind(budget.anesthetist_fee)
        .bind(budget.evoked_potential_fee)
        .bind(budget.doctor_fee)
        .bind(Json(&budget.opme_quotes))
        .bind(budget.total_cost)
        .bind(budget.status.as_str())
        .bind(budget.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Budget>> {
        let row = sqlx::query(&format!("SELECT {} FROM budgets WHERE id = $1", BUDGET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(budget_from_row).transpose()
    }
}

#[async_trait]
impl TrackingRepository for PgBudgetRepository {
    async fn insert(&self, record: &UserBudgetTracking) -> RepoResult<()> {
        sqlx::query(&format!(
            "INSERT INTO user_budget_tracking ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            TRACKING_COLUMNS
        ))
        .bind(record.id)
        .bind(record.surgery_request_id)
        .bind(record.user_id)
        .bind(record.budget_id)
        .bind(record.status.as_str())
        .bind(record.user_approval.map(|d| d.as_str()))
        .bind(&record.user_feedback)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<UserBudgetTracking>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM user_budget_tracking WHERE id = $1",
            TRACKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(tracking_from_row).transpose()
    }

    async fn exists_for_user(&self, surgery_request_id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_budget_tracking
                            WHERE surgery_request_id = $1 AND user_id = $2)",
        )
        .bind(surgery_request_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn attach_budget(
        &self,
        id: Uuid,
        budget_id: Uuid,
        expected: TrackingStatus,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE user_budget_tracking
             SET budget_id = $2, status = $3, updated_at = $4
             WHERE id = $1 AND status = $5",
        )
        .bind(id)
        .bind(budget_id)
        .bind(TrackingStatus::AwaitingPatient.as_str())
        .bind(updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn apply_decision(
        &self,
        id: Uuid,
        update: &DecisionUpdate,
        expected: TrackingStatus,
    ) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE user_budget_tracking
             SET user_approval = $2, status = $3, user_feedback = $4, updated_at = $5
             WHERE id = $1 AND status = $6",
        )
        .bind(id)
        .bind(update.user_approval.as_str())
        .bind(update.status.as_str())
        .bind(&update.user_feedback)
        .bind(update.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
