use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApprovalError, AuthError, BudgetError, PricingError};
use crate::models::{
    Budget, BudgetInput, NewSurgeryRequest, SurgeryRequest, UserBudgetTracking, UserDecision,
    Role, MAX_AMOUNT,
};
use crate::repository::{BudgetRepository, Repositories, SurgeryRequestRepository, TrackingRepository};
use crate::services::approval::{self, ApprovalPolicy};
use crate::services::identity::Claims;
use crate::services::pricing::{compute_budget_total, BudgetBreakdown, ServiceFeeRate};

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        Ok(Self {
            user_id: claims.user_id()?,
            role: claims.role,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetView {
    #[serde(flatten)]
    pub budget: Budget,
    pub breakdown: BudgetBreakdown,
}

pub struct BudgetService {
    surgery_requests: Arc<dyn SurgeryRequestRepository>,
    budgets: Arc<dyn BudgetRepository>,
    tracking: Arc<dyn TrackingRepository>,
    rate: ServiceFeeRate,
    policy: ApprovalPolicy,
}

impl BudgetService {
    pub fn new(repos: &Repositories, rate: ServiceFeeRate, policy: ApprovalPolicy) -> Self {
        Self {
            surgery_requests: repos.surgery_requests.clone(),
            budgets: repos.budgets.clone(),
            tracking: repos.tracking.clone(),
            rate,
            policy,
        }
    }

    pub fn rate(&self) -> ServiceFeeRate {
        self.rate
    }

    pub async fn create_surgery_request(
        &self,
        input: NewSurgeryRequest,
        created_by: Option<Uuid>,
    ) -> Result<SurgeryRequest, BudgetError> {
        let doctor_fee = input.validate().map_err(BudgetError::Validation)?;
        let request = input.into_request(doctor_fee, created_by);
        self.surgery_requests.insert(&request).await?;

        tracing::info!(surgery_request_id = %request.id, doctor_id = %request.doctor_id, "Surgery request created");
        Ok(request)
    }

    pub async fn get_surgery_request(&self, id: Uuid) -> Result<SurgeryRequest, BudgetError> {
        self.surgery_requests
            .find_by_id(id)
            .await?
            .ok_or(BudgetError::SurgeryRequestNotFound(id))
    }

    /// Staff see every request; patients only the ones they submitted or are tracking.
    async fn ensure_can_view(&self, request: &SurgeryRequest, actor: Actor) -> Result<(), BudgetError> {
        if actor.role.is_staff() || request.created_by == Some(actor.user_id) {
            return Ok(());
        }
        if self.tracking.exists_for_user(request.id, actor.user_id).await? {
            return Ok(());
        }
        tracing::warn!(user_id = %actor.user_id, surgery_request_id = %request.id, "Read refused");
        Err(BudgetError::NotOwner)
    }

    pub async fn view_surgery_request(&self, id: Uuid, actor: Actor) -> Result<SurgeryRequest, BudgetError> {
        let request = self.get_surgery_request(id).await?;
        self.ensure_can_view(&request, actor).await?;
        Ok(request)
    }

    fn price(&self, request: &SurgeryRequest, mut budget: Budget) -> Result<BudgetView, BudgetError> {
        let breakdown = compute_budget_total(request, &budget, self.rate)
            .map_err(|e| BudgetError::Validation(e.to_string()))?;
        if breakdown.total > MAX_AMOUNT {
            return Err(BudgetError::Validation(PricingError::Overflow.to_string()));
        }
        budget.total_cost = breakdown.total;
        Ok(BudgetView { budget, breakdown })
    }

    pub async fn create_budget(&self, input: BudgetInput) -> Result<BudgetView, BudgetError> {
        input.validate().map_err(BudgetError::Validation)?;
        let request = self.get_surgery_request(input.surgery_request_id).await?;

        let view = self.price(&request, input.into_budget())?;
        self.budgets.insert(&view.budget).await?;

        tracing::info!(
            budget_id = %view.budget.id,
            surgery_request_id = %request.id,
            total = %view.breakdown.total,
            "Budget created"
        );
        Ok(view)
    }

    pub async fn update_budget(&self, id: Uuid, input: BudgetInput) -> Result<BudgetView, BudgetError> {
        input.validate().map_err(BudgetError::Validation)?;
        let mut budget = self
            .budgets
            .find_by_id(id)
            .await?
            .ok_or(BudgetError::BudgetNotFound(id))?;
        let request = self.get_surgery_request(input.surgery_request_id).await?;

        input.apply_to(&mut budget);
        budget.updated_at = Utc::now();
        let view = self.price(&request, budget)?;
        self.budgets.update(&view.budget).await?;

        tracing::info!(budget_id = %id, total = %view.breakdown.total, "Budget updated");
        Ok(view)
    }

    pub async fn get_budget(&self, id: Uuid, actor: Actor) -> Result<BudgetView, BudgetError> {
        let budget = self
            .budgets
            .find_by_id(id)
            .await?
            .ok_or(BudgetError::BudgetNotFound(id))?;
        let request = self.get_surgery_request(budget.surgery_request_id).await?;
        self.ensure_can_view(&request, actor).await?;

        let stored_total = budget.total_cost;
        let view = self.price(&request, budget)?;
        if view.breakdown.total != stored_total {
            // The request changed after the budget was priced.
            tracing::warn!(
                budget_id = %id,
                stored = %stored_total,
                recomputed = %view.breakdown.total,
                "Stored budget total is stale"
            );
        }
        Ok(view)
    }

    pub async fn create_tracking(
        &self,
        surgery_request_id: Uuid,
        user_id: Uuid,
    ) -> Result<UserBudgetTracking, BudgetError> {
        self.get_surgery_request(surgery_request_id).await?;
        let record = UserBudgetTracking::new(surgery_request_id, user_id);
        self.tracking.insert(&record).await?;

        tracing::info!(tracking_id = %record.id, %surgery_request_id, "Budget tracking opened");
        Ok(record)
    }

    async fn load_tracking(&self, id: Uuid) -> Result<UserBudgetTracking, BudgetError> {
        self.tracking
            .find_by_id(id)
            .await?
            .ok_or(BudgetError::TrackingNotFound(id))
    }

    pub async fn get_tracking(&self, id: Uuid, actor: Actor) -> Result<UserBudgetTracking, BudgetError> {
        let record = self.load_tracking(id).await?;
        if !actor.is_admin() && record.user_id != actor.user_id {
            return Err(BudgetError::NotOwner);
        }
        Ok(record)
    }

    /// Sends a priced budget to the patient: `in_progress -> awaiting_patient`.
    pub async fn attach_budget(
        &self,
        tracking_id: Uuid,
        budget_id: Uuid,
    ) -> Result<UserBudgetTracking, BudgetError> {
        let record = self.load_tracking(tracking_id).await?;
        let budget = self
            .budgets
            .find_by_id(budget_id)
            .await?
            .ok_or(BudgetError::BudgetNotFound(budget_id))?;
        if budget.surgery_request_id != record.surgery_request_id {
            return Err(BudgetError::Validation(
                "Orçamento não pertence a esta solicitação de cirurgia".to_string(),
            ));
        }

        let expected = approval::attach_budget(&record, self.policy)?;
        let applied = self
            .tracking
            .attach_budget(tracking_id, budget_id, expected, Utc::now())
            .await?;
        let updated = self.load_tracking(tracking_id).await?;
        if !applied {
            return Err(ApprovalError::CannotAttachBudget { current: updated.status }.into());
        }

        tracing::info!(%tracking_id, %budget_id, "Budget sent to patient");
        Ok(updated)
    }

    /// Records the patient's answer. Only valid while the record awaits the patient.
    pub async fn record_user_decision(
        &self,
        tracking_id: Uuid,
        actor: Actor,
        decision: UserDecision,
        feedback: Option<String>,
    ) -> Result<UserBudgetTracking, BudgetError> {
        let record = self.get_tracking(tracking_id, actor).await?;
        let update = approval::record_user_decision(&record, decision, feedback, Utc::now())?;

        let applied = self
            .tracking
            .apply_decision(tracking_id, &update, record.status)
            .await?;
        let updated = self.load_tracking(tracking_id).await?;
        if !applied {
            tracing::warn!(%tracking_id, current = %updated.status, "Decision lost a concurrent update");
            return Err(ApprovalError::NotAwaitingPatient { current: updated.status }.into());
        }

        tracing::info!(%tracking_id, decision = decision.as_str(), "User decision recorded");
        Ok(updated)
    }
}
