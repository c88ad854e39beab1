//! Storage seams. Each concern has a trait so services run unchanged
//! against Postgres in production and the in-memory store in tests.

pub mod budget_repo;
pub mod memory;
pub mod user_repo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::{
    Budget, DecisionUpdate, Doctor, Identity, Profile, SurgeryRequest, TrackingStatus,
    UserBudgetTracking,
};

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<Identity>>;
    /// Fails with `Conflict` when the e-mail is already registered.
    async fn insert(&self, identity: &Identity) -> RepoResult<()>;
    async fn delete(&self, id: Uuid) -> RepoResult<()>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Profile>>;
    async fn insert(&self, profile: &Profile) -> RepoResult<()>;
    /// True when a profile with this id exists and has the doctor role.
    async fn is_doctor_profile(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait DoctorRepository: Send + Sync {
    /// All doctors ordered by name.
    async fn list(&self) -> RepoResult<Vec<Doctor>>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Doctor>>;
    async fn insert(&self, doctor: &Doctor) -> RepoResult<()>;
}

#[async_trait]
pub trait SurgeryRequestRepository: Send + Sync {
    async fn insert(&self, request: &SurgeryRequest) -> RepoResult<()>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<SurgeryRequest>>;
}

#[async_trait]
pub trait BudgetRepository: Send + Sync {
    async fn insert(&self, budget: &Budget) -> RepoResult<()>;
    /// Overwrites every column of an existing budget. `NotFound` if it does not exist.
    async fn update(&self, budget: &Budget) -> RepoResult<()>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Budget>>;
}

#[async_trait]
pub trait TrackingRepository: Send + Sync {
    async fn insert(&self, record: &UserBudgetTracking) -> RepoResult<()>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<UserBudgetTracking>>;
    /// True when `user_id` owns a tracking record for the surgery request.
    async fn exists_for_user(&self, surgery_request_id: Uuid, user_id: Uuid) -> RepoResult<bool>;

    /// Sets budget and status only if the record is still in `expected`.
    /// Returns false when the status moved underneath the caller.
    async fn attach_budget(
        &self,
        id: Uuid,
        budget_id: Uuid,
        expected: TrackingStatus,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<bool>;

    /// Writes `user_approval`, `status`, `user_feedback` and the timestamp, nothing else,
    /// only if the record is still in `expected`.
    async fn apply_decision(
        &self,
        id: Uuid,
        update: &DecisionUpdate,
        expected: TrackingStatus,
    ) -> RepoResult<bool>;
}

/// The full set of stores the services need.
#[derive(Clone)]
pub struct Repositories {
    pub identities: Arc<dyn IdentityRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub doctors: Arc<dyn DoctorRepository>,
    pub surgery_requests: Arc<dyn SurgeryRequestRepository>,
    pub budgets: Arc<dyn BudgetRepository>,
    pub tracking: Arc<dyn TrackingRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        let users = Arc::new(user_repo::PgUserRepository::new(pool.clone()));
        let budgets = Arc::new(budget_repo::PgBudgetRepository::new(pool));
        Self {
            identities: users.clone(),
            profiles: users.clone(),
            doctors: users,
            surgery_requests: budgets.clone(),
            budgets: budgets.clone(),
            tracking: budgets,
        }
    }

    pub fn memory() -> Self {
        Self::from_memory(Arc::new(memory::MemoryStore::new()))
    }

    /// Shares an existing store, so tests can inspect what the services wrote.
    pub fn from_memory(store: Arc<memory::MemoryStore>) -> Self {
        Self {
            identities: store.clone(),
            profiles: store.clone(),
            doctors: store.clone(),
            surgery_requests: store.clone(),
            budgets: store.clone(),
            tracking: store,
        }
    }
}
