use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use super::{
    BudgetRepository, DoctorRepository, IdentityRepository, ProfileRepository, RepoResult,
    SurgeryRequestRepository, TrackingRepository,
};
use crate::error::RepositoryError;
use crate::models::{
    Budget, DecisionUpdate, Doctor, Identity, Profile, Role, SurgeryRequest, TrackingStatus,
    UserBudgetTracking,
};

/// In-process store used when no database is configured and by the test suites.
pub struct MemoryStore {
    identities: DashMap<Uuid, Identity>,
    email_index: DashMap<String, Uuid>,
    profiles: DashMap<Uuid, Profile>,
    doctors: DashMap<Uuid, Doctor>,
    surgery_requests: DashMap<Uuid, SurgeryRequest>,
    budgets: DashMap<Uuid, Budget>,
    // Status checks and writes must happen under one lock.
    tracking: RwLock<std::collections::HashMap<Uuid, UserBudgetTracking>>,
    fail_profile_inserts: AtomicBool,
    fail_doctor_inserts: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            identities: DashMap::new(),
            email_index: DashMap::new(),
            profiles: DashMap::new(),
            doctors: DashMap::new(),
            surgery_requests: DashMap::new(),
            budgets: DashMap::new(),
            tracking: RwLock::new(std::collections::HashMap::new()),
            fail_profile_inserts: AtomicBool::new(false),
            fail_doctor_inserts: AtomicBool::new(false),
        }
    }

    /// Fault injection: make the next profile inserts fail.
    pub fn set_fail_profile_inserts(&self, fail: bool) {
        self.fail_profile_inserts.store(fail, Ordering::SeqCst);
    }

    /// Fault injection: make doctor-row inserts fail.
    pub fn set_fail_doctor_inserts(&self, fail: bool) {
        self.fail_doctor_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn doctor_count(&self) -> usize {
        self.doctors.len()
    }
}

#[async_trait]
impl IdentityRepository for MemoryStore {
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<Identity>> {
        let id = match self.email_index.get(email) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.identities.get(&id).map(|i| i.clone()))
    }

    async fn insert(&self, identity: &Identity) -> RepoResult<()> {
        match self.email_index.entry(identity.email.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "identity with e-mail {} already exists",
                identity.email
            ))),
            Entry::Vacant(slot) => {
                slot.insert(identity.id);
                self.identities.insert(identity.id, identity.clone());
                Ok(())
            }
        }
    }

    async fn delete(&self, id: Uuid) -> RepoResult<()> {
        if let Some((_, identity)) = self.identities.remove(&id) {
            self.email_index.remove(&identity.email);
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Profile>> {
        Ok(self.profiles.get(&id).map(|p| p.clone()))
    }

    async fn insert(&self, profile: &Profile) -> RepoResult<()> {
        if self.fail_profile_inserts.load(Ordering::SeqCst) {
            return Err(RepositoryError::Corrupt("injected profile insert failure".to_string()));
        }
        match self.profiles.entry(profile.id) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "profile {} already exists",
                profile.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(profile.clone());
                Ok(())
            }
        }
    }

    async fn is_doctor_profile(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self
            .profiles
            .get(&id)
            .map(|p| p.role == Role::Doctor)
            .unwrap_or(false))
    }
}

#[async_trait]
impl DoctorRepository for MemoryStore {
    async fn list(&self) -> RepoResult<Vec<Doctor>> {
        let mut doctors: Vec<Doctor> = self.doctors.iter().map(|d| d.value().clone()).collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(doctors)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Doctor>> {
        Ok(self.doctors.get(&id).map(|d| d.clone()))
    }

    async fn insert(&self, doctor: &Doctor) -> RepoResult<()> {
        if self.fail_doctor_inserts.load(Ordering::SeqCst) {
            return Err(RepositoryError::Corrupt("injected doctor insert failure".to_string()));
        }
        if self.doctors.iter().any(|d| d.crm == doctor.crm) {
            return Err(RepositoryError::Conflict(format!("CRM {} already registered", doctor.crm)));
        }
        self.doctors.insert(doctor.id, doctor.clone());
        Ok(())
    }
}

#[async_trait]
impl SurgeryRequestRepository for MemoryStore {
    async fn insert(&self, request: &SurgeryRequest) -> RepoResult<()> {
        self.surgery_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<SurgeryRequest>> {
        Ok(self.surgery_requests.get(&id).map(|r| r.clone()))
    }
}

#[async_trait]
impl BudgetRepository for MemoryStore {
    async fn insert(&self, budget: &Budget) -> RepoResult<()> {
        self.budgets.insert(budget.id, budget.clone());
        Ok(())
    }

    async fn update(&self, budget: &Budget) -> RepoResult<()> {
        match self.budgets.get_mut(&budget.id) {
            Some(mut existing) => {
                *existing = budget.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Budget>> {
        Ok(self.budgets.get(&id).map(|b| b.clone()))
    }
}

#[async_trait]
impl TrackingRepository for MemoryStore {
    async fn insert(&self, record: &UserBudgetTracking) -> RepoResult<()> {
        self.tracking.write().insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<UserBudgetTracking>> {
        Ok(self.tracking.read().get(&id).cloned())
    }

    async fn exists_for_user(&self, surgery_request_id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        Ok(self
            .tracking
            .read()
            .values()
            .any(|r| r.surgery_request_id == surgery_request_id && r.user_id == user_id))
    }

    async fn attach_budget(
        &self,
        id: Uuid,
        budget_id: Uuid,
        expected: TrackingStatus,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let mut records = self.tracking.write();
        let record = records.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if record.status != expected {
            return Ok(false);
        }
        record.budget_id = Some(budget_id);
        record.status = TrackingStatus::AwaitingPatient;
        record.updated_at = updated_at;
        Ok(true)
    }

    async fn apply_decision(
        &self,
        id: Uuid,
        update: &DecisionUpdate,
        expected: TrackingStatus,
    ) -> RepoResult<bool> {
        let mut records = self.tracking.write();
        let record = records.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if record.status != expected {
            return Ok(false);
        }
        record.user_approval = Some(update.user_approval);
        record.status = update.status;
        record.user_feedback = update.user_feedback.clone();
        record.updated_at = update.updated_at;
        Ok(true)
    }
}
