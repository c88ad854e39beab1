//! Admin user provisioning. Both HTTP surfaces go through `ProvisioningService`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AuthError, ProvisioningError, RepositoryError};
use crate::logger::mask_email;
use crate::models::{Doctor, Profile, Role};
use crate::repository::{DoctorRepository, ProfileRepository};
use crate::services::identity::IdentityService;
use crate::utils::{generate_password, is_valid_email, normalize_email};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub crm: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreatedUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_generated: bool,
    /// Only present when the password was generated; shown once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// A request that passed validation.
#[derive(Debug)]
struct ValidatedUser {
    email: String,
    name: String,
    role: Role,
    password: Option<String>,
    crm: Option<String>,
    specialty: Option<String>,
    doctor_id: Option<Uuid>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate(request: CreateUserRequest) -> Result<ValidatedUser, ProvisioningError> {
    let invalid = |msg: &str| ProvisioningError::Validation(msg.to_string());

    let email = normalize_email(&request.email);
    if email.is_empty() {
        return Err(invalid("E-mail é obrigatório"));
    }
    if !is_valid_email(&email) {
        return Err(invalid("E-mail inválido"));
    }

    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(invalid("Nome é obrigatório"));
    }

    let role: Role = request
        .role
        .parse()
        .map_err(|_| invalid("Perfil inválido. Use admin, doctor, secretary ou user"))?;

    let password = request.password.filter(|p| !p.is_empty());
    if matches!(&password, Some(p) if p.chars().count() < MIN_PASSWORD_LEN) {
        return Err(ProvisioningError::Validation(format!(
            "A senha deve ter pelo menos {} caracteres",
            MIN_PASSWORD_LEN
        )));
    }

    let crm = non_blank(request.crm);
    let specialty = non_blank(request.specialty);
    if role == Role::Doctor {
        if crm.is_none() {
            return Err(invalid("CRM é obrigatório para médicos"));
        }
        if specialty.is_none() {
            return Err(invalid("Especialidade é obrigatória para médicos"));
        }
    }

    let doctor_id = if role == Role::Secretary { request.doctor_id } else { None };

    Ok(ValidatedUser {
        email,
        name,
        role,
        password,
        crm,
        specialty,
        doctor_id,
    })
}

pub struct ProvisioningService {
    identity: Arc<IdentityService>,
    profiles: Arc<dyn ProfileRepository>,
    doctors: Arc<dyn DoctorRepository>,
}

impl ProvisioningService {
    pub fn new(
        identity: Arc<IdentityService>,
        profiles: Arc<dyn ProfileRepository>,
        doctors: Arc<dyn DoctorRepository>,
    ) -> Self {
        Self {
            identity,
            profiles,
            doctors,
        }
    }

    /// A doctor is known if it has a doctor row or a doctor-role profile.
    async fn doctor_exists(&self, id: Uuid) -> Result<bool, RepositoryError> {
        if self.doctors.find_by_id(id).await?.is_some() {
            return Ok(true);
        }
        self.profiles.is_doctor_profile(id).await
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<CreatedUser, ProvisioningError> {
        let user = validate(request)?;

        if let Some(doctor_id) = user.doctor_id {
            if !self.doctor_exists(doctor_id).await? {
                tracing::warn!(%doctor_id, "Secretary linked to unknown doctor");
                return Err(ProvisioningError::DoctorNotFound);
            }
        }

        if self
            .identity
            .find_identity(&user.email)
            .await
            .map_err(ProvisioningError::IdentityCreation)?
            .is_some()
        {
            return Err(ProvisioningError::EmailTaken);
        }

        let (password, password_generated) = match user.password {
            Some(p) => (p, false),
            None => (generate_password(), true),
        };

        let identity = match self.identity.create_identity(&user.email, &password).await {
            Ok(identity) => identity,
            Err(AuthError::Repository(RepositoryError::Conflict(_))) => {
                return Err(ProvisioningError::EmailTaken)
            }
            Err(e) => {
                tracing::error!(error = %e, email = %mask_email(&user.email), "Identity creation failed");
                return Err(ProvisioningError::IdentityCreation(e));
            }
        };

        let profile = Profile::new(identity.id, &identity.email, &user.name, user.role, user.doctor_id);
        if let Err(e) = self.profiles.insert(&profile).await {
            tracing::error!(error = %e, user_id = %identity.id, "Profile insert failed, removing identity");
            if let Err(cleanup) = self.identity.delete_identity(identity.id).await {
                tracing::error!(error = %cleanup, user_id = %identity.id, "Orphaned identity could not be removed");
            }
            return Err(ProvisioningError::ProfileCreation(e));
        }

        if user.role == Role::Doctor {
            let doctor = Doctor {
                id: Uuid::new_v4(),
                profile_id: Some(profile.id),
                name: profile.name.clone(),
                email: Some(profile.email.clone()),
                crm: user.crm.unwrap_or_default(),
                specialty: user.specialty.unwrap_or_default(),
                created_at: Utc::now(),
            };
            // Best effort: the account is usable without the doctor row.
            if let Err(e) = self.doctors.insert(&doctor).await {
                tracing::warn!(error = %e, user_id = %profile.id, "Doctor record insert failed");
            }
        }

        tracing::info!(
            user_id = %profile.id,
            email = %mask_email(&profile.email),
            role = %profile.role,
            password_generated,
            "User provisioned"
        );

        Ok(CreatedUser {
            id: profile.id,
            email: profile.email,
            name: profile.name,
            role: profile.role,
            password_generated,
            password: password_generated.then_some(password),
        })
    }

    /// Creates the configured admin on first start; a no-op once the e-mail exists.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, ProvisioningError> {
        let request = CreateUserRequest {
            email: email.to_string(),
            password: Some(password.to_string()),
            name: "Administrador".to_string(),
            role: Role::Admin.as_str().to_string(),
            crm: None,
            specialty: None,
            doctor_id: None,
        };
        match self.create_user(request).await {
            Ok(_) => Ok(true),
            Err(ProvisioningError::EmailTaken) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
