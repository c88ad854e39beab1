use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::MAX_JWT_TTL_MINUTES;
use crate::error::{AuthError, RepositoryError};
use crate::logger::mask_email;
use crate::models::{Identity, Profile, Role};
use crate::repository::{IdentityRepository, ProfileRepository};
use crate::utils::normalize_email;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::Unauthorized)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: Profile,
}

/// Password identities and the session tokens issued for them.
pub struct IdentityService {
    identities: Arc<dyn IdentityRepository>,
    profiles: Arc<dyn ProfileRepository>,
    jwt_secret: String,
    token_ttl: Duration,
}

impl IdentityService {
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        profiles: Arc<dyn ProfileRepository>,
        jwt_secret: &str,
        token_ttl_minutes: i64,
    ) -> Self {
        Self {
            identities,
            profiles,
            jwt_secret: jwt_secret.to_string(),
            token_ttl: Duration::minutes(token_ttl_minutes.clamp(1, MAX_JWT_TTL_MINUTES)),
        }
    }

    /// Argon2 is CPU-bound, so hashing runs off the async workers.
    pub async fn hash_password(password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| AuthError::Hashing(e.to_string()))
        })
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
    }

    pub async fn verify_password(password: &str, hash: &str) -> bool {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || {
            PasswordHash::new(&hash)
                .map(|parsed| {
                    Argon2::default()
                        .verify_password(password.as_bytes(), &parsed)
                        .is_ok()
                })
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }

    pub async fn find_identity(&self, email: &str) -> Result<Option<Identity>, AuthError> {
        Ok(self.identities.find_by_email(&normalize_email(email)).await?)
    }

    /// Creates a password identity. `Conflict` from storage means the e-mail is taken.
    pub async fn create_identity(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash: Self::hash_password(password).await?,
            created_at: Utc::now(),
        };
        self.identities.insert(&identity).await?;

        tracing::info!(identity_id = %identity.id, email = %mask_email(&identity.email), "Identity created");
        Ok(identity)
    }

    pub async fn delete_identity(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.identities.delete(id).await?;
        tracing::info!(identity_id = %id, "Identity deleted");
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let identity = self
            .find_identity(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !Self::verify_password(password, &identity.password_hash).await {
            tracing::warn!(email = %mask_email(&identity.email), "Login failed");
            return Err(AuthError::InvalidCredentials);
        }

        // An identity without a profile is an orphan; it cannot act in the app.
        let profile = self
            .profiles
            .find_by_id(identity.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let (access_token, expires_at) = self.issue_token(&profile)?;
        tracing::info!(user_id = %profile.id, role = %profile.role, "Login succeeded");

        Ok(Session {
            access_token,
            token_type: "Bearer",
            expires_at,
            user: profile,
        })
    }

    pub fn issue_token(&self, profile: &Profile) -> Result<(String, DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;
        let claims = Claims {
            sub: profile.id.to_string(),
            email: profile.email.clone(),
            role: profile.role,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;
        Ok((token, expires_at))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::Unauthorized)?;
        Ok(data.claims)
    }
}
