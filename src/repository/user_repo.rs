use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{DoctorRepository, IdentityRepository, ProfileRepository, RepoResult};
use crate::error::RepositoryError;
use crate::models::{Doctor, Identity, Profile, Role};

const UNIQUE_VIOLATION: &str = "23505";

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn map_unique_violation(err: sqlx::Error, what: &str) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            RepositoryError::Conflict(format!("{} already exists", what))
        }
        _ => RepositoryError::Database(err),
    }
}

fn profile_from_row(row: &PgRow) -> RepoResult<Profile> {
    let role: String = row.get("role");
    Ok(Profile {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        role: role.parse::<Role>().map_err(RepositoryError::Corrupt)?,
        doctor_id: row.get("doctor_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn doctor_from_row(row: &PgRow) -> Doctor {
    Doctor {
        id: row.get("id"),
        profile_id: row.get("profile_id"),
        name: row.get("name"),
        email: row.get("email"),
        crm: row.get("crm"),
        specialty: row.get("specialty"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl IdentityRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<Identity>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, created_at FROM auth_identities WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Identity {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
        }))
    }

    async fn insert(&self, identity: &Identity) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO auth_identities (id, email, password_hash, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(identity.id)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "identity"))?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query("DELETE FROM auth_identities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Profile>> {
        let row = sqlx::query(
            "SELECT id, email, name, role, doctor_id, created_at, updated_at
             FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn insert(&self, profile: &Profile) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO profiles (id, email, name, role, doctor_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(profile.id)
        .bind(&profile.email)
        .bind(&profile.name)
        .bind(profile.role.as_str())
        .bind(profile.doctor_id)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "profile"))?;

        Ok(())
    }

    async fn is_doctor_profile(&self, id: Uuid) -> RepoResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM profiles WHERE id = $1 AND role = $2)",
        )
        .bind(id)
        .bind(Role::Doctor.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl DoctorRepository for PgUserRepository {
    async fn list(&self) -> RepoResult<Vec<Doctor>> {
        let rows = sqlx::query(
            "SELECT id, profile_id, name, email, crm, specialty, created_at
             FROM doctors ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(doctor_from_row).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Doctor>> {
        let row = sqlx::query(
            "SELECT id, profile_id, name, email, crm, specialty, created_at
             FROM doctors WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(doctor_from_row))
    }

    async fn insert(&self, doctor: &Doctor) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO doctors (id, profile_id, name, email, crm, specialty, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(doctor.id)
        .bind(doctor.profile_id)
        .bind(&doctor.name)
        .bind(&doctor.email)
        .bind(&doctor.crm)
        .bind(&doctor.specialty)
        .bind(doctor.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "doctor"))?;

        Ok(())
    }
}
