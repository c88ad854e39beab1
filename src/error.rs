use thiserror::Error;
use uuid::Uuid;

use crate::models::TrackingStatus;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Credenciais inválidas")]
    InvalidCredentials,
    #[error("Token ausente ou inválido")]
    Unauthorized,
    #[error("Acesso restrito a administradores")]
    Forbidden,
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("{0}")]
    Validation(String),
    #[error("Médico não encontrado")]
    DoctorNotFound,
    #[error("E-mail já cadastrado")]
    EmailTaken,
    #[error("Erro ao criar usuário")]
    IdentityCreation(#[source] AuthError),
    #[error("Erro ao criar perfil do usuário")]
    ProfileCreation(#[source] RepositoryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Error, Debug, PartialEq)]
pub enum ApprovalError {
    #[error("Orçamento não está aguardando decisão do paciente (status atual: {current})")]
    NotAwaitingPatient { current: TrackingStatus },
    #[error("Não é possível anexar orçamento no status {current}")]
    CannotAttachBudget { current: TrackingStatus },
}

#[derive(Error, Debug, PartialEq)]
pub enum PricingError {
    #[error("Valores do orçamento excedem o limite suportado")]
    Overflow,
}

#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("{0}")]
    Validation(String),
    #[error("Solicitação de cirurgia {0} não encontrada")]
    SurgeryRequestNotFound(Uuid),
    #[error("Orçamento {0} não encontrado")]
    BudgetNotFound(Uuid),
    #[error("Acompanhamento {0} não encontrado")]
    TrackingNotFound(Uuid),
    #[error("Sem permissão para acessar este registro")]
    NotOwner,
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
