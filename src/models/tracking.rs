use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    #[default]
    InProgress,
    AwaitingPatient,
    Approved,
    RevisionRequested,
    Rejected,
}

impl TrackingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingStatus::InProgress => "in_progress",
            TrackingStatus::AwaitingPatient => "awaiting_patient",
            TrackingStatus::Approved => "approved",
            TrackingStatus::RevisionRequested => "revision_requested",
            TrackingStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(TrackingStatus::InProgress),
            "awaiting_patient" => Ok(TrackingStatus::AwaitingPatient),
            "approved" => Ok(TrackingStatus::Approved),
            "revision_requested" => Ok(TrackingStatus::RevisionRequested),
            "rejected" => Ok(TrackingStatus::Rejected),
            other => Err(format!("unknown tracking status: {}", other)),
        }
    }
}

/// The end user's answer to a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserDecision {
    Approved,
    RevisionRequested,
    Rejected,
}

impl UserDecision {
    pub fn as_str(&self) -> &'static str {
        self.status().as_str()
    }

    /// The status a decision moves the record to; always the same value.
    pub fn status(&self) -> TrackingStatus {
        match self {
            UserDecision::Approved => TrackingStatus::Approved,
            UserDecision::RevisionRequested => TrackingStatus::RevisionRequested,
            UserDecision::Rejected => TrackingStatus::Rejected,
        }
    }
}

impl FromStr for UserDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(UserDecision::Approved),
            "revision_requested" => Ok(UserDecision::RevisionRequested),
            "rejected" => Ok(UserDecision::Rejected),
            other => Err(format!("unknown decision: {}", other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserBudgetTracking {
    pub id: Uuid,
    pub surgery_request_id: Uuid,
    /// Owner of the submitted request; the only non-admin allowed to decide.
    pub user_id: Uuid,
    pub budget_id: Option<Uuid>,
    pub status: TrackingStatus,
    pub user_approval: Option<UserDecision>,
    pub user_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserBudgetTracking {
    pub fn new(surgery_request_id: Uuid, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            surgery_request_id,
            user_id,
            budget_id: None,
            status: TrackingStatus::default(),
            user_approval: None,
            user_feedback: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Exactly the fields a recorded decision writes.
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionUpdate {
    pub user_approval: UserDecision,
    pub status: TrackingStatus,
    pub user_feedback: Option<String>,
    pub updated_at: DateTime<Utc>,
}
