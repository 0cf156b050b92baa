use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScribeError};

/// Error message recorded when a human rejects a run at the validation gate.
pub const REJECTION_MESSAGE: &str = "rejected during validation";

/// Status of one run of a job.
///
/// ```text
/// pending → generating → [pending_validation → validated →] publishing → published
///    └──────────┴──────────────┴──────────────────┴──────────────┴──→ failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Generating,
    PendingValidation,
    Validated,
    Publishing,
    Published,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Published | ExecutionStatus::Failed)
    }

    /// The single source of truth for legal transitions.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, Generating) => true,
            (Generating, PendingValidation) | (Generating, Publishing) => true,
            (PendingValidation, Validated) => true,
            (Validated, Publishing) => true,
            (Publishing, Published) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Generating => "generating",
            ExecutionStatus::PendingValidation => "pending_validation",
            ExecutionStatus::Validated => "validated",
            ExecutionStatus::Publishing => "publishing",
            ExecutionStatus::Published => "published",
            ExecutionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "generating" => Ok(ExecutionStatus::Generating),
            "pending_validation" => Ok(ExecutionStatus::PendingValidation),
            "validated" => Ok(ExecutionStatus::Validated),
            "publishing" => Ok(ExecutionStatus::Publishing),
            "published" => Ok(ExecutionStatus::Published),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// One concrete run of a job, persisted after every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub job_id: String,
    pub topic_id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    /// Post id returned by the publishing target.
    pub post_id: Option<String>,
    pub post_url: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub generated_at: Option<DateTime<Utc>>,
    pub validated_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Execution {
    pub fn new(job_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            job_id: job_id.to_string(),
            topic_id: None,
            title: None,
            content: None,
            status: ExecutionStatus::Pending,
            error_message: None,
            post_id: None,
            post_url: None,
            started_at: None,
            generated_at: None,
            validated_at: None,
            published_at: None,
            created_at: now,
        }
    }

    /// Move to `next`, refusing anything the state machine does not allow.
    pub fn transition(&mut self, next: ExecutionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ScribeError::InvalidState(format!(
                "execution {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Record `message` and move to `failed`. No-op on terminal executions.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = ExecutionStatus::Failed;
        self.error_message = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExecutionStatus::*;

    #[test]
    fn happy_path_without_validation() {
        let mut exec = Execution::new("job", Utc::now());
        for next in [Generating, Publishing, Published] {
            exec.transition(next).unwrap();
        }
        assert!(exec.status.is_terminal());
    }

    #[test]
    fn happy_path_with_validation() {
        let mut exec = Execution::new("job", Utc::now());
        for next in [Generating, PendingValidation, Validated, Publishing, Published] {
            exec.transition(next).unwrap();
        }
    }

    #[test]
    fn failed_reachable_from_every_open_state() {
        for from in [Pending, Generating, PendingValidation, Validated, Publishing] {
            assert!(from.can_transition_to(Failed), "{from}");
        }
        assert!(!Published.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Failed));
    }

    #[test]
    fn skipping_validation_decision_is_rejected() {
        let mut exec = Execution::new("job", Utc::now());
        exec.transition(Generating).unwrap();
        exec.transition(PendingValidation).unwrap();
        let err = exec.transition(Publishing).unwrap_err();
        assert!(matches!(err, ScribeError::InvalidState(_)));
        assert_eq!(exec.status, PendingValidation);
    }

    #[test]
    fn fail_keeps_terminal_state() {
        let mut exec = Execution::new("job", Utc::now());
        exec.fail("boom");
        assert_eq!(exec.status, Failed);
        exec.fail("again");
        assert_eq!(exec.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn status_roundtrips_through_str() {
        for status in [Pending, Generating, PendingValidation, Validated, Publishing, Published, Failed] {
            assert_eq!(status.to_string().parse::<ExecutionStatus>().unwrap(), status);
        }
    }
}
