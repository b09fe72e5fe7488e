use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{SwapError, SwapResult};
use crate::results::{ChangeRecord, ReplaceSummary};

/// Why a run stopped without leaving anything behind beyond reversible steps
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum AbortReason {
    #[error("{0}")]
    InvalidDirectory(String),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Operation cancelled to protect the '{0}' branch")]
    ProtectedBranchRefused(String),
    #[error("Error creating branch: {0}")]
    BranchCreateFailed(String),
    #[error("No changes were made")]
    NoChanges,
    #[error("No actual changes detected")]
    VerificationFailed,
    #[error("Error during file search: {0}")]
    ScanFailed(String),
    #[error("Search interrupted")]
    Interrupted,
}

/// Why a run stopped part way, leaving state that needs manual follow-up
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("Error committing changes: {0}")]
    CommitError(String),
    #[error("Error pushing branch: {0}")]
    PushError(String),
    #[error("{0}")]
    PrConfigMissing(String),
    #[error("Error creating PR: {0}")]
    PrCreateError(String),
}

/// Workflow state machine positions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    DirectoryValidated,
    BranchReady,
    TextReplaced,
    ChangesVerified,
    Committed,
    Pushed,
    PrCreated,
    Aborted(AbortReason),
    Failed(FailureReason),
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::PrCreated | WorkflowState::Aborted(_) | WorkflowState::Failed(_)
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowState::PrCreated)
    }
}

/// Everything a finished run reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub success: bool,
    pub files_processed: usize,
    pub files_changed: usize,
    pub total_replacements: usize,
    /// Branch created for the run, if it got that far
    pub branch_name: Option<String>,
    /// Branch that was active when the run started
    pub base_branch: Option<String>,
    pub state: WorkflowState,
    pub pr_url: Option<String>,
    pub changes: Vec<ChangeRecord>,
    /// True when the scan hit `max_files`
    #[serde(default)]
    pub truncated: bool,
}

impl Default for WorkflowOutcome {
    fn default() -> Self {
        Self {
            success: false,
            files_processed: 0,
            files_changed: 0,
            total_replacements: 0,
            branch_name: None,
            base_branch: None,
            state: WorkflowState::Idle,
            pr_url: None,
            changes: Vec::new(),
            truncated: false,
        }
    }
}

impl WorkflowOutcome {
    pub(crate) fn absorb(&mut self, summary: &ReplaceSummary) {
        self.files_processed = summary.files_processed;
        self.files_changed = summary.files_changed;
        self.total_replacements = summary.total_replacements;
        self.changes = summary.changes.clone();
    }

    /// Message for the terminal state, if it is not a success
    pub fn error_message(&self) -> Option<String> {
        match &self.state {
            WorkflowState::Aborted(reason) => Some(reason.to_string()),
            WorkflowState::Failed(reason) => Some(reason.to_string()),
            _ => None,
        }
    }

    /// Converts an unsuccessful outcome into the matching error
    pub fn into_result(self) -> SwapResult<Self> {
        match &self.state {
            WorkflowState::PrCreated => Ok(self),
            WorkflowState::Aborted(AbortReason::ProtectedBranchRefused(branch)) => {
                Err(SwapError::ProtectionRefused(branch.clone()))
            }
            WorkflowState::Aborted(AbortReason::InvalidDirectory(msg)) => {
                Err(SwapError::validation(msg.clone()))
            }
            WorkflowState::Aborted(reason) => Err(SwapError::Abort(reason.clone())),
            WorkflowState::Failed(reason) => Err(SwapError::Failure(reason.clone())),
            state => Err(SwapError::validation(format!(
                "workflow stopped in non-terminal state {:?}",
                state
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!WorkflowState::Idle.is_terminal());
        assert!(!WorkflowState::Pushed.is_terminal());
        assert!(WorkflowState::PrCreated.is_terminal());
        assert!(WorkflowState::Aborted(AbortReason::NoChanges).is_terminal());
        assert!(WorkflowState::Failed(FailureReason::PushError("x".into())).is_terminal());
        assert!(WorkflowState::PrCreated.is_success());
        assert!(!WorkflowState::Aborted(AbortReason::NoChanges).is_success());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(WorkflowState::Aborted(AbortReason::NoChanges)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"state": "aborted", "reason": {"reason": "no_changes"}})
        );
        let json = serde_json::to_value(WorkflowState::PrCreated).unwrap();
        assert_eq!(json, serde_json::json!({"state": "pr_created"}));
    }

    #[test]
    fn test_into_result() {
        let outcome = WorkflowOutcome {
            state: WorkflowState::Aborted(AbortReason::ProtectedBranchRefused("main".into())),
            ..Default::default()
        };
        assert!(matches!(
            outcome.into_result(),
            Err(SwapError::ProtectionRefused(b)) if b == "main"
        ));

        let outcome = WorkflowOutcome {
            state: WorkflowState::Failed(FailureReason::PushError("rejected".into())),
            ..Default::default()
        };
        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.to_string(), "Workflow failed: Error pushing branch: rejected");

        let outcome = WorkflowOutcome {
            success: true,
            state: WorkflowState::PrCreated,
            ..Default::default()
        };
        assert!(outcome.into_result().is_ok());
    }

    #[test]
    fn test_error_message() {
        let outcome = WorkflowOutcome {
            state: WorkflowState::Aborted(AbortReason::NoChanges),
            ..Default::default()
        };
        assert_eq!(outcome.error_message().as_deref(), Some("No changes were made"));
    }
}
