/// The replace-and-land state machine.
///
/// A run moves through
/// `Idle -> DirectoryValidated -> BranchReady -> TextReplaced ->
/// ChangesVerified -> Committed -> Pushed -> PrCreated`, or stops in
/// `Aborted` (nothing left behind beyond reversible steps) or `Failed`
/// (part way, needs manual follow-up).
mod controller;
mod preview;
mod state;
mod validate;

pub use controller::{
    default_branch_name, default_commit_message, ConfirmProtected, DenyProtected,
    WorkflowController, WorkflowRequest, AUTO_COMMIT_MESSAGE,
};
pub use preview::dry_run;
pub use state::{AbortReason, FailureReason, WorkflowOutcome, WorkflowState};
pub use validate::{validate_directory, validate_with, DirectoryValidation};
