use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::WorkflowConfig;
use crate::errors::ScanError;
use crate::interrupt::InterruptFlag;
use crate::progress::{NullProgress, Phase, ProgressSink};
use crate::pull_request::{default_body, default_title, PullRequestGateway, PullRequestRequest};
use crate::replace::TextSubstitutor;
use crate::scan::{FileScanner, PatternMatcher, SearchSpec};
use crate::vcs::{detect_identity, RepoIdentity, VcsGateway};

use super::state::{AbortReason, FailureReason, WorkflowOutcome, WorkflowState};

pub const AUTO_COMMIT_MESSAGE: &str = "Auto-commit before text replacement";

/// Default branch name for a run started now
pub fn default_branch_name() -> String {
    format!("text-replace-{}", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Default commit message for `files_changed` modified files
pub fn default_commit_message(files_changed: usize) -> String {
    format!("Replace text: {} files modified", files_changed)
}

/// Asks whether work may start from a protected branch
pub trait ConfirmProtected {
    fn confirm(&self, branch: &str) -> bool;
}

impl<F> ConfirmProtected for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, branch: &str) -> bool {
        self(branch)
    }
}

/// Refuses every protected branch
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyProtected;

impl ConfirmProtected for DenyProtected {
    fn confirm(&self, _branch: &str) -> bool {
        false
    }
}

/// One requested run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub directory: PathBuf,
    pub search: SearchSpec,
    pub replacement: String,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub pr_title: Option<String>,
    #[serde(default)]
    pub pr_description: Option<String>,
    /// Explicit repository identity; detected from the remote when absent
    #[serde(default)]
    pub repo: Option<RepoIdentity>,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    /// Start from a protected branch without asking
    #[serde(default)]
    pub allow_protected: bool,
}

impl WorkflowRequest {
    pub fn new(
        directory: impl Into<PathBuf>,
        search: SearchSpec,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            search,
            replacement: replacement.into(),
            branch_name: None,
            commit_message: None,
            pr_title: None,
            pr_description: None,
            repo: None,
            token: None,
            allow_protected: false,
        }
    }
}

/// Drives one run from directory validation to an opened pull request.
///
/// Up to and including verification, every stop is an `Aborted` state and the
/// previously active branch is restored on a best-effort basis. From the
/// commit onwards stops are `Failed` and nothing is rolled back.
pub struct WorkflowController<'a> {
    config: &'a WorkflowConfig,
    vcs: &'a dyn VcsGateway,
    pull_requests: &'a dyn PullRequestGateway,
    confirm: &'a dyn ConfirmProtected,
    progress: &'a dyn ProgressSink,
    interrupt: InterruptFlag,
    history: Vec<WorkflowState>,
}

impl<'a> WorkflowController<'a> {
    pub fn new(
        config: &'a WorkflowConfig,
        vcs: &'a dyn VcsGateway,
        pull_requests: &'a dyn PullRequestGateway,
    ) -> Self {
        Self {
            config,
            vcs,
            pull_requests,
            confirm: &DenyProtected,
            progress: &NullProgress,
            interrupt: InterruptFlag::new(),
            history: Vec::new(),
        }
    }

    pub fn with_confirm(mut self, confirm: &'a dyn ConfirmProtected) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// States visited by the last run, in order
    pub fn history(&self) -> &[WorkflowState] {
        &self.history
    }

    fn transition(&mut self, state: WorkflowState) {
        match &state {
            WorkflowState::Aborted(reason) => warn!("Workflow aborted: {}", reason),
            WorkflowState::Failed(reason) => error!("Workflow failed: {}", reason),
            other => info!("Workflow state: {:?}", other),
        }
        self.history.push(state);
    }

    fn finish(&mut self, mut outcome: WorkflowOutcome, state: WorkflowState) -> WorkflowOutcome {
        self.transition(state.clone());
        outcome.success = state.is_success();
        outcome.state = state;
        outcome
    }

    /// Aborts after the run branch exists, switching back first
    fn abort_with_switch_back(
        &mut self,
        outcome: WorkflowOutcome,
        reason: AbortReason,
    ) -> WorkflowOutcome {
        match self.vcs.switch_to_previous_branch() {
            Ok(()) => info!("Switched back to original branch"),
            Err(e) => warn!("Could not switch back to original branch: {}", e),
        }
        self.finish(outcome, WorkflowState::Aborted(reason))
    }

    fn scanner(&self) -> FileScanner {
        FileScanner::new(self.config.thread_count).with_interrupt(self.interrupt.clone())
    }

    /// Runs the full workflow and reports where it ended
    pub fn run(&mut self, request: &WorkflowRequest) -> WorkflowOutcome {
        let started = Instant::now();
        self.history.clear();
        self.transition(WorkflowState::Idle);

        let outcome = self.run_inner(request, WorkflowOutcome::default());
        info!(
            "Workflow finished in {}",
            humantime::format_duration(started.elapsed())
        );
        outcome
    }

    fn run_inner(&mut self, request: &WorkflowRequest, mut outcome: WorkflowOutcome) -> WorkflowOutcome {
        // Idle -> DirectoryValidated
        self.progress
            .report(Phase::Validate, Phase::Validate.span().0, "Validating directory...");
        let directory = &request.directory;
        if !directory.is_dir() {
            let reason = AbortReason::InvalidDirectory(format!(
                "Directory {} does not exist",
                directory.display()
            ));
            return self.finish(outcome, WorkflowState::Aborted(reason));
        }
        if !self.vcs.is_repository() {
            let reason = AbortReason::InvalidDirectory(format!(
                "{} is not a Git repository",
                directory.display()
            ));
            return self.finish(outcome, WorkflowState::Aborted(reason));
        }

        let prepared = PatternMatcher::new(&request.search.pattern, request.search.is_regex)
            .and_then(|matcher| {
                TextSubstitutor::new(
                    &request.search.pattern,
                    &request.replacement,
                    request.search.is_regex,
                )
                .map(|substitutor| (matcher, substitutor))
            });
        let (matcher, substitutor) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                let reason = AbortReason::InvalidPattern(pattern_detail(e));
                return self.finish(outcome, WorkflowState::Aborted(reason));
            }
        };
        self.transition(WorkflowState::DirectoryValidated);
        self.progress
            .report(Phase::Validate, Phase::Validate.span().1, "Directory validated");

        // DirectoryValidated -> BranchReady
        self.progress
            .report(Phase::Branch, Phase::Branch.span().0, "Creating branch...");
        let original = match self.vcs.current_branch() {
            Ok(branch) => branch,
            Err(e) => {
                let reason = AbortReason::BranchCreateFailed(e.to_string());
                return self.finish(outcome, WorkflowState::Aborted(reason));
            }
        };
        outcome.base_branch = Some(original.clone());

        if self.config.is_protected(&original) {
            warn!("Currently on protected branch '{}'", original);
            let allowed = self.config.allow_protected
                || request.allow_protected
                || self.confirm.confirm(&original);
            if !allowed {
                let reason = AbortReason::ProtectedBranchRefused(original);
                return self.finish(outcome, WorkflowState::Aborted(reason));
            }
            info!("Proceeding to create a new branch off '{}'", original);
        }

        if let Err(e) = self.commit_pending() {
            let reason = AbortReason::BranchCreateFailed(e.to_string());
            return self.finish(outcome, WorkflowState::Aborted(reason));
        }

        let branch = request
            .branch_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(default_branch_name);
        if let Err(e) = self.vcs.create_and_switch_branch(&branch) {
            let reason = AbortReason::BranchCreateFailed(e.to_string());
            return self.finish(outcome, WorkflowState::Aborted(reason));
        }
        info!("Created and switched to branch: {}", branch);
        outcome.branch_name = Some(branch.clone());
        self.transition(WorkflowState::BranchReady);
        self.progress.report(
            Phase::Branch,
            Phase::Branch.span().1,
            &format!("Created branch {}", branch),
        );

        // BranchReady -> TextReplaced
        let scan = match self.scanner().scan_with(
            directory,
            &request.search,
            &matcher,
            self.progress,
        ) {
            Ok(scan) => scan,
            Err(ScanError::Interrupted) => {
                return self.abort_with_switch_back(outcome, AbortReason::Interrupted);
            }
            Err(e) => {
                return self.abort_with_switch_back(outcome, AbortReason::ScanFailed(e.to_string()));
            }
        };
        outcome.truncated = scan.truncated;

        let summary = substitutor.apply_all(directory, &scan.matches, false, self.progress);
        outcome.absorb(&summary);
        if summary.is_empty() {
            return self.abort_with_switch_back(outcome, AbortReason::NoChanges);
        }
        self.transition(WorkflowState::TextReplaced);

        // TextReplaced -> ChangesVerified
        self.progress
            .report(Phase::Verify, Phase::Verify.span().0, "Verifying changes...");
        let verified = match self.vcs.status() {
            Ok(status) => !status.modified_or_added().is_empty(),
            Err(e) => {
                warn!("Error verifying changes: {}", e);
                false
            }
        };
        if !verified {
            return self.abort_with_switch_back(outcome, AbortReason::VerificationFailed);
        }
        self.transition(WorkflowState::ChangesVerified);
        self.progress
            .report(Phase::Verify, Phase::Verify.span().1, "Changes verified");

        // ChangesVerified -> Committed
        self.progress
            .report(Phase::Commit, Phase::Commit.span().0, "Committing changes...");
        let message = request
            .commit_message
            .clone()
            .unwrap_or_else(|| default_commit_message(outcome.changes.len()));
        if let Err(e) = self.commit_all(&message) {
            let reason = FailureReason::CommitError(e.to_string());
            return self.finish(outcome, WorkflowState::Failed(reason));
        }
        self.transition(WorkflowState::Committed);
        self.progress
            .report(Phase::Commit, Phase::Commit.span().1, "Changes committed");

        // Committed -> Pushed
        self.progress
            .report(Phase::Push, Phase::Push.span().0, "Pushing branch...");
        if let Err(e) = self.vcs.push_set_upstream(&self.config.remote, &branch) {
            let reason = FailureReason::PushError(e.to_string());
            return self.finish(outcome, WorkflowState::Failed(reason));
        }
        info!("Pushed branch {} to {}", branch, self.config.remote);
        self.transition(WorkflowState::Pushed);
        self.progress
            .report(Phase::Push, Phase::Push.span().1, "Branch pushed");

        // Pushed -> PrCreated
        self.progress.report(
            Phase::PullRequest,
            Phase::PullRequest.span().0,
            "Creating pull request...",
        );
        let Some(token) = request.token.clone().filter(|t| !t.is_empty()) else {
            let reason = FailureReason::PrConfigMissing(
                "GitHub token not provided. Set GITHUB_TOKEN or pass a token".to_string(),
            );
            return self.finish(outcome, WorkflowState::Failed(reason));
        };
        let Some(repo) = request
            .repo
            .clone()
            .or_else(|| detect_identity(self.vcs, &self.config.remote))
        else {
            let reason = FailureReason::PrConfigMissing(
                "GitHub repository information not available".to_string(),
            );
            return self.finish(outcome, WorkflowState::Failed(reason));
        };

        let pr_request = PullRequestRequest {
            repo,
            token,
            title: request
                .pr_title
                .clone()
                .unwrap_or_else(|| default_title(outcome.changes.len())),
            body: request
                .pr_description
                .clone()
                .unwrap_or_else(|| default_body(&outcome.changes)),
            head: branch,
            base: original,
        };
        match self.pull_requests.create_pull_request(&pr_request) {
            Ok(created) => {
                outcome.pr_url = Some(created.url);
                self.progress.report(
                    Phase::PullRequest,
                    Phase::PullRequest.span().1,
                    "Pull request created",
                );
                self.finish(outcome, WorkflowState::PrCreated)
            }
            Err(e) => {
                let reason = FailureReason::PrCreateError(e.to_string());
                self.finish(outcome, WorkflowState::Failed(reason))
            }
        }
    }

    /// Commits uncommitted work on the current branch before branching off
    fn commit_pending(&self) -> Result<(), crate::errors::VcsError> {
        if self.vcs.status()?.is_clean() {
            return Ok(());
        }
        info!("Working directory has uncommitted changes. Committing them first...");
        self.vcs.stage_all()?;
        if self.vcs.has_staged_changes()? {
            self.vcs.commit(AUTO_COMMIT_MESSAGE)?;
        } else {
            info!("No staged changes to commit");
        }
        Ok(())
    }

    /// Stages and commits everything; nothing to commit is not an error
    fn commit_all(&self, message: &str) -> Result<(), crate::errors::VcsError> {
        if self.vcs.status()?.is_clean() {
            info!("No changes to commit");
            return Ok(());
        }
        self.vcs.stage_all()?;
        if !self.vcs.has_staged_changes()? {
            info!("No staged changes to commit");
            return Ok(());
        }
        self.vcs.commit(message)?;
        info!("Committed changes: {}", message);
        Ok(())
    }
}

fn pattern_detail(err: ScanError) -> String {
    match err {
        ScanError::InvalidPattern(detail) => detail,
        other => other.to_string(),
    }
}
