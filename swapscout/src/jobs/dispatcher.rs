use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::descriptor::JobDescriptor;
use super::tracker::{JobId, JobResult, JobStatus, JobTracker, JobUpdate};
use crate::config::WorkflowConfig;
use crate::errors::{PrError, SwapError, SwapResult};
use crate::interrupt::InterruptFlag;
use crate::progress::{Phase, ProgressSink};
use crate::pull_request::{GitHubClient, PullRequestGateway};
use crate::results::DryRunOutcome;
use crate::vcs::{GitCli, VcsGateway};
use crate::workflow::{self, AbortReason, WorkflowController, WorkflowState};

/// Builds the gateways a worker talks to
pub trait GatewayFactory: Send + Sync {
    fn vcs(&self, directory: &Path) -> Box<dyn VcsGateway>;
    fn pull_requests(&self, config: &WorkflowConfig)
        -> Result<Box<dyn PullRequestGateway>, PrError>;
}

/// `git` on the local machine and the configured GitHub API
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemGateways;

impl GatewayFactory for SystemGateways {
    fn vcs(&self, directory: &Path) -> Box<dyn VcsGateway> {
        Box::new(GitCli::new(directory))
    }

    fn pull_requests(
        &self,
        config: &WorkflowConfig,
    ) -> Result<Box<dyn PullRequestGateway>, PrError> {
        Ok(Box::new(GitHubClient::new(&config.github_api_url)?))
    }
}

/// Forwards progress reports to a job's tracker entry
#[derive(Debug, Clone)]
pub struct JobProgressSink {
    tracker: JobTracker,
    id: JobId,
}

impl JobProgressSink {
    pub fn new(tracker: JobTracker, id: impl Into<JobId>) -> Self {
        Self {
            tracker,
            id: id.into(),
        }
    }
}

impl ProgressSink for JobProgressSink {
    fn report(&self, _phase: Phase, percent: u8, detail: &str) {
        if let Err(e) = self.tracker.update(&self.id, JobUpdate::running(percent, detail)) {
            debug!("Dropping progress report: {}", e);
        }
    }
}

/// Starts jobs on worker threads and records them in a `JobTracker`
#[derive(Clone)]
pub struct JobDispatcher {
    tracker: JobTracker,
    config: Arc<WorkflowConfig>,
    gateways: Arc<dyn GatewayFactory>,
    interrupt: InterruptFlag,
}

impl JobDispatcher {
    pub fn new(tracker: JobTracker, config: WorkflowConfig) -> Self {
        Self {
            tracker,
            config: Arc::new(config),
            gateways: Arc::new(SystemGateways),
            interrupt: InterruptFlag::new(),
        }
    }

    pub fn with_gateways(mut self, gateways: Arc<dyn GatewayFactory>) -> Self {
        self.gateways = gateways;
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Registers a new job and starts it. Returns as soon as the worker is
    /// spawned; the job is visible as `started` before this returns.
    ///
    /// The job sees only interrupts raised after it was submitted.
    pub fn submit(&self, descriptor: JobDescriptor) -> SwapResult<JobId> {
        let id: JobId = Uuid::new_v4().to_string();
        self.tracker.register(id.clone());

        let worker = Worker {
            id: id.clone(),
            tracker: self.tracker.clone(),
            config: self.config.clone(),
            gateways: self.gateways.clone(),
            interrupt: self.interrupt.armed(),
        };
        let name = format!("swapscout-job-{}", id.chars().take(8).collect::<String>());

        let spawned = thread::Builder::new().name(name).spawn(move || worker.run(descriptor));
        if let Err(e) = spawned {
            let _ = self
                .tracker
                .update(&id, JobUpdate::error(format!("Failed to start worker: {}", e)));
            return Err(SwapError::Io(e));
        }

        info!("Submitted job {}", id);
        Ok(id)
    }
}

struct Worker {
    id: JobId,
    tracker: JobTracker,
    config: Arc<WorkflowConfig>,
    gateways: Arc<dyn GatewayFactory>,
    interrupt: InterruptFlag,
}

impl Worker {
    fn run(self, descriptor: JobDescriptor) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.execute(descriptor)));
        let update = match result {
            Ok(update) => update,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Job {} panicked: {}", self.id, message);
                JobUpdate::error(format!("Job panicked: {}", message))
            }
        };

        if let Err(e) = self.tracker.update(&self.id, update) {
            error!("Could not record result of job {}: {}", self.id, e);
        }
    }

    fn execute(&self, descriptor: JobDescriptor) -> JobUpdate {
        let dry_run = descriptor.dry_run;
        let request = descriptor.into_request(&self.config);
        let sink = JobProgressSink::new(self.tracker.clone(), self.id.clone());

        if dry_run {
            return dry_run_update(workflow::dry_run(
                &self.config,
                &request,
                &sink,
                &self.interrupt,
            ));
        }

        let vcs = self.gateways.vcs(&request.directory);
        let pull_requests = match self.gateways.pull_requests(&self.config) {
            Ok(gateway) => gateway,
            Err(e) => return JobUpdate::error(e.to_string()),
        };
        let mut controller =
            WorkflowController::new(&self.config, vcs.as_ref(), pull_requests.as_ref())
                .with_progress(&sink)
                .with_interrupt(self.interrupt.clone());

        let outcome = controller.run(&request);
        if outcome.state.is_success() {
            return JobUpdate::completed(JobResult::Workflow(outcome));
        }

        let invalid_pattern = matches!(
            outcome.state,
            WorkflowState::Aborted(AbortReason::InvalidPattern(_))
        );
        let message = outcome
            .error_message()
            .unwrap_or_else(|| "Workflow stopped before finishing".to_string());
        if invalid_pattern {
            JobUpdate {
                result: Some(JobResult::Workflow(outcome)),
                ..JobUpdate::error(message)
            }
        } else {
            JobUpdate::failed(JobResult::Workflow(outcome), message)
        }
    }
}

/// An aborted dry run is `failed`; anything that kept it from starting is `error`
fn dry_run_update(result: SwapResult<DryRunOutcome>) -> JobUpdate {
    match result {
        Ok(outcome) => JobUpdate::completed(JobResult::DryRun(outcome)),
        Err(SwapError::Abort(reason)) => JobUpdate {
            status: Some(JobStatus::Failed),
            error: Some(reason.to_string()),
            ..Default::default()
        },
        Err(e) => JobUpdate::error(e.to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
