use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::errors::JobError;
use crate::results::DryRunOutcome;
use crate::workflow::WorkflowOutcome;

pub type JobId = String;

pub const INITIAL_DETAILS: &str = "Initializing...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Started,
    Running,
    Completed,
    Failed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Error)
    }
}

/// What a finished job produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResult {
    DryRun(DryRunOutcome),
    Workflow(WorkflowOutcome),
}

/// Pollable record of one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobState {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobState {
    fn started(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Started,
            progress: 0,
            details: INITIAL_DETAILS.to_string(),
            timestamp: Utc::now(),
            result: None,
            error: None,
        }
    }
}

/// A change to a job's state; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub details: Option<String>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn running(progress: u8, details: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Running),
            progress: Some(progress),
            details: Some(details.into()),
            ..Default::default()
        }
    }

    pub fn completed(result: JobResult) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            result: Some(result),
            ..Default::default()
        }
    }

    pub fn failed(result: JobResult, error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            result: Some(result),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Shared registry of job states.
///
/// Cloning yields another handle to the same registry. Progress never moves
/// backwards and a terminal status is final: later updates for that id are
/// dropped. Entries are never evicted.
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    jobs: Arc<DashMap<JobId, JobState>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` as started at 0%
    pub fn register(&self, id: impl Into<JobId>) {
        let id = id.into();
        self.jobs.insert(id.clone(), JobState::started(id));
    }

    /// Applies `update` to the job `id`
    pub fn update(&self, id: &str, update: JobUpdate) -> Result<(), JobError> {
        let mut state = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        if state.status.is_terminal() {
            debug!("Ignoring update for finished job {}", id);
            return Ok(());
        }

        if let Some(status) = update.status {
            state.status = status;
        }
        if let Some(progress) = update.progress {
            state.progress = state.progress.max(progress.min(100));
        }
        if let Some(details) = update.details {
            state.details = details;
        }
        if update.result.is_some() {
            state.result = update.result;
        }
        if update.error.is_some() {
            state.error = update.error;
        }
        state.timestamp = Utc::now();
        Ok(())
    }

    /// Copy of the current state of `id`
    pub fn snapshot(&self, id: &str) -> Result<JobState, JobError> {
        self.jobs
            .get(id)
            .map(|state| state.value().clone())
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Polls until `id` reaches a terminal status or `timeout` passes, and
    /// returns the last state seen
    pub fn wait_for_terminal(&self, id: &str, timeout: Duration) -> Result<JobState, JobError> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.snapshot(id)?;
            if state.status.is_terminal() || Instant::now() >= deadline {
                return Ok(state);
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_starts_at_zero() {
        let tracker = JobTracker::new();
        tracker.register("job-1");

        let state = tracker.snapshot("job-1").unwrap();
        assert_eq!(state.status, JobStatus::Started);
        assert_eq!(state.progress, 0);
        assert_eq!(state.details, "Initializing...");
        assert!(state.result.is_none());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_unknown_job() {
        let tracker = JobTracker::new();
        assert_eq!(
            tracker.snapshot("missing").unwrap_err(),
            JobError::NotFound("missing".to_string())
        );
        assert!(tracker
            .update("missing", JobUpdate::running(10, "x"))
            .is_err());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let tracker = JobTracker::new();
        tracker.register("job");

        tracker.update("job", JobUpdate::running(40, "Checking file 4/10")).unwrap();
        tracker.update("job", JobUpdate::running(30, "Checking file 3/10")).unwrap();
        let state = tracker.snapshot("job").unwrap();
        assert_eq!(state.status, JobStatus::Running);
        assert_eq!(state.progress, 40);
        assert_eq!(state.details, "Checking file 3/10");

        tracker.update("job", JobUpdate::running(250, "overflow")).unwrap();
        assert_eq!(tracker.snapshot("job").unwrap().progress, 100);
    }

    #[test]
    fn test_terminal_status_is_final() {
        let tracker = JobTracker::new();
        tracker.register("job");
        tracker.update("job", JobUpdate::error("boom")).unwrap();
        tracker.update("job", JobUpdate::running(50, "late")).unwrap();

        let state = tracker.snapshot("job").unwrap();
        assert_eq!(state.status, JobStatus::Error);
        assert_eq!(state.error.as_deref(), Some("boom"));
        assert_eq!(state.progress, 0);
    }

    #[test]
    fn test_completed_sets_full_progress() {
        let tracker = JobTracker::new();
        tracker.register("job");
        tracker
            .update("job", JobUpdate::completed(JobResult::DryRun(DryRunOutcome::default())))
            .unwrap();

        let state = tracker.snapshot("job").unwrap();
        assert_eq!(state.status, JobStatus::Completed);
        assert_eq!(state.progress, 100);
    }

    #[test]
    fn test_independent_jobs() {
        let tracker = JobTracker::new();
        tracker.register("a");
        tracker.register("b");
        tracker.update("a", JobUpdate::running(70, "a")).unwrap();

        assert_eq!(tracker.snapshot("b").unwrap().progress, 0);
        assert_eq!(tracker.len(), 2);
        let mut ids = tracker.ids();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_status_serialization() {
        let tracker = JobTracker::new();
        tracker.register("job");
        let json = serde_json::to_value(tracker.snapshot("job").unwrap()).unwrap();
        assert_eq!(json["status"], "started");
        assert_eq!(json["progress"], 0);
        assert!(json.get("result").is_none());
    }
}
