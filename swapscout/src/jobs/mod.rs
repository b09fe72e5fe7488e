/// Asynchronous runs and their pollable state.
///
/// `JobDispatcher::submit` registers a job as `started` and hands it to a
/// worker thread; callers then poll `JobTracker::snapshot` by id. Each id has a
/// single writer, its worker, and any number of readers.
mod descriptor;
mod dispatcher;
mod tracker;

pub use descriptor::{JobDescriptor, TOKEN_ENV};
pub use dispatcher::{GatewayFactory, JobDispatcher, JobProgressSink, SystemGateways};
pub use tracker::{JobId, JobResult, JobState, JobStatus, JobTracker, JobUpdate, INITIAL_DETAILS};
