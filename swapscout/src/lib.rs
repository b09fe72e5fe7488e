pub mod config;
pub mod errors;
pub mod filters;
pub mod interrupt;
pub mod jobs;
pub mod progress;
pub mod pull_request;
pub mod replace;
pub mod results;
pub mod scan;
pub mod vcs;
pub mod workflow;

pub use config::{ConfigOverrides, WorkflowConfig};
pub use errors::{SwapError, SwapResult};
pub use interrupt::InterruptFlag;
pub use jobs::{JobDescriptor, JobDispatcher, JobState, JobStatus, JobTracker};
pub use progress::{ConsoleProgress, NullProgress, Phase, ProgressSink};
pub use replace::{Substitution, TextSubstitutor};
pub use results::{ChangeRecord, DryRunOutcome, FileMatch, ReplaceSummary, ScanOutcome};
pub use scan::{FileScanner, SearchSpec};
pub use workflow::{
    dry_run, validate_directory, ConfirmProtected, WorkflowController, WorkflowOutcome, WorkflowRequest,
    WorkflowState,
};
