use tracing::{info, warn};

use crate::config::WorkflowConfig;
use crate::errors::{ScanError, SwapError, SwapResult};
use crate::interrupt::InterruptFlag;
use crate::progress::ProgressSink;
use crate::replace::TextSubstitutor;
use crate::results::DryRunOutcome;
use crate::scan::{FileScanner, PatternMatcher};

use super::controller::WorkflowRequest;
use super::state::AbortReason;

/// Scans and substitutes with nothing written and no version control.
///
/// An interrupted scan is reported as `SwapError::Abort(Interrupted)`.
pub fn dry_run(
    config: &WorkflowConfig,
    request: &WorkflowRequest,
    progress: &dyn ProgressSink,
    interrupt: &InterruptFlag,
) -> SwapResult<DryRunOutcome> {
    if !request.directory.is_dir() {
        return Err(SwapError::validation(format!(
            "Directory {} does not exist",
            request.directory.display()
        )));
    }

    let search = &request.search;
    let substitutor = TextSubstitutor::new(&search.pattern, &request.replacement, search.is_regex)?;
    let matcher = PatternMatcher::new(&search.pattern, search.is_regex)?;

    let scan = FileScanner::new(config.thread_count)
        .with_interrupt(interrupt.clone())
        .scan_with(&request.directory, search, &matcher, progress)
        .map_err(|e| match e {
            ScanError::Interrupted => SwapError::Abort(AbortReason::Interrupted),
            other => SwapError::Scan(other),
        })?;
    if scan.truncated {
        warn!("Dry run covers only the first {} files", search.max_files);
    }

    let summary = substitutor.apply_all(&request.directory, &scan.matches, true, progress);
    info!("Dry run finished: {} files would change", summary.files_changed);
    Ok(DryRunOutcome {
        summary,
        truncated: scan.truncated,
    })
}
