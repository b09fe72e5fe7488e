use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline phase a progress report belongs to.
///
/// Each phase owns a slice of the 0-100 range so that reports from different
/// components never run backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Validate,
    Branch,
    Scan,
    Replace,
    Verify,
    Commit,
    Push,
    PullRequest,
}

impl Phase {
    /// Start and end of this phase on the overall percentage scale
    pub fn span(self) -> (u8, u8) {
        match self {
            Phase::Validate => (0, 5),
            Phase::Branch => (5, 10),
            Phase::Scan => (10, 60),
            Phase::Replace => (60, 80),
            Phase::Verify => (80, 85),
            Phase::Commit => (85, 90),
            Phase::Push => (90, 95),
            Phase::PullRequest => (95, 100),
        }
    }

    /// Maps `done` of `total` steps within the phase onto the overall scale
    pub fn scale(self, done: usize, total: usize) -> u8 {
        let (start, end) = self.span();
        if total == 0 {
            return end;
        }
        let width = (end - start) as usize;
        let offset = (width * done.min(total)) / total;
        start + offset as u8
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Validate => "validate",
            Phase::Branch => "branch",
            Phase::Scan => "scan",
            Phase::Replace => "replace",
            Phase::Verify => "verify",
            Phase::Commit => "commit",
            Phase::Push => "push",
            Phase::PullRequest => "pull-request",
        };
        f.write_str(name)
    }
}

/// Receives progress reports from the engine
pub trait ProgressSink: Send + Sync {
    fn report(&self, phase: Phase, percent: u8, detail: &str);
}

/// Discards every report
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _phase: Phase, _percent: u8, _detail: &str) {}
}

/// Terminal progress bar
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        Self { bar }
    }

    /// Hidden bar, for non-interactive output
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn report(&self, phase: Phase, percent: u8, detail: &str) {
        self.bar.set_position(percent.min(100) as u64);
        self.bar.set_message(format!("{}: {}", phase, detail));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_spans_are_contiguous() {
        let phases = [
            Phase::Validate,
            Phase::Branch,
            Phase::Scan,
            Phase::Replace,
            Phase::Verify,
            Phase::Commit,
            Phase::Push,
            Phase::PullRequest,
        ];
        assert_eq!(phases[0].span().0, 0);
        assert_eq!(phases[phases.len() - 1].span().1, 100);
        for pair in phases.windows(2) {
            assert_eq!(pair[0].span().1, pair[1].span().0);
        }
    }

    #[test]
    fn test_phase_scale() {
        assert_eq!(Phase::Scan.scale(0, 10), 10);
        assert_eq!(Phase::Scan.scale(5, 10), 35);
        assert_eq!(Phase::Scan.scale(10, 10), 60);
        assert_eq!(Phase::Scan.scale(20, 10), 60);
        assert_eq!(Phase::Replace.scale(0, 0), 80);
    }

    #[test]
    fn test_console_progress_clamps() {
        let progress = ConsoleProgress::hidden();
        progress.report(Phase::Push, 250, "pushing");
        assert_eq!(progress.bar.position(), 100);
    }
}
