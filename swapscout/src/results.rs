/// Result types shared by the scanner, the substitutor and the workflow.
///
/// `FileMatch` values are produced by the scanner and consumed once by the
/// substitutor. `ChangeRecord`s are only ever appended through
/// `ReplaceSummary::record`, which keeps `total_replacements` equal to the sum
/// of the recorded counts and keeps each file at most once.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A file whose content matched the search pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMatch {
    /// Path relative to the scan root
    pub relative: PathBuf,
}

impl FileMatch {
    pub fn new(relative: impl Into<PathBuf>) -> Self {
        Self {
            relative: relative.into(),
        }
    }

    /// Resolves the match against the root it was scanned from
    pub fn absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.relative)
    }
}

/// Everything a scan produced
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Matching files, in candidate order
    pub matches: Vec<FileMatch>,
    /// Number of candidates that were read and tested
    pub candidates: usize,
    /// True when more eligible files existed than `max_files` allowed
    pub truncated: bool,
}

/// One changed file and how many occurrences were counted in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub file: PathBuf,
    pub replacements: usize,
}

/// Aggregate result of applying a substitution over a scan result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceSummary {
    pub files_processed: usize,
    pub files_changed: usize,
    pub total_replacements: usize,
    pub changes: Vec<ChangeRecord>,
    #[serde(skip)]
    seen: HashSet<PathBuf>,
}

impl ReplaceSummary {
    pub fn new() -> Self {
        Default::default()
    }

    /// Counts a file that was processed but left unchanged
    pub fn record_unchanged(&mut self) {
        self.files_processed += 1;
    }

    /// Appends a change record. Returns false if the file was already recorded.
    pub fn record(&mut self, file: impl Into<PathBuf>, replacements: usize) -> bool {
        let file = file.into();
        self.files_processed += 1;
        if !self.seen.insert(file.clone()) {
            return false;
        }
        self.files_changed += 1;
        self.total_replacements += replacements;
        self.changes.push(ChangeRecord { file, replacements });
        true
    }

    /// Returns true if nothing was changed
    pub fn is_empty(&self) -> bool {
        self.files_changed == 0
    }
}

/// What a dry run would change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunOutcome {
    #[serde(flatten)]
    pub summary: ReplaceSummary,
    /// True when more eligible files existed than `max_files` allowed
    #[serde(default)]
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_match_absolute() {
        let m = FileMatch::new("src/lib.rs");
        assert_eq!(m.absolute(Path::new("/repo")), PathBuf::from("/repo/src/lib.rs"));
    }

    #[test]
    fn test_summary_record() {
        let mut summary = ReplaceSummary::new();
        assert!(summary.is_empty());

        assert!(summary.record("a.txt", 2));
        summary.record_unchanged();
        assert!(summary.record("b.txt", 3));

        assert_eq!(summary.files_processed, 3);
        assert_eq!(summary.files_changed, 2);
        assert_eq!(summary.total_replacements, 5);
        assert_eq!(
            summary.changes.iter().map(|c| c.replacements).sum::<usize>(),
            summary.total_replacements
        );
        // Processing order is preserved
        assert_eq!(summary.changes[0].file, PathBuf::from("a.txt"));
        assert_eq!(summary.changes[1].file, PathBuf::from("b.txt"));
    }

    #[test]
    fn test_summary_rejects_duplicate_file() {
        let mut summary = ReplaceSummary::new();
        assert!(summary.record("a.txt", 2));
        assert!(!summary.record("a.txt", 4));

        assert_eq!(summary.files_changed, 1);
        assert_eq!(summary.total_replacements, 2);
        assert_eq!(summary.changes.len(), 1);
    }
}
