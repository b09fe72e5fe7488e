/// Directory scanning: walk a root, filter candidates, test their content.
///
/// The walk itself is sequential and stops as soon as `max_files` candidates
/// are gathered; content matching then runs on the rayon pool in chunks, the
/// same way a plain search would. Traversal order comes from the filesystem,
/// so two scans of the same tree may list matches in a different order. The
/// order of `ScanOutcome::matches` always follows the candidate order of the
/// scan that produced it.
///
/// Reading is best-effort: a file that cannot be opened is skipped, and bytes
/// that are not valid UTF-8 are replaced rather than rejected.
pub mod matcher;

pub use matcher::PatternMatcher;

use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, trace, warn};

use crate::config::{default_exclude_dirs, default_max_files};
use crate::errors::ScanError;
use crate::filters::should_include_file;
use crate::interrupt::InterruptFlag;
use crate::progress::{Phase, ProgressSink};
use crate::results::{FileMatch, ScanOutcome};

const MIN_CHUNK_SIZE: usize = 16; // Minimum files per chunk to reduce overhead
const MAX_CHUNK_SIZE: usize = 256; // Maximum files per chunk to ensure good load balancing

/// What to look for and where not to look
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpec {
    /// Search pattern, matched case-insensitively
    pub pattern: String,
    /// Treat `pattern` as a regular expression
    #[serde(default)]
    pub is_regex: bool,
    /// Allowed suffixes (e.g. [".txt", "md"]); None allows every file
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    /// Path substrings that exclude a file
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// Hard cap on the number of candidates
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl SearchSpec {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            is_regex: false,
            extensions: None,
            exclude_dirs: default_exclude_dirs(),
            max_files: default_max_files(),
        }
    }

    pub fn regex(mut self, is_regex: bool) -> Self {
        self.is_regex = is_regex;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn with_exclude_dirs(mut self, exclude_dirs: Vec<String>) -> Self {
        self.exclude_dirs = exclude_dirs;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }
}

/// Walks a directory and reports the files whose content matches a pattern
#[derive(Debug, Clone)]
pub struct FileScanner {
    thread_count: NonZeroUsize,
    interrupt: InterruptFlag,
}

impl FileScanner {
    pub fn new(thread_count: NonZeroUsize) -> Self {
        Self {
            thread_count,
            interrupt: InterruptFlag::new(),
        }
    }

    /// Uses `interrupt` to stop the scan early
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Scans `root` for files matching `spec`
    pub fn scan(
        &self,
        root: &Path,
        spec: &SearchSpec,
        progress: &dyn ProgressSink,
    ) -> Result<ScanOutcome, ScanError> {
        let matcher = PatternMatcher::new(&spec.pattern, spec.is_regex)?;
        self.scan_with(root, spec, &matcher, progress)
    }

    /// Scans `root` using an already compiled matcher
    pub fn scan_with(
        &self,
        root: &Path,
        spec: &SearchSpec,
        matcher: &PatternMatcher,
        progress: &dyn ProgressSink,
    ) -> Result<ScanOutcome, ScanError> {
        info!("Starting scan of {} for '{}'", root.display(), spec.pattern);
        progress.report(Phase::Scan, Phase::Scan.span().0, "Searching files...");

        let (candidates, truncated) = self.collect_candidates(root, spec)?;
        let total = candidates.len();
        if truncated {
            warn!(
                "Reached maximum file limit ({}). Remaining files were not scanned.",
                spec.max_files
            );
        }
        progress.report(
            Phase::Scan,
            scan_percent(0, total),
            &format!("Scanning {} files...", total),
        );

        let checked = AtomicUsize::new(0);
        let chunk_size = (total / self.thread_count.get()).clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);

        let matches: Vec<FileMatch> = candidates
            .par_chunks(chunk_size)
            .flat_map(|chunk| {
                chunk
                    .iter()
                    .filter_map(|relative| {
                        if self.interrupt.is_raised() {
                            return None;
                        }
                        let done = checked.fetch_add(1, Ordering::Relaxed) + 1;
                        progress.report(
                            Phase::Scan,
                            scan_percent(done, total),
                            &format!("Checking file {}/{}", done, total),
                        );

                        let content = read_lossy(&root.join(relative))?;
                        if matcher.is_match(&content) {
                            trace!("Match in {}", relative.display());
                            Some(FileMatch::new(relative.clone()))
                        } else {
                            None
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        if self.interrupt.is_raised() {
            warn!("Scan of {} interrupted", root.display());
            return Err(ScanError::Interrupted);
        }

        progress.report(
            Phase::Scan,
            Phase::Scan.span().1,
            &format!("Found {} matching files", matches.len()),
        );
        info!(
            "Scan complete. Found {} matching files among {} candidates",
            matches.len(),
            total
        );

        Ok(ScanOutcome {
            matches,
            candidates: total,
            truncated,
        })
    }

    /// Walks `root` and returns candidate paths relative to it, plus a
    /// truncation flag that is set only when another eligible file existed
    /// past the cap.
    fn collect_candidates(
        &self,
        root: &Path,
        spec: &SearchSpec,
    ) -> Result<(Vec<PathBuf>, bool), ScanError> {
        if !root.is_dir() {
            return Err(ScanError::walk(root, "not a readable directory"));
        }

        let mut walker = WalkBuilder::new(root);
        walker
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(|entry| {
                // Prune hidden directories instead of walking into them
                entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
            });

        let mut candidates = Vec::new();
        let mut truncated = false;

        for entry in walker.build() {
            if self.interrupt.is_raised() {
                return Err(ScanError::Interrupted);
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("Skipping unreadable entry: {}", err);
                    continue;
                }
            };
            // Symlinked files count, symlinked directories are not entered
            let is_file = entry.file_type().is_some_and(|ft| {
                ft.is_file() || (ft.is_symlink() && entry.path().is_file())
            });
            if !is_file {
                continue;
            }

            let relative = match entry.path().strip_prefix(root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => continue,
            };
            if !should_include_file(&relative, &spec.extensions, &spec.exclude_dirs) {
                continue;
            }

            if candidates.len() >= spec.max_files {
                truncated = true;
                break;
            }
            candidates.push(relative);
        }

        debug!("Found {} candidate files", candidates.len());
        Ok((candidates, truncated))
    }
}

/// Overall percentage for `done` of `total` checked files: the walk takes the
/// first tenth of the scan phase, matching the rest.
fn scan_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return Phase::Scan.scale(1, 10);
    }
    Phase::Scan.scale(total + 9 * done, 10 * total)
}

/// Reads a file, replacing invalid UTF-8. Unreadable files yield None.
fn read_lossy(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            debug!("Skipping {}: {}", path.display(), err);
            None
        }
    }
}
