use std::fs;
use std::io::Write;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::errors::{ReplaceError, ScanError};
use crate::progress::{Phase, ProgressSink};
use crate::results::{FileMatch, ReplaceSummary};
use crate::scan::PatternMatcher;

/// Result of applying a substitution to one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Substitution {
    /// True if the content differs after substitution
    pub changed: bool,
    /// Case-insensitive count of the search text in the original content
    pub occurrences: usize,
}

impl Substitution {
    fn unchanged() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
enum Mode {
    /// Case-insensitive regex substitution with `$1`-style expansion
    Regex(Regex),
    /// Exact, case-sensitive substring substitution
    Literal,
}

/// Applies one search/replace pair to files.
///
/// Regex mode replaces case-insensitively, literal mode replaces only exact
/// (case-sensitive) occurrences. In both modes the reported occurrence count
/// is the case-insensitive count of the search text taken literally, so a
/// regex like `fo+` reports how often the characters `fo+` appear.
#[derive(Debug, Clone)]
pub struct TextSubstitutor {
    search: String,
    replacement: String,
    mode: Mode,
    counter: PatternMatcher,
}

impl TextSubstitutor {
    /// Builds a substitutor for `search`.
    ///
    /// In regex mode `$1`, `$name` and `${name}` in `replacement` expand to
    /// capture groups that exist in the pattern. A reference to a group the
    /// pattern does not have stays as written, so `price: $5` is inserted
    /// verbatim by a pattern with fewer than five groups. `$$` is a literal `$`.
    pub fn new(
        search: impl Into<String>,
        replacement: impl Into<String>,
        is_regex: bool,
    ) -> Result<Self, ScanError> {
        let search = search.into();
        let replacement = replacement.into();
        let counter = PatternMatcher::literal(&search)?;
        let (mode, replacement) = if is_regex {
            let regex = PatternMatcher::new(&search, true)?.regex().clone();
            let replacement = keep_unknown_group_refs(&replacement, &regex);
            (Mode::Regex(regex), replacement)
        } else {
            (Mode::Literal, replacement)
        };

        Ok(Self {
            search,
            replacement,
            mode,
            counter,
        })
    }

    /// Computes the substituted content, or None if nothing would change
    pub fn substitute(&self, content: &str) -> Option<String> {
        let updated = match &self.mode {
            Mode::Regex(regex) => regex
                .replace_all(content, self.replacement.as_str())
                .into_owned(),
            Mode::Literal => content.replace(&self.search, &self.replacement),
        };
        (updated != content).then_some(updated)
    }

    /// Applies the substitution to `path`. Nothing is written when the content
    /// is unchanged or `dry_run` is set.
    pub fn apply(&self, path: &Path, dry_run: bool) -> Result<Substitution, ReplaceError> {
        let bytes = fs::read(path).map_err(|e| ReplaceError::io(path, e))?;
        let content =
            String::from_utf8(bytes).map_err(|e| ReplaceError::encoding_error(path, e))?;

        let Some(updated) = self.substitute(&content) else {
            return Ok(Substitution::unchanged());
        };

        if !dry_run {
            write_atomic(path, &updated)?;
        }

        Ok(Substitution {
            changed: true,
            occurrences: self.counter.count(&content),
        })
    }

    /// Applies the substitution to every match in order.
    ///
    /// Per-file failures are logged and the file counts as processed but
    /// unchanged.
    pub fn apply_all(
        &self,
        root: &Path,
        matches: &[FileMatch],
        dry_run: bool,
        progress: &dyn ProgressSink,
    ) -> ReplaceSummary {
        let mut summary = ReplaceSummary::new();
        let total = matches.len();

        for (index, file) in matches.iter().enumerate() {
            let name = file
                .relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.relative.display().to_string());
            progress.report(
                Phase::Replace,
                Phase::Replace.scale(index, total),
                &format!("Processing {}...", name),
            );

            match self.apply(&file.absolute(root), dry_run) {
                Ok(result) if result.changed => {
                    debug!(
                        "Made {} replacement(s) in {}",
                        result.occurrences,
                        file.relative.display()
                    );
                    if !summary.record(&file.relative, result.occurrences) {
                        warn!("{} was already recorded", file.relative.display());
                    }
                }
                Ok(_) => {
                    debug!("No changes needed in {}", file.relative.display());
                    summary.record_unchanged();
                }
                Err(e) => {
                    warn!("Error processing {}: {}", file.relative.display(), e);
                    summary.record_unchanged();
                }
            }
        }

        progress.report(
            Phase::Replace,
            Phase::Replace.span().1,
            "Text replacement completed!",
        );
        info!(
            "{} files processed, {} files changed, {} total replacements{}",
            summary.files_processed,
            summary.files_changed,
            summary.total_replacements,
            if dry_run { " (dry run)" } else { "" }
        );

        summary
    }
}

/// Escapes `$` references to groups `regex` does not define, so they are
/// inserted literally instead of expanding to nothing.
fn keep_unknown_group_refs(replacement: &str, regex: &Regex) -> String {
    let is_group = |name: &str| match name.parse::<usize>() {
        Ok(index) => index < regex.captures_len(),
        Err(_) => regex.capture_names().flatten().any(|n| n == name),
    };

    let mut out = String::with_capacity(replacement.len());
    let mut rest = replacement;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(tail) = after.strip_prefix('$') {
            out.push_str("$$");
            rest = tail;
            continue;
        }

        let (name, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            },
            None => {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], end)
            }
        };

        if name.is_empty() || !is_group(name) {
            out.push('$');
        }
        out.push('$');
        out.push_str(&after[..consumed]);
        rest = &after[consumed..];
    }
    out.push_str(rest);
    out
}

/// Writes through a temporary file in the same directory and renames it over
/// `path`, keeping the original permissions. A symlink is resolved first so
/// the link stays in place and its target receives the new content.
fn write_atomic(path: &Path, content: &str) -> Result<(), ReplaceError> {
    let is_link = fs::symlink_metadata(path)
        .map_err(|e| ReplaceError::io(path, e))?
        .file_type()
        .is_symlink();
    let target = if is_link {
        fs::canonicalize(path).map_err(|e| ReplaceError::io(path, e))?
    } else {
        path.to_path_buf()
    };
    let path = target.as_path();

    let permissions = fs::metadata(path)
        .map_err(|e| ReplaceError::io(path, e))?
        .permissions();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ReplaceError::io(path, e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| ReplaceError::io(path, e))?;
    tmp.flush().map_err(|e| ReplaceError::io(path, e))?;
    tmp.persist(path).map_err(|e| ReplaceError::io(path, e.error))?;

    fs::set_permissions(path, permissions).map_err(|e| ReplaceError::io(path, e))
}
