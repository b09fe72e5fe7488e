/// Error types for swapscout.
///
/// Errors are split by the layer that produces them. Per-file problems during
/// scanning are never errors at all (the file is skipped), per-file problems
/// during substitution are `ReplaceError`s that the caller may swallow, and
/// anything that stops a workflow is reported through `SwapError`.
///
/// ```rust,ignore
/// match outcome.into_result() {
///     Ok(outcome) => println!("opened {}", outcome.pr_url.unwrap_or_default()),
///     Err(SwapError::ProtectionRefused(branch)) => eprintln!("left {} alone", branch),
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
use std::path::PathBuf;
use thiserror::Error;

use crate::workflow::{AbortReason, FailureReason};

/// Result type for swapscout operations
pub type SwapResult<T> = Result<T, SwapError>;

/// Top-level error taxonomy
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("Refused to modify protected branch '{0}'")]
    ProtectionRefused(String),
    #[error("Workflow aborted: {0}")]
    Abort(AbortReason),
    #[error("Workflow failed: {0}")]
    Failure(FailureReason),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Job error: {0}")]
    Job(#[from] JobError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SwapError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<config::ConfigError> for SwapError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Errors raised before or during a directory walk.
///
/// Unreadable or undecodable files are not errors; they are skipped.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Cannot walk {path}: {reason}")]
    Walk { path: PathBuf, reason: String },
    #[error("Scan interrupted")]
    Interrupted,
}

impl ScanError {
    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn walk(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Walk {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Per-file substitution errors
#[derive(Error, Debug)]
pub enum ReplaceError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid UTF-8 in file {path}: {source}")]
    Encoding {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },
}

impl ReplaceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn encoding_error(path: impl Into<PathBuf>, source: std::string::FromUtf8Error) -> Self {
        Self::Encoding {
            path: path.into(),
            source,
        }
    }
}

/// Failures reported by the version-control gateway
#[derive(Error, Debug)]
pub enum VcsError {
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },
}

/// Failures reported by the pull-request gateway
#[derive(Error, Debug)]
pub enum PrError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub API returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Job lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SwapError::validation("Directory does not exist");
        assert!(matches!(err, SwapError::Validation(_)));

        let err = SwapError::config_error("Missing token");
        assert!(matches!(err, SwapError::Config(_)));

        let err: SwapError = ScanError::invalid_pattern("(").into();
        assert!(matches!(err, SwapError::Scan(ScanError::InvalidPattern(_))));

        let err: SwapError = JobError::NotFound("job".to_string()).into();
        assert!(matches!(err, SwapError::Job(JobError::NotFound(_))));
    }

    #[test]
    fn test_error_messages() {
        let err = SwapError::ProtectionRefused("main".to_string());
        assert_eq!(err.to_string(), "Refused to modify protected branch 'main'");

        let err = ScanError::invalid_pattern("unclosed group");
        assert_eq!(err.to_string(), "Invalid pattern: unclosed group");

        let err = VcsError::Command {
            command: "git push".to_string(),
            stderr: "rejected".to_string(),
        };
        assert_eq!(err.to_string(), "`git push` failed: rejected");

        let err = PrError::Api {
            status: 422,
            body: "Validation Failed".to_string(),
        };
        assert_eq!(err.to_string(), "GitHub API returned 422: Validation Failed");

        let err = JobError::NotFound("abc".to_string());
        assert_eq!(err.to_string(), "Job not found: abc");
    }

    #[test]
    fn test_encoding_error_keeps_path() {
        let source = String::from_utf8(vec![0xff, 0xfe]).unwrap_err();
        let err = ReplaceError::encoding_error("missing/file.bin", source);
        match err {
            ReplaceError::Encoding { path, .. } => {
                assert!(path.ends_with("file.bin"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
