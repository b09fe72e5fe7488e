use serde::Serialize;
use std::path::Path;

use crate::vcs::{detect_identity, GitCli, RepoIdentity, VcsGateway};

/// Answer to "can a workflow run in this directory?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// GitHub identity detected from the remote, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepoIdentity>,
}

impl DirectoryValidation {
    fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            repository: None,
        }
    }

    /// Short human description of the detected repository
    pub fn repo_info(&self) -> String {
        match &self.repository {
            Some(identity) => identity.to_string(),
            None => "GitHub repo not detected".to_string(),
        }
    }
}

/// Checks that `path` exists and is a git repository, and detects its GitHub
/// identity from `remote`
pub fn validate_directory(path: &Path, remote: &str) -> DirectoryValidation {
    validate_with(path, &GitCli::new(path), remote)
}

pub fn validate_with(path: &Path, vcs: &dyn VcsGateway, remote: &str) -> DirectoryValidation {
    if path.as_os_str().is_empty() {
        return DirectoryValidation::invalid("Directory path is required");
    }
    if !path.is_dir() {
        return DirectoryValidation::invalid("Directory does not exist");
    }
    if !vcs.is_repository() {
        return DirectoryValidation::invalid("Directory is not a Git repository");
    }

    DirectoryValidation {
        valid: true,
        error: None,
        repository: detect_identity(vcs, remote),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_empty_path() {
        let result = validate_directory(Path::new(""), "origin");
        assert!(!result.valid);
        assert_eq!(result.error.as_deref(), Some("Directory path is required"));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let result = validate_directory(&dir.path().join("nope"), "origin");
        assert!(!result.valid);
        assert_eq!(result.error.as_deref(), Some("Directory does not exist"));
    }

    #[test]
    fn test_not_a_repository() {
        let dir = tempdir().unwrap();
        let result = validate_directory(dir.path(), "origin");
        assert!(!result.valid);
        assert_eq!(
            result.error.as_deref(),
            Some("Directory is not a Git repository")
        );
    }

    #[test]
    fn test_repository_without_github_remote() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let result = validate_directory(dir.path(), "origin");
        assert!(result.valid);
        assert_eq!(result.repo_info(), "GitHub repo not detected");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"valid": true}));
    }
}
