use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::errors::VcsError;

/// Version-control operations the workflow needs
pub trait VcsGateway {
    /// True if the root is a repository working tree
    fn is_repository(&self) -> bool;
    fn current_branch(&self) -> Result<String, VcsError>;
    fn remote_url(&self, remote: &str) -> Result<String, VcsError>;
    fn status(&self) -> Result<WorkingTreeStatus, VcsError>;
    fn stage_all(&self) -> Result<(), VcsError>;
    fn has_staged_changes(&self) -> Result<bool, VcsError>;
    fn commit(&self, message: &str) -> Result<(), VcsError>;
    fn create_and_switch_branch(&self, name: &str) -> Result<(), VcsError>;
    fn switch_to_previous_branch(&self) -> Result<(), VcsError>;
    fn push_set_upstream(&self, remote: &str, branch: &str) -> Result<(), VcsError>;
}

/// One line of `git status --porcelain`
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    pub path: PathBuf,
    /// Index (staged) column
    pub index: char,
    /// Working tree column
    pub worktree: char,
}

impl StatusEntry {
    /// True for a modification or addition in either column
    pub fn is_modified_or_added(&self) -> bool {
        matches!(self.index, 'M' | 'A') || matches!(self.worktree, 'M' | 'A')
    }
}

/// Parsed working-tree status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingTreeStatus {
    pub entries: Vec<StatusEntry>,
}

impl WorkingTreeStatus {
    pub fn parse(output: &str) -> Self {
        let mut entries = Vec::new();

        for line in output.lines() {
            if line.len() < 4 {
                continue;
            }
            let mut codes = line.chars();
            let (Some(index), Some(worktree)) = (codes.next(), codes.next()) else {
                continue;
            };
            let Some(rest) = line.get(3..) else {
                continue;
            };

            // Renames list "old -> new"; keep the new path
            let path = match rest.split_once(" -> ") {
                Some((_, new)) => new.trim(),
                None => rest.trim(),
            };
            entries.push(StatusEntry {
                path: PathBuf::from(path),
                index,
                worktree,
            });
        }

        Self { entries }
    }

    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths with a modification or addition in either column
    pub fn modified_or_added(&self) -> Vec<&Path> {
        self.entries
            .iter()
            .filter(|e| e.is_modified_or_added())
            .map(|e| e.path.as_path())
            .collect()
    }
}

/// `VcsGateway` backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let command = format!("git {}", args.join(" "));
        debug!("Running `{}` in {}", command, self.root.display());

        let output = Command::new("git")
            .current_dir(&self.root)
            .args(args)
            .output()
            .map_err(|source| VcsError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(VcsError::Command { command, stderr });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl VcsGateway for GitCli {
    fn is_repository(&self) -> bool {
        self.root.join(".git").exists()
    }

    fn current_branch(&self) -> Result<String, VcsError> {
        let branch = self.run(&["branch", "--show-current"])?.trim().to_string();
        if branch.is_empty() {
            return Err(VcsError::Command {
                command: "git branch --show-current".to_string(),
                stderr: "HEAD is detached".to_string(),
            });
        }
        Ok(branch)
    }

    fn remote_url(&self, remote: &str) -> Result<String, VcsError> {
        Ok(self.run(&["remote", "get-url", remote])?.trim().to_string())
    }

    fn status(&self) -> Result<WorkingTreeStatus, VcsError> {
        self.run(&["status", "--porcelain"])
            .map(|out| WorkingTreeStatus::parse(&out))
    }

    fn stage_all(&self) -> Result<(), VcsError> {
        self.run(&["add", "."]).map(|_| ())
    }

    fn has_staged_changes(&self) -> Result<bool, VcsError> {
        Ok(!self
            .run(&["diff", "--cached", "--name-only"])?
            .trim()
            .is_empty())
    }

    fn commit(&self, message: &str) -> Result<(), VcsError> {
        self.run(&["commit", "-m", message]).map(|_| ())
    }

    fn create_and_switch_branch(&self, name: &str) -> Result<(), VcsError> {
        self.run(&["checkout", "-b", name]).map(|_| ())
    }

    fn switch_to_previous_branch(&self) -> Result<(), VcsError> {
        self.run(&["checkout", "-"]).map(|_| ())
    }

    fn push_set_upstream(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        self.run(&["push", "--set-upstream", remote, branch])
            .map(|_| ())
    }
}

/// GitHub owner and repository name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoIdentity {
    pub owner: String,
    pub name: String,
}

impl RepoIdentity {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Parses `https://github.com/owner/repo(.git)` and
/// `git@github.com:owner/repo(.git)` remote URLs
pub fn parse_github_remote(url: &str) -> Option<RepoIdentity> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("git@github.com:"))?;

    let mut parts = rest.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next()?;
    let name = name.strip_suffix(".git").unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    Some(RepoIdentity::new(owner, name))
}

/// Reads `remote` and parses it as a GitHub remote
pub fn detect_identity(vcs: &dyn VcsGateway, remote: &str) -> Option<RepoIdentity> {
    match vcs.remote_url(remote) {
        Ok(url) => {
            let identity = parse_github_remote(&url);
            if identity.is_none() {
                debug!("Unsupported remote URL format: {}", url);
            }
            identity
        }
        Err(e) => {
            debug!("Could not read remote '{}': {}", remote, e);
            None
        }
    }
}
