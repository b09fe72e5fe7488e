use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::WorkflowConfig;
use crate::scan::SearchSpec;
use crate::vcs::RepoIdentity;
use crate::workflow::WorkflowRequest;

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// A job submission as a caller describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub directory: PathBuf,
    pub search: String,
    pub replace: String,
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub use_regex: bool,
    #[serde(default)]
    pub max_files: Option<usize>,
    #[serde(default)]
    pub exclude_dirs: Option<Vec<String>>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub pr_title: Option<String>,
    #[serde(default)]
    pub pr_description: Option<String>,
    #[serde(default, skip_serializing)]
    pub github_token: Option<String>,
    #[serde(default)]
    pub repo_owner: Option<String>,
    #[serde(default)]
    pub repo_name: Option<String>,
    #[serde(default)]
    pub allow_protected: bool,
}

impl JobDescriptor {
    pub fn new(
        directory: impl Into<PathBuf>,
        search: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            search: search.into(),
            replace: replace.into(),
            extensions: None,
            use_regex: false,
            max_files: None,
            exclude_dirs: None,
            dry_run: false,
            branch: None,
            commit_message: None,
            pr_title: None,
            pr_description: None,
            github_token: None,
            repo_owner: None,
            repo_name: None,
            allow_protected: false,
        }
    }

    /// Builds the workflow request, filling gaps from `config` and the
    /// `GITHUB_TOKEN` environment variable
    pub fn into_request(self, config: &WorkflowConfig) -> WorkflowRequest {
        let mut search = SearchSpec::new(self.search)
            .regex(self.use_regex)
            .with_exclude_dirs(
                self.exclude_dirs
                    .unwrap_or_else(|| config.exclude_dirs.clone()),
            )
            .with_max_files(self.max_files.unwrap_or(config.max_files));
        if let Some(extensions) = self.extensions.filter(|e| !e.is_empty()) {
            search = search.with_extensions(extensions);
        }

        let repo = match (self.repo_owner, self.repo_name) {
            (Some(owner), Some(name)) if !owner.is_empty() && !name.is_empty() => {
                Some(RepoIdentity::new(owner, name))
            }
            _ => None,
        };
        let token = self
            .github_token
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()));

        WorkflowRequest {
            directory: self.directory,
            search,
            replacement: self.replace,
            branch_name: self.branch,
            commit_message: self.commit_message,
            pr_title: self.pr_title,
            pr_description: self.pr_description,
            repo,
            token,
            allow_protected: self.allow_protected,
        }
    }
}
