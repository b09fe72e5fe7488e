use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::{debug, info};

use crate::errors::PrError;
use crate::results::ChangeRecord;
use crate::vcs::RepoIdentity;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "swapscout";
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Everything needed to open one pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRequest {
    pub repo: RepoIdentity,
    pub token: String,
    pub title: String,
    pub body: String,
    /// Branch holding the changes
    pub head: String,
    /// Branch the changes should merge into
    pub base: String,
}

/// A pull request the hosting service accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPullRequest {
    pub url: String,
}

/// Opens pull requests on a hosting service
pub trait PullRequestGateway {
    fn create_pull_request(
        &self,
        request: &PullRequestRequest,
    ) -> Result<CreatedPullRequest, PrError>;
}

#[derive(Serialize)]
struct CreatePullBody<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Deserialize)]
struct PullResponse {
    html_url: String,
}

/// GitHub REST client for `POST /repos/{owner}/{repo}/pulls`
#[derive(Debug, Clone)]
pub struct GitHubClient {
    api_url: String,
    client: Client,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>) -> Result<Self, PrError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn pulls_endpoint(&self, repo: &RepoIdentity) -> String {
        format!("{}/repos/{}/{}/pulls", self.api_url, repo.owner, repo.name)
    }
}

impl PullRequestGateway for GitHubClient {
    fn create_pull_request(
        &self,
        request: &PullRequestRequest,
    ) -> Result<CreatedPullRequest, PrError> {
        let endpoint = self.pulls_endpoint(&request.repo);
        debug!(
            "Creating pull request {} -> {} at {}",
            request.head, request.base, endpoint
        );

        let response = self
            .client
            .post(&endpoint)
            .header(AUTHORIZATION, format!("token {}", request.token))
            .header(ACCEPT, GITHUB_ACCEPT)
            .json(&CreatePullBody {
                title: &request.title,
                body: &request.body,
                head: &request.head,
                base: &request.base,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PrError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let created: PullResponse = response.json()?;
        info!("Created pull request: {}", created.html_url);
        Ok(CreatedPullRequest {
            url: created.html_url,
        })
    }
}

/// Default pull request title
pub fn default_title(files_changed: usize) -> String {
    format!("Text replacement: {} files modified", files_changed)
}

/// Default pull request description listing every change
pub fn default_body(changes: &[ChangeRecord]) -> String {
    let mut body = format!(
        "## Text Replacement Summary\n\nThis PR contains automated text replacements across {} files.\n\n### Files Modified:\n",
        changes.len()
    );
    for change in changes {
        let _ = writeln!(
            body,
            "- {} ({} replacements)",
            change.file.display(),
            change.replacements
        );
    }
    body
}
