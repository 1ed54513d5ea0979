//! GitHub REST client
//!
//! Implements [`RepositoryClient`] against the repository contents, commits,
//! check-runs and Actions job-log endpoints.

use std::collections::HashSet;

use async_trait::async_trait;
use labgrade_core::repo::RepoResult;
use labgrade_core::{CommitInfo, RawCheckRun, RepoError, RepoRef, RepositoryClient};
use reqwest::header::ACCEPT;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{GitHubConfig, API_VERSION};
use crate::wire::{CheckRunsPage, CommitDetail, CommitSummary};

/// Directory whose presence means "CI is configured".
pub const WORKFLOWS_DIR: &str = ".github/workflows";

/// Commits requested per history page.
pub const HISTORY_PAGE_SIZE: usize = 100;

/// Upper bound on history pages walked by [`RepositoryClient::all_modified_files`].
pub const MAX_HISTORY_PAGES: usize = 10;

const MEDIA_TYPE: &str = "application/vnd.github+json";

fn transport(err: reqwest::Error) -> RepoError {
    RepoError::Transport(err.to_string())
}

fn status_error(status: StatusCode, url: &str) -> RepoError {
    RepoError::Status {
        status: status.as_u16(),
        url: url.to_string(),
    }
}

/// GitHub client for repository inspection
pub struct GitHubClient {
    config: GitHubConfig,
    http_client: reqwest::Client,
}

impl GitHubClient {
    /// Create a new GitHub client
    pub fn new(config: GitHubConfig) -> RepoResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(transport)?;

        Ok(GitHubClient {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> RepoResult<Self> {
        Self::new(GitHubConfig::from_env())
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn repo_url(&self, repo: &RepoRef, tail: &str) -> String {
        self.url(&format!("repos/{}/{}/{}", repo.owner, repo.name, tail))
    }

    async fn get(&self, url: &str) -> RepoResult<Response> {
        debug!(url, "GitHub GET");
        let request = self
            .http_client
            .get(url)
            .header(ACCEPT, MEDIA_TYPE)
            .header("X-GitHub-Api-Version", API_VERSION);
        let request = match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request.send().await.map_err(transport)
    }

    /// `true` on 2xx, `false` on 404.
    async fn exists(&self, url: &str) -> RepoResult<bool> {
        let response = self.get(url).await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(status_error(s, url)),
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> RepoResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| RepoError::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> RepoResult<T> {
        let response = self.get(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, url));
        }
        Self::decode(response).await
    }

    /// One page of the commit list, or `None` when the repository has no
    /// history to list (409 for an empty repository).
    async fn commit_page(
        &self,
        repo: &RepoRef,
        per_page: usize,
        page: usize,
    ) -> RepoResult<Option<Vec<CommitSummary>>> {
        let url = self.repo_url(repo, &format!("commits?per_page={per_page}&page={page}"));
        let response = self.get(&url).await?;
        match response.status() {
            s if s.is_success() => Self::decode(response).await.map(Some),
            StatusCode::CONFLICT => Ok(None),
            StatusCode::NOT_FOUND => Err(RepoError::NotFound(repo.to_string())),
            s => Err(status_error(s, &url)),
        }
    }

    async fn commit_detail(&self, repo: &RepoRef, sha: &str) -> RepoResult<CommitDetail> {
        self.get_json(&self.repo_url(repo, &format!("commits/{sha}")))
            .await
    }

    /// Whether a GitHub account named `username` exists.
    pub async fn user_exists(&self, username: &str) -> RepoResult<bool> {
        self.exists(&self.url(&format!("users/{}", username.trim())))
            .await
    }

    /// Whether `path` exists in the default branch of `repo`.
    pub async fn file_exists(&self, repo: &RepoRef, path: &str) -> RepoResult<bool> {
        self.exists(&self.repo_url(repo, &format!("contents/{path}")))
            .await
    }
}

#[async_trait]
impl RepositoryClient for GitHubClient {
    async fn missing_files(&self, repo: &RepoRef, required: &[String]) -> RepoResult<Vec<String>> {
        let mut missing = Vec::new();
        for path in required {
            if !self.file_exists(repo, path).await? {
                missing.push(path.clone());
            }
        }
        Ok(missing)
    }

    async fn has_ci_config(&self, repo: &RepoRef) -> RepoResult<bool> {
        self.file_exists(repo, WORKFLOWS_DIR).await
    }

    async fn latest_commit(&self, repo: &RepoRef) -> RepoResult<Option<CommitInfo>> {
        let Some(latest) = self
            .commit_page(repo, 1, 1)
            .await?
            .and_then(|commits| commits.into_iter().next())
        else {
            return Ok(None);
        };

        match self.commit_detail(repo, &latest.sha).await {
            Ok(detail) => Ok(Some(CommitInfo {
                sha: detail.sha,
                files: detail.files,
            })),
            Err(err) => {
                warn!(repo = %repo, sha = %latest.sha, error = %err, "commit details unavailable");
                Ok(Some(CommitInfo {
                    sha: latest.sha,
                    files: Vec::new(),
                }))
            }
        }
    }

    async fn all_modified_files(&self, repo: &RepoRef) -> RepoResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut paths = Vec::new();

        for page in 1..=MAX_HISTORY_PAGES {
            let commits = match self.commit_page(repo, HISTORY_PAGE_SIZE, page).await? {
                Some(commits) => commits,
                None => break,
            };
            let last_page = commits.len() < HISTORY_PAGE_SIZE;

            for commit in commits {
                match self.commit_detail(repo, &commit.sha).await {
                    Ok(detail) => {
                        for file in detail.files {
                            if seen.insert(file.filename.clone()) {
                                paths.push(file.filename);
                            }
                        }
                    }
                    Err(err) => {
                        warn!(repo = %repo, sha = %commit.sha, error = %err, "skipping commit in history scan");
                    }
                }
            }

            if last_page {
                break;
            }
            if page == MAX_HISTORY_PAGES {
                warn!(repo = %repo, pages = MAX_HISTORY_PAGES, "history scan truncated");
            }
        }

        Ok(paths)
    }

    async fn check_runs(&self, repo: &RepoRef, sha: &str) -> RepoResult<Vec<RawCheckRun>> {
        let url = self.repo_url(repo, &format!("commits/{sha}/check-runs?per_page=100"));
        let page: CheckRunsPage = self.get_json(&url).await?;
        debug!(repo = %repo, sha, total = page.total_count, "fetched check runs");
        Ok(page.check_runs)
    }

    async fn job_logs(&self, repo: &RepoRef, job_id: u64) -> RepoResult<Option<String>> {
        // GitHub answers with a redirect to short-lived blob storage; reqwest follows it.
        let url = self.repo_url(repo, &format!("actions/jobs/{job_id}/logs"));
        let response = self.get(&url).await?;
        match response.status() {
            s if s.is_success() => response.text().await.map(Some).map_err(transport),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            s => Err(status_error(s, &url)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_base_and_repo() {
        let client = GitHubClient::new(GitHubConfig::new("http://localhost:9000/")).unwrap();
        let repo = RepoRef::new("suai-os", "os-task2-octocat");
        assert_eq!(
            client.repo_url(&repo, "contents/main.py"),
            "http://localhost:9000/repos/suai-os/os-task2-octocat/contents/main.py"
        );
        assert_eq!(client.url("/users/octocat"), "http://localhost:9000/users/octocat");
    }

    #[test]
    fn status_error_carries_code() {
        let err = status_error(StatusCode::BAD_GATEWAY, "http://x/y");
        assert_eq!(
            err,
            RepoError::Status {
                status: 502,
                url: "http://x/y".to_string()
            }
        );
    }
}
