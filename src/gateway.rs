//! Remote execution gateway.
//!
//! `RemoteExecutionGateway` is the crate's network boundary: dispatch a
//! workflow, list recent runs, query one run, post a commit status. The
//! bundled `GitHubGateway` talks to a GitHub-Actions-shaped REST API and
//! is the only code in the crate that retries — every operation routes
//! through the policy in [`crate::retry`].

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::errors::GatewayError;
use crate::retry::{RetryPolicy, with_retry};
use crate::run::{RunHandle, RunListResponse};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "tether";

/// State posted to a commit's status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

/// Network boundary for the remote execution platform.
///
/// Dispatch is fire-and-forget by platform design: it returns no run
/// identifier, which is why the correlator exists.
#[async_trait]
pub trait RemoteExecutionGateway: Send + Sync {
    /// Trigger a workflow. No identifier is returned.
    async fn dispatch(
        &self,
        target: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<(), GatewayError>;

    /// List recent runs of a workflow, optionally filtered by branch.
    async fn list_recent_runs(
        &self,
        target: &str,
        branch: Option<&str>,
    ) -> Result<Vec<RunHandle>, GatewayError>;

    /// Fetch a single run by id.
    async fn query_run(&self, id: u64) -> Result<RunHandle, GatewayError>;

    /// Set a commit's status check. Tolerates the eventual-consistency
    /// window after the commit was pushed.
    async fn post_status(
        &self,
        commit_sha: &str,
        state: CommitState,
        context: &str,
    ) -> Result<(), GatewayError>;
}

// Lets a shared gateway be handed to the correlator and the reconciler
// at the same time.
#[async_trait]
impl<G: RemoteExecutionGateway + ?Sized> RemoteExecutionGateway for std::sync::Arc<G> {
    async fn dispatch(
        &self,
        target: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<(), GatewayError> {
        (**self).dispatch(target, inputs).await
    }

    async fn list_recent_runs(
        &self,
        target: &str,
        branch: Option<&str>,
    ) -> Result<Vec<RunHandle>, GatewayError> {
        (**self).list_recent_runs(target, branch).await
    }

    async fn query_run(&self, id: u64) -> Result<RunHandle, GatewayError> {
        (**self).query_run(id).await
    }

    async fn post_status(
        &self,
        commit_sha: &str,
        state: CommitState,
        context: &str,
    ) -> Result<(), GatewayError> {
        (**self).post_status(commit_sha, state, context).await
    }
}

/// Configuration for [`GitHubGateway`].
#[derive(Debug, Clone)]
pub struct GitHubGatewayConfig {
    /// API base URL (override for tests or GHE).
    pub api_base: String,
    /// `owner/repo` slug.
    pub repo: String,
    /// Bearer token for the API.
    pub token: String,
    /// Git ref dispatched workflows run against.
    pub git_ref: String,
    /// Retry policy applied to every operation.
    pub retry: RetryPolicy,
}

impl GitHubGatewayConfig {
    pub fn new(repo: &str, token: &str, git_ref: &str) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
            git_ref: git_ref.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Reqwest-backed gateway against the GitHub Actions REST API.
pub struct GitHubGateway {
    client: reqwest::Client,
    config: GitHubGatewayConfig,
    cancel: CancellationToken,
}

impl GitHubGateway {
    pub fn new(config: GitHubGatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Share a cancellation token with the caller; in-flight retries stop
    /// as soon as it fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}", self.config.api_base, self.config.repo, path)
    }

    /// Classify a non-success HTTP status into the error taxonomy.
    ///
    /// `fresh_resource` marks operations that target a resource created
    /// moments ago (a just-pushed commit, a just-triggered run): for
    /// those, "not found" style responses mean the remote index has not
    /// caught up yet and are retried rather than treated as permanent.
    fn classify_status(
        status: reqwest::StatusCode,
        body: &str,
        fresh_resource: bool,
    ) -> GatewayError {
        let detail = format!("{status}: {}", body.trim());
        match status.as_u16() {
            401 | 403 => GatewayError::Auth(detail),
            404 | 422 if fresh_resource => GatewayError::EventualConsistency(detail),
            400..=499 => GatewayError::PermanentValidation(detail),
            _ => GatewayError::TransientNetwork(detail),
        }
    }

    fn classify_transport(err: reqwest::Error) -> GatewayError {
        GatewayError::TransientNetwork(err.to_string())
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        fresh_resource: bool,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = request
            .bearer_auth(&self.config.token)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::classify_status(status, &body, fresh_resource))
    }

    async fn dispatch_once(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<(), GatewayError> {
        // 404 here means the workflow file does not exist: permanent.
        self.send(self.client.post(url).json(body), false)
            .await?;
        Ok(())
    }

    async fn list_runs_once(
        &self,
        url: &str,
        branch: Option<&str>,
    ) -> Result<Vec<RunHandle>, GatewayError> {
        let mut query: Vec<(&str, &str)> = vec![("per_page", "30")];
        if let Some(branch) = branch {
            query.push(("branch", branch));
        }
        let response = self
            .send(self.client.get(url).query(&query), false)
            .await?;
        let parsed: RunListResponse = response
            .json()
            .await
            .context("Failed to parse run list response")
            .map_err(|e| GatewayError::PermanentValidation(format!("{e:#}")))?;
        Ok(parsed.workflow_runs)
    }

    async fn query_run_once(&self, url: &str) -> Result<RunHandle, GatewayError> {
        // A just-triggered run id can 404 briefly: eventually consistent.
        let response = self.send(self.client.get(url), true).await?;
        response
            .json::<RunHandle>()
            .await
            .context("Failed to parse run response")
            .map_err(|e| GatewayError::PermanentValidation(format!("{e:#}")))
    }

    async fn post_status_once(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<(), GatewayError> {
        // A just-pushed commit can 404/422 until the index catches up.
        self.send(self.client.post(url).json(body), true)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteExecutionGateway for GitHubGateway {
    async fn dispatch(
        &self,
        target: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<(), GatewayError> {
        let url = self.url(&format!("actions/workflows/{target}/dispatches"));
        let body = json!({ "ref": self.config.git_ref, "inputs": inputs });
        with_retry(&self.config.retry, &self.cancel, "dispatch", || {
            self.dispatch_once(&url, &body)
        })
        .await
    }

    async fn list_recent_runs(
        &self,
        target: &str,
        branch: Option<&str>,
    ) -> Result<Vec<RunHandle>, GatewayError> {
        let url = self.url(&format!("actions/workflows/{target}/runs"));
        with_retry(&self.config.retry, &self.cancel, "list_recent_runs", || {
            self.list_runs_once(&url, branch)
        })
        .await
    }

    async fn query_run(&self, id: u64) -> Result<RunHandle, GatewayError> {
        let url = self.url(&format!("actions/runs/{id}"));
        with_retry(&self.config.retry, &self.cancel, "query_run", || {
            self.query_run_once(&url)
        })
        .await
    }

    async fn post_status(
        &self,
        commit_sha: &str,
        state: CommitState,
        context: &str,
    ) -> Result<(), GatewayError> {
        let url = self.url(&format!("statuses/{commit_sha}"));
        let body = json!({ "state": state, "context": context });
        with_retry(&self.config.retry, &self.cancel, "post_status", || {
            self.post_status_once(&url, &body)
        })
        .await
    }
}
