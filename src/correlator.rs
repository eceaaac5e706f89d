//! Dispatch correlation.
//!
//! The dispatch endpoint returns no identifier, so resolving "which run
//! did my trigger start?" takes three steps: embed a fresh token in the
//! dispatch inputs, trigger, then poll the run list until a title carries
//! the delimiter-wrapped token. Polling follows the same adaptive cadence
//! as the gateway retry schedule but is bounded by the caller's timeout.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::errors::CorrelatorError;
use crate::gateway::RemoteExecutionGateway;
use crate::retry::RetryPolicy;
use crate::run::RunHandle;
use crate::token::{CorrelationToken, RESERVED_INPUT_KEY, title_matches};

/// A dispatch with its correlation token merged in. Immutable once built.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    target: String,
    inputs: BTreeMap<String, String>,
    token: CorrelationToken,
}

impl DispatchRequest {
    /// Generate a token and merge it into the inputs under the reserved
    /// key. Fails fast if the caller already set that key rather than
    /// silently overwriting it.
    pub fn new(
        target: &str,
        inputs: BTreeMap<String, String>,
    ) -> Result<Self, CorrelatorError> {
        if inputs.contains_key(RESERVED_INPUT_KEY) {
            return Err(CorrelatorError::ReservedInputKey {
                key: RESERVED_INPUT_KEY.to_string(),
            });
        }
        let token = CorrelationToken::generate();
        let mut inputs = inputs;
        inputs.insert(RESERVED_INPUT_KEY.to_string(), token.to_string());
        Ok(Self {
            target: target.to_string(),
            inputs,
            token,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn inputs(&self) -> &BTreeMap<String, String> {
        &self.inputs
    }

    pub fn token(&self) -> &CorrelationToken {
        &self.token
    }
}

/// Polling cadence for resolving a dispatch to a run.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Backoff schedule reused for the poll cadence; the attempt caps do
    /// not apply here — only the caller's timeout bounds the loop.
    pub poll: RetryPolicy,
    /// Default resolution timeout when the caller passes none.
    pub default_timeout: Duration,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            poll: RetryPolicy::default(),
            default_timeout: Duration::from_secs(120),
        }
    }
}

/// Resolves fire-and-forget dispatches to concrete run handles.
pub struct DispatchCorrelator<G> {
    gateway: G,
    config: CorrelatorConfig,
    cancel: CancellationToken,
}

impl<G: RemoteExecutionGateway> DispatchCorrelator<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            config: CorrelatorConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: CorrelatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Trigger the workflow and resolve the resulting run.
    ///
    /// Returns `CorrelatorError::Timeout` when no matching run appears
    /// within `timeout` — never an unrelated run. If several runs match
    /// the token (defensive; the delimiter design should prevent it),
    /// the most recently created one wins.
    pub async fn trigger_and_resolve(
        &self,
        target: &str,
        inputs: BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<RunHandle, CorrelatorError> {
        let request = DispatchRequest::new(target, inputs)?;
        tracing::debug!(workflow = target, token = %request.token(), "dispatching workflow");
        self.gateway
            .dispatch(request.target(), request.inputs())
            .await?;
        self.resolve(&request, timeout).await
    }

    /// Trigger with the config's default timeout.
    pub async fn trigger_and_resolve_default(
        &self,
        target: &str,
        inputs: BTreeMap<String, String>,
    ) -> Result<RunHandle, CorrelatorError> {
        self.trigger_and_resolve(target, inputs, self.config.default_timeout)
            .await
    }

    async fn resolve(
        &self,
        request: &DispatchRequest,
        timeout: Duration,
    ) -> Result<RunHandle, CorrelatorError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut poll = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(CorrelatorError::Cancelled);
            }

            let runs = self
                .gateway
                .list_recent_runs(request.target(), None)
                .await?;

            if let Some(run) = Self::best_match(&runs, request.token()) {
                tracing::debug!(
                    token = %request.token(),
                    run_id = run.id,
                    polls = poll + 1,
                    "dispatch resolved to run"
                );
                return Ok(run.clone());
            }

            poll += 1;
            let delay = self.poll_delay(poll);
            if tokio::time::Instant::now() + delay > deadline {
                tracing::warn!(token = %request.token(), polls = poll, "no matching run before timeout");
                return Err(CorrelatorError::Timeout {
                    token: request.token().clone(),
                    budget_secs: timeout.as_secs(),
                });
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(CorrelatorError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Most recently created run whose title carries the token.
    fn best_match<'a>(runs: &'a [RunHandle], token: &CorrelationToken) -> Option<&'a RunHandle> {
        runs.iter()
            .filter(|r| {
                r.display_title
                    .as_deref()
                    .is_some_and(|title| title_matches(title, token))
            })
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
    }

    /// Same fast-then-slow cadence as the retry schedule, without the
    /// attempt cap — the deadline bounds the loop instead.
    fn poll_delay(&self, poll: u32) -> Duration {
        if poll <= self.config.poll.fast_attempts {
            self.config.poll.fast_delay
        } else {
            self.config.poll.slow_delay
        }
    }
}
