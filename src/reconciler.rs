//! Reconciliation orchestration.
//!
//! One reconciliation pass evaluates current remote and local state for
//! a work item and emits a decision. The pass never mutates the item —
//! applying a decision is the caller's responsibility, which keeps the
//! engine side-effect-free and testable in isolation.
//!
//! The primary defect class this engine exists to prevent is silent
//! optimism: when remote state cannot be determined, the pass escalates
//! with the error kind instead of skipping the item or defaulting it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use crate::errors::GatewayError;
use crate::gateway::RemoteExecutionGateway;
use crate::inference::infer_status;
use crate::item::{Status, WorkItem};
use crate::run::RunConclusion;
use crate::selector::select_most_relevant;

/// Why a work item needs human or upstream attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalateReason {
    /// The most relevant run stopped without success.
    RunFailed {
        run_id: u64,
        conclusion: RunConclusion,
    },
    /// A gateway call failed permanently during evaluation.
    Gateway { message: String },
    /// The pass was cancelled before the item could be evaluated.
    Cancelled,
}

/// Output of one reconciliation pass over one work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    /// Nothing to do: remote work is active, the item is terminal, or
    /// an in-flight reference is being tracked outside this engine.
    NoAction,
    /// The most relevant run completed successfully but the item does
    /// not yet reflect `done`.
    ReadyToAdvance,
    /// No outstanding remote work exists for a pending item.
    DispatchNeeded,
    /// State could not be advanced without attention.
    Escalate { reason: EscalateReason },
}

/// Configuration for a reconciliation sweep.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Workflow whose runs realize roadmap items.
    pub target: String,
    /// Worker limit for one sweep; bounded to respect the remote
    /// platform's request-rate ceilings.
    pub max_parallel: usize,
}

impl SweepConfig {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            max_parallel: 4,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }
}

/// Top-level control loop: evaluates work items against remote run state
/// and emits [`Decision`]s.
pub struct ReconciliationOrchestrator<G> {
    gateway: Arc<G>,
    config: SweepConfig,
    cancel: CancellationToken,
}

impl<G: RemoteExecutionGateway + 'static> ReconciliationOrchestrator<G> {
    pub fn new(gateway: Arc<G>, config: SweepConfig) -> Self {
        Self {
            gateway,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Evaluate one work item. Does not mutate it.
    pub async fn reconcile(&self, item: &WorkItem) -> Decision {
        Self::evaluate(&self.gateway, &self.config, &self.cancel, item).await
    }

    /// One bounded-concurrency pass over a slice of items.
    ///
    /// Each item is evaluated exactly once, by exactly one task; results
    /// come back in input order. There is no cross-item ordering
    /// guarantee during evaluation and none is needed — items are
    /// independent.
    pub async fn sweep(&self, items: &[WorkItem]) -> Vec<(String, Decision)> {
        if items.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel));
        let (result_tx, mut result_rx) = mpsc::channel::<(usize, String, Decision)>(items.len());

        for (index, item) in items.iter().enumerate() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let gateway = self.gateway.clone();
            let config = self.config.clone();
            let cancel = self.cancel.clone();
            let item = item.clone();
            let result_tx = result_tx.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let decision = Self::evaluate(&gateway, &config, &cancel, &item).await;
                result_tx.send((index, item.id, decision)).await.ok();
            });
        }
        drop(result_tx);

        let mut results = Vec::with_capacity(items.len());
        while let Some(entry) = result_rx.recv().await {
            results.push(entry);
        }
        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, id, decision)| (id, decision))
            .collect()
    }

    async fn evaluate(
        gateway: &G,
        config: &SweepConfig,
        cancel: &CancellationToken,
        item: &WorkItem,
    ) -> Decision {
        if cancel.is_cancelled() {
            return Decision::Escalate {
                reason: EscalateReason::Cancelled,
            };
        }

        let status = infer_status(item);
        match status {
            // Terminal with respect to this engine; human or upstream
            // action is required to unblock.
            Status::Done | Status::Blocked | Status::Skipped => return Decision::NoAction,
            Status::Pending | Status::InProgress => {}
        }

        let runs = match gateway
            .list_recent_runs(&config.target, item.branch.as_deref())
            .await
        {
            Ok(runs) => runs,
            Err(GatewayError::Cancelled) => {
                return Decision::Escalate {
                    reason: EscalateReason::Cancelled,
                };
            }
            Err(err) => {
                tracing::warn!(item = %item.id, error = %err, "gateway error during reconciliation");
                return Decision::Escalate {
                    reason: EscalateReason::Gateway {
                        message: err.to_string(),
                    },
                };
            }
        };

        let Some(run) = select_most_relevant(&runs) else {
            // An inferred in_progress means an open reference is being
            // tracked outside this engine; only a truly idle pending
            // item asks for a dispatch.
            return match status {
                Status::Pending => Decision::DispatchNeeded,
                _ => Decision::NoAction,
            };
        };

        if run.is_active() {
            return Decision::NoAction;
        }
        if run.succeeded() {
            // Inference already returned non-done above, so the item does
            // not yet reflect the completed run.
            return Decision::ReadyToAdvance;
        }
        if run.failed() {
            return Decision::Escalate {
                reason: EscalateReason::RunFailed {
                    run_id: run.id,
                    conclusion: RunConclusion::Failure,
                },
            };
        }

        // Completed without success or failure (cancelled, unknown, or a
        // missing conclusion): no effective outcome remains outstanding.
        match status {
            Status::Pending => Decision::DispatchNeeded,
            _ => Decision::Escalate {
                reason: EscalateReason::RunFailed {
                    run_id: run.id,
                    conclusion: run.conclusion.unwrap_or(RunConclusion::Unknown),
                },
            },
        }
    }
}
