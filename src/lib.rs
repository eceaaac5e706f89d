//! tether — dispatch correlation and reconciliation for fire-and-forget
//! CI triggers.
//!
//! The remote platform's dispatch endpoint returns no run identifier, so
//! this crate embeds a correlation token in each dispatch, polls the run
//! list to recover the resulting run, picks the most relevant run when
//! several exist, infers authoritative status for roadmap items, and
//! emits one reconciliation decision per item. It is a library invoked by
//! orchestration code, not a standalone executable.

pub mod correlator;
pub mod errors;
pub mod gateway;
pub mod inference;
pub mod item;
pub mod reconciler;
pub mod retry;
pub mod run;
pub mod selector;
pub mod token;

pub use correlator::{CorrelatorConfig, DispatchCorrelator, DispatchRequest};
pub use errors::{CorrelatorError, GatewayError, ValidationError};
pub use gateway::{CommitState, GitHubGateway, GitHubGatewayConfig, RemoteExecutionGateway};
pub use inference::infer_status;
pub use item::{RefState, Roadmap, SecondaryRef, Status, WorkItem};
pub use reconciler::{Decision, EscalateReason, ReconciliationOrchestrator, SweepConfig};
pub use retry::RetryPolicy;
pub use run::{RunConclusion, RunHandle, RunStatus};
pub use selector::select_most_relevant;
pub use token::{CorrelationToken, RESERVED_INPUT_KEY, title_matches};
