//! Remote run models.
//!
//! Serde models for the remote platform's run summaries. Status and
//! conclusion are closed enums validated at parse time: an unknown value
//! is a deserialization error, never a free-form string carried forward.
//!
//! Field availability varies by query path. A batch query may omit the
//! display title or branch entirely; those fields are `Option` so that
//! "not available for this record" stays distinct from "known empty".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a remote run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
}

/// Outcome of a completed run. Meaningful only when status is `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    Unknown,
}

/// One execution instance of a remote workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHandle {
    pub id: u64,
    /// Human-readable title; carries the correlation token when the run
    /// was produced by a tether dispatch. Omitted by some query paths.
    #[serde(default)]
    pub display_title: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<RunConclusion>,
    #[serde(default, rename = "head_branch")]
    pub branch: Option<String>,
    #[serde(default)]
    pub head_sha: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RunHandle {
    /// Whether the run is still queued or executing.
    pub fn is_active(&self) -> bool {
        matches!(self.status, RunStatus::Queued | RunStatus::InProgress)
    }

    /// Whether the run completed with a failure conclusion.
    pub fn failed(&self) -> bool {
        self.status == RunStatus::Completed && self.conclusion == Some(RunConclusion::Failure)
    }

    /// Whether the run completed with a success conclusion.
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Completed && self.conclusion == Some(RunConclusion::Success)
    }
}

/// Envelope returned by the run-listing endpoint.
#[derive(Debug, Deserialize)]
pub struct RunListResponse {
    pub workflow_runs: Vec<RunHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn run_at(id: u64, secs: i64, status: RunStatus) -> RunHandle {
        RunHandle {
            id,
            display_title: Some(format!("run-{id}")),
            status,
            conclusion: None,
            branch: None,
            head_sha: None,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn run_status_deserializes_snake_case() {
        let status: RunStatus = serde_json::from_str(r#""in_progress""#).unwrap();
        assert_eq!(status, RunStatus::InProgress);
    }

    #[test]
    fn unknown_status_is_rejected_at_parse_time() {
        let result: Result<RunStatus, _> = serde_json::from_str(r#""waiting""#);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_conclusion_is_rejected_at_parse_time() {
        let result: Result<RunConclusion, _> = serde_json::from_str(r#""timed_out""#);
        assert!(result.is_err());
    }

    #[test]
    fn run_handle_deserializes_full_record() {
        let json = r#"{
            "id": 9001,
            "display_title": "feature-x:ab12cd",
            "status": "completed",
            "conclusion": "success",
            "head_branch": "feature-x",
            "head_sha": "abc123",
            "created_at": "2026-08-30T12:00:00Z"
        }"#;
        let run: RunHandle = serde_json::from_str(json).unwrap();
        assert_eq!(run.id, 9001);
        assert_eq!(run.display_title.as_deref(), Some("feature-x:ab12cd"));
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.conclusion, Some(RunConclusion::Success));
        assert_eq!(run.branch.as_deref(), Some("feature-x"));
    }

    #[test]
    fn omitted_fields_deserialize_to_none_not_empty() {
        // A batch query path omits title and branch entirely.
        let json = r#"{
            "id": 7,
            "status": "queued",
            "created_at": "2026-08-30T12:00:00Z"
        }"#;
        let run: RunHandle = serde_json::from_str(json).unwrap();
        assert!(run.display_title.is_none());
        assert!(run.branch.is_none());
        assert!(run.head_sha.is_none());
        assert!(run.conclusion.is_none());
    }

    #[test]
    fn known_empty_title_stays_some() {
        let json = r#"{
            "id": 7,
            "display_title": "",
            "status": "queued",
            "created_at": "2026-08-30T12:00:00Z"
        }"#;
        let run: RunHandle = serde_json::from_str(json).unwrap();
        assert_eq!(run.display_title.as_deref(), Some(""));
    }

    #[test]
    fn queued_and_in_progress_are_active() {
        assert!(run_at(1, 0, RunStatus::Queued).is_active());
        assert!(run_at(2, 0, RunStatus::InProgress).is_active());
        assert!(!run_at(3, 0, RunStatus::Completed).is_active());
    }

    #[test]
    fn failed_requires_completed_status() {
        let mut run = run_at(1, 0, RunStatus::InProgress);
        run.conclusion = Some(RunConclusion::Failure);
        assert!(!run.failed());
        run.status = RunStatus::Completed;
        assert!(run.failed());
    }

    #[test]
    fn run_list_response_unwraps_envelope() {
        let json = r#"{"workflow_runs": [
            {"id": 1, "status": "queued", "created_at": "2026-08-30T12:00:00Z"}
        ]}"#;
        let resp: RunListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.workflow_runs.len(), 1);
        assert_eq!(resp.workflow_runs[0].id, 1);
    }
}
