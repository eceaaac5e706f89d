//! Work items and roadmaps.
//!
//! A work item is a trackable unit of planned work (a roadmap step or a
//! plan) with a status independent of any specific run. Statuses and
//! secondary-reference states are closed enums: unknown strings are
//! rejected when a roadmap is parsed, never carried forward as free text.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Canonical work-item status.
///
/// `Pending` doubles as the absent-field default, which is why it is the
/// only value the inference engine may refine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    Done,
    InProgress,
    Blocked,
    Skipped,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Done => "done",
            Status::InProgress => "in_progress",
            Status::Blocked => "blocked",
            Status::Skipped => "skipped",
        }
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "done" => Ok(Status::Done),
            "in_progress" => Ok(Status::InProgress),
            "blocked" => Ok(Status::Blocked),
            "skipped" => Ok(Status::Skipped),
            other => Err(ValidationError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// Machine-readable state of a secondary reference.
///
/// `Closed` is closed-but-unmerged and never infers completion; only
/// `Merged` does. Freeform-text readings are deliberately unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefState {
    Merged,
    Open,
    Closed,
    Unknown,
}

/// A weak signal attached to a work item: a linked PR, plan, or run
/// record that can stand in for a stale or absent explicit status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryRef {
    /// Human-readable label (e.g., "PR #142").
    pub label: String,
    pub state: RefState,
}

impl SecondaryRef {
    pub fn new(label: &str, state: RefState) -> Self {
        Self {
            label: label.to_string(),
            state,
        }
    }
}

/// One unit of trackable work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Step id; the portion before the final separator is the phase id.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub refs: Vec<SecondaryRef>,
    /// Branch remote work for this item lands on, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl WorkItem {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            status: Status::default(),
            refs: Vec::new(),
            branch: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_ref(mut self, secondary: SecondaryRef) -> Self {
        self.refs.push(secondary);
        self
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    /// Phase identifier: the id up to its final `-` or `.` separator,
    /// or the whole id when no separator is present.
    pub fn phase_id(&self) -> &str {
        self.id
            .rfind(['-', '.'])
            .map_or(self.id.as_str(), |idx| &self.id[..idx])
    }
}

/// An ordered sequence of work items, partitioned into phases by id
/// prefix. Construction validates the ordering invariant: phase ids must
/// be monotonically non-decreasing. A violation is an error, never a
/// silent renumbering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<WorkItem>", into = "Vec<WorkItem>")]
pub struct Roadmap {
    items: Vec<WorkItem>,
}

impl Roadmap {
    pub fn new(items: Vec<WorkItem>) -> Result<Self, ValidationError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for item in &items {
            if !seen.insert(item.id.as_str()) {
                return Err(ValidationError::DuplicateItem {
                    id: item.id.clone(),
                });
            }
        }
        for pair in items.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.phase_id() < prev.phase_id() {
                return Err(ValidationError::PhaseOrder {
                    item: next.id.clone(),
                    phase: next.phase_id().to_string(),
                    previous: prev.phase_id().to_string(),
                });
            }
        }
        Ok(Self { items })
    }

    /// Load a roadmap from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read roadmap file: {}", path.display()))?;
        let roadmap: Roadmap = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse roadmap JSON: {}", path.display()))?;
        Ok(roadmap)
    }

    /// Save the roadmap to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize roadmap to JSON")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write roadmap file: {}", path.display()))?;
        Ok(())
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&WorkItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Contiguous phase groups in roadmap order.
    pub fn phases(&self) -> Vec<(&str, &[WorkItem])> {
        let mut groups = Vec::new();
        let mut start = 0;
        for i in 1..=self.items.len() {
            if i == self.items.len() || self.items[i].phase_id() != self.items[start].phase_id() {
                groups.push((self.items[start].phase_id(), &self.items[start..i]));
                start = i;
            }
        }
        groups
    }

    /// First item whose explicit status is pending, in roadmap order.
    pub fn next_pending(&self) -> Option<&WorkItem> {
        self.items.iter().find(|i| i.status == Status::Pending)
    }
}

impl TryFrom<Vec<WorkItem>> for Roadmap {
    type Error = ValidationError;

    fn try_from(items: Vec<WorkItem>) -> Result<Self, Self::Error> {
        Roadmap::new(items)
    }
}

impl From<Roadmap> for Vec<WorkItem> {
    fn from(roadmap: Roadmap) -> Self {
        roadmap.items
    }
}
