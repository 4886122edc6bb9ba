// SPDX-License-Identifier: MIT
//! Data types shared across the resolution engine.
//!
//! The task and hierarchy types mirror the remote API's JSON shapes
//! (snake_case fields, timestamps as unix-millisecond strings). Unknown
//! fields are ignored on deserialization so the engine tolerates API
//! additions.

use serde::{Deserialize, Serialize};

// ─── Task entities ────────────────────────────────────────────────────────────

/// A reference to a named container (list, folder, or space) as embedded in
/// task payloads. `name` is absent in some payloads and filled in during
/// context enrichment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }
}

/// Task status as the remote API reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A workspace member assigned to a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignee {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// The canonical task entity. Owned by the remote system — the engine only
/// reads records and enriches copies with container names when asked for
/// context.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<Assignee>,
    /// Unix milliseconds as a string, e.g. `"1712345678901"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    /// Unix milliseconds as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<String>,
}

impl TaskRecord {
    /// Last-updated time in unix milliseconds.
    ///
    /// Malformed or missing values order last (`i64::MIN`) rather than
    /// failing the resolve that needs the ordering.
    pub fn updated_at_millis(&self) -> i64 {
        parse_millis(self.date_updated.as_deref())
    }

    /// Whether this record carries the full detail set, as opposed to the
    /// thin shape produced from a workspace-wide summary.
    pub fn has_full_details(&self) -> bool {
        self.date_created.is_some() || self.url.is_some()
    }
}

/// Lightweight task shape returned by the workspace-wide listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<String>,
}

impl TaskSummary {
    pub fn updated_at_millis(&self) -> i64 {
        parse_millis(self.date_updated.as_deref())
    }
}

fn parse_millis(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.parse::<i64>().ok()).unwrap_or(i64::MIN)
}

// ─── Workspace hierarchy ──────────────────────────────────────────────────────

/// Node kind within the workspace hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Space,
    Folder,
    List,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Space => write!(f, "space"),
            NodeKind::Folder => write!(f, "folder"),
            NodeKind::List => write!(f, "list"),
        }
    }
}

/// One node in the space → folder → list tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceNode {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<WorkspaceNode>,
}

/// The full hierarchy for one workspace, rooted at a synthetic node.
///
/// Built once by the indexer and replaced wholesale on refresh — never
/// patched in place, so readers holding an `Arc` never observe a
/// partially-rebuilt tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceTree {
    pub root_id: String,
    pub root_name: String,
    pub children: Vec<WorkspaceNode>,
}

/// Where a list sits in the hierarchy. Derived from a [`WorkspaceTree`] and
/// rebuilt per global search (cheap relative to the remote calls that build
/// the tree itself).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListContext {
    pub list_id: String,
    pub list_name: String,
    pub space_id: String,
    pub space_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
}

impl ListContext {
    /// Human-readable breadcrumb, e.g. `"Engineering > Sprints > Sprint 12"`.
    pub fn breadcrumb(&self) -> String {
        match &self.folder_name {
            Some(folder) => format!("{} > {} > {}", self.space_name, folder, self.list_name),
            None => format!("{} > {}", self.space_name, self.list_name),
        }
    }
}

// ─── Matching ─────────────────────────────────────────────────────────────────

/// Outcome of scoring a candidate task name against a query. A value type —
/// computed, consumed, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub is_match: bool,
    pub exact_match: bool,
    /// 0–100; the fixed tier constants live in [`crate::matcher`].
    pub score: u8,
    pub reason: &'static str,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self {
            is_match: false,
            exact_match: false,
            score: 0,
            reason: "no match",
        }
    }
}
