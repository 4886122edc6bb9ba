// SPDX-License-Identifier: MIT
//! The seam between the resolution engine and the remote workspace API.
//!
//! Everything upstream of this trait is injectable: production code uses
//! [`HttpTaskGateway`], tests substitute recording mocks.

mod http;

pub use http::HttpTaskGateway;

use async_trait::async_trait;

use crate::model::{EntityRef, TaskRecord, TaskSummary};

/// Filters forwarded to the workspace-wide task listing endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkspaceTaskFilters {
    /// Include tasks in closed statuses.
    pub include_closed: bool,
    /// Include tasks from archived lists.
    pub include_archived_lists: bool,
}

/// Errors surfaced by gateway implementations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("remote API returned {status} during {operation}: {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },
    #[error("transport failure during {operation}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
}

impl GatewayError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Remote operations the resolution engine consumes.
///
/// Implementations own per-call timeouts; the engine layers no timeout or
/// cancellation of its own on top.
#[async_trait]
pub trait RemoteTaskGateway: Send + Sync {
    /// Fetch one task by canonical id.
    async fn get_task(&self, task_id: &str) -> Result<TaskRecord, GatewayError>;

    /// Fetch one task by user-defined custom id (e.g. `DEV-1234`).
    ///
    /// When `list_id` is given the lookup is scoped: a task found under a
    /// different list is reported as not found.
    async fn get_task_by_custom_id(
        &self,
        custom_id: &str,
        list_id: Option<&str>,
    ) -> Result<TaskRecord, GatewayError>;

    /// Fetch the full task set of one list.
    async fn get_tasks_in_list(&self, list_id: &str) -> Result<Vec<TaskRecord>, GatewayError>;

    /// Fetch lightweight task summaries workspace-wide, walking upstream
    /// pagination to completion.
    async fn get_workspace_tasks(
        &self,
        filters: &WorkspaceTaskFilters,
    ) -> Result<Vec<TaskSummary>, GatewayError>;

    /// Fetch one list's metadata (used for existence validation and scope
    /// resolution).
    async fn get_list(&self, list_id: &str) -> Result<EntityRef, GatewayError>;

    /// List all spaces in the workspace.
    async fn get_spaces(&self) -> Result<Vec<EntityRef>, GatewayError>;

    /// List the folders of one space.
    async fn get_folders(&self, space_id: &str) -> Result<Vec<EntityRef>, GatewayError>;

    /// List the lists of one folder.
    async fn get_folder_lists(&self, folder_id: &str) -> Result<Vec<EntityRef>, GatewayError>;

    /// List the folderless lists of one space.
    async fn get_folderless_lists(&self, space_id: &str) -> Result<Vec<EntityRef>, GatewayError>;
}
