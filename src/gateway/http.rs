// SPDX-License-Identifier: MIT
//! reqwest-backed [`RemoteTaskGateway`] for the remote workspace REST API.
//!
//! One client per configured workspace/credential pair. Every call carries
//! the API token in the `Authorization` header and a per-call timeout from
//! the client builder; 404s are mapped to [`GatewayError::NotFound`] so the
//! resolver can distinguish "no such task" from transport trouble.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{GatewayError, RemoteTaskGateway, WorkspaceTaskFilters};
use crate::model::{EntityRef, TaskRecord, TaskSummary};

/// Upstream page size for the workspace-wide task listing; a short page
/// means the last page has been reached.
const WORKSPACE_PAGE_SIZE: usize = 100;

/// Hard cap on pagination so a misbehaving endpoint cannot loop forever.
const MAX_WORKSPACE_PAGES: usize = 50;

pub struct HttpTaskGateway {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    team_id: String,
}

// ─── Response envelopes ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TasksEnvelope {
    tasks: Vec<TaskRecord>,
}

#[derive(Deserialize)]
struct SummariesEnvelope {
    tasks: Vec<TaskSummary>,
    #[serde(default)]
    last_page: Option<bool>,
}

#[derive(Deserialize)]
struct SpacesEnvelope {
    spaces: Vec<EntityRef>,
}

#[derive(Deserialize)]
struct FoldersEnvelope {
    folders: Vec<EntityRef>,
}

#[derive(Deserialize)]
struct ListsEnvelope {
    lists: Vec<EntityRef>,
}

impl HttpTaskGateway {
    /// Build a gateway for one workspace.
    ///
    /// `base_url` should not end with a slash, e.g.
    /// `https://api.clickup.com/api/v2`.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        team_id: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| GatewayError::Transport {
                operation: "build http client".to_string(),
                source,
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            team_id: team_id.into(),
        })
    }

    /// GET `url`, decode the JSON body as `T`.
    ///
    /// `operation` and `resource` feed the error taxonomy: 404 becomes
    /// `NotFound { resource }`, other non-2xx become `Api`, and network
    /// errors become `Transport`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        operation: &str,
        resource: &str,
    ) -> Result<T, GatewayError> {
        debug!(%url, operation, "remote GET");
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, &self.api_token)
            .query(query)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                operation: operation.to_string(),
                source,
            })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::not_found(resource));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                operation: operation.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|source| GatewayError::Transport {
                operation: operation.to_string(),
                source,
            })
    }
}

#[async_trait::async_trait]
impl RemoteTaskGateway for HttpTaskGateway {
    async fn get_task(&self, task_id: &str) -> Result<TaskRecord, GatewayError> {
        let url = format!("{}/task/{}", self.base_url, task_id);
        self.get_json(&url, &[], "get task", &format!("task {task_id}"))
            .await
    }

    async fn get_task_by_custom_id(
        &self,
        custom_id: &str,
        list_id: Option<&str>,
    ) -> Result<TaskRecord, GatewayError> {
        let url = format!("{}/task/{}", self.base_url, custom_id);
        let query = [
            ("custom_task_ids", "true".to_string()),
            ("team_id", self.team_id.clone()),
        ];
        let task: TaskRecord = self
            .get_json(
                &url,
                &query,
                "get task by custom id",
                &format!("task {custom_id}"),
            )
            .await?;

        // The remote API resolves custom ids workspace-wide; the list scope
        // is enforced here so a scoped lookup never leaks a match from a
        // different list.
        if let Some(scope) = list_id {
            let in_scope = task.list.as_ref().is_some_and(|l| l.id == scope);
            if !in_scope {
                return Err(GatewayError::not_found(format!(
                    "task {custom_id} in list {scope}"
                )));
            }
        }
        Ok(task)
    }

    async fn get_tasks_in_list(&self, list_id: &str) -> Result<Vec<TaskRecord>, GatewayError> {
        let url = format!("{}/list/{}/task", self.base_url, list_id);
        let query = [("subtasks", "true".to_string())];
        let envelope: TasksEnvelope = self
            .get_json(&url, &query, "list tasks", &format!("list {list_id}"))
            .await?;
        Ok(envelope.tasks)
    }

    async fn get_workspace_tasks(
        &self,
        filters: &WorkspaceTaskFilters,
    ) -> Result<Vec<TaskSummary>, GatewayError> {
        let url = format!("{}/team/{}/task", self.base_url, self.team_id);
        let mut all = Vec::new();

        for page in 0..MAX_WORKSPACE_PAGES {
            let mut query = vec![
                ("page", page.to_string()),
                ("subtasks", "true".to_string()),
            ];
            if filters.include_closed {
                query.push(("include_closed", "true".to_string()));
            }
            if filters.include_archived_lists {
                query.push(("archived", "true".to_string()));
            }

            let envelope: SummariesEnvelope = self
                .get_json(&url, &query, "list workspace tasks", "workspace task set")
                .await?;

            let count = envelope.tasks.len();
            all.extend(envelope.tasks);

            let last = envelope.last_page.unwrap_or(count < WORKSPACE_PAGE_SIZE);
            if last {
                return Ok(all);
            }
        }

        warn!(
            pages = MAX_WORKSPACE_PAGES,
            total = all.len(),
            "workspace task pagination cap reached — result may be truncated"
        );
        Ok(all)
    }

    async fn get_list(&self, list_id: &str) -> Result<EntityRef, GatewayError> {
        let url = format!("{}/list/{}", self.base_url, list_id);
        self.get_json(&url, &[], "get list", &format!("list {list_id}"))
            .await
    }

    async fn get_spaces(&self) -> Result<Vec<EntityRef>, GatewayError> {
        let url = format!("{}/team/{}/space", self.base_url, self.team_id);
        let envelope: SpacesEnvelope = self
            .get_json(&url, &[], "list spaces", "workspace spaces")
            .await?;
        Ok(envelope.spaces)
    }

    async fn get_folders(&self, space_id: &str) -> Result<Vec<EntityRef>, GatewayError> {
        let url = format!("{}/space/{}/folder", self.base_url, space_id);
        let envelope: FoldersEnvelope = self
            .get_json(&url, &[], "list folders", &format!("space {space_id}"))
            .await?;
        Ok(envelope.folders)
    }

    async fn get_folder_lists(&self, folder_id: &str) -> Result<Vec<EntityRef>, GatewayError> {
        let url = format!("{}/folder/{}/list", self.base_url, folder_id);
        let envelope: ListsEnvelope = self
            .get_json(&url, &[], "list folder lists", &format!("folder {folder_id}"))
            .await?;
        Ok(envelope.lists)
    }

    async fn get_folderless_lists(&self, space_id: &str) -> Result<Vec<EntityRef>, GatewayError> {
        let url = format!("{}/space/{}/list", self.base_url, space_id);
        let envelope: ListsEnvelope = self
            .get_json(&url, &[], "list folderless lists", &format!("space {space_id}"))
            .await?;
        Ok(envelope.lists)
    }
}
