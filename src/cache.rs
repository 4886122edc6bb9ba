// SPDX-License-Identifier: MIT
//! TTL-bounded validation caches.
//!
//! Three independent stores shared by the resolver: task records by id,
//! list existence (positive *and* negative outcomes), and name → task-id
//! mappings optionally scoped to a list. Entries are trusted for
//! `ttl` (default 5 minutes) and overwritten on every revalidation.
//!
//! The stores are plain maps behind `tokio::sync::Mutex` — the engine is
//! cooperatively scheduled, the locks only guard against interleaved
//! suspension points, never parallel contention.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::gateway::{GatewayError, RemoteTaskGateway};
use crate::model::TaskRecord;

/// How many uncached ids are fetched concurrently per sub-batch during bulk
/// validation. Bounded to stay under remote rate limits.
pub const BULK_VALIDATION_BATCH_SIZE: usize = 5;

/// Default trust window for validated entries.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// One validated value plus the instant it was validated.
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    validated_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            validated_at: Utc::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.validated_at < ttl
    }
}

/// A name → task-id mapping, optionally bound to the list it was resolved
/// within.
#[derive(Debug, Clone)]
struct NameEntry {
    list_id: Option<String>,
    task_id: String,
    validated_at: DateTime<Utc>,
}

pub struct ValidationCache {
    ttl: Duration,
    tasks: Mutex<HashMap<String, CacheEntry<TaskRecord>>>,
    /// `true` = list confirmed to exist, `false` = confirmed missing.
    lists: Mutex<HashMap<String, CacheEntry<bool>>>,
    names: Mutex<HashMap<String, Vec<NameEntry>>>,
}

impl ValidationCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs as i64),
            tasks: Mutex::new(HashMap::new()),
            lists: Mutex::new(HashMap::new()),
            names: Mutex::new(HashMap::new()),
        }
    }

    // ─── Task-by-id store ─────────────────────────────────────────────────────

    /// Return the cached record for `task_id`, or fetch and cache it.
    pub async fn get_or_validate_task(
        &self,
        gateway: &dyn RemoteTaskGateway,
        task_id: &str,
    ) -> Result<TaskRecord, GatewayError> {
        let now = Utc::now();
        {
            let tasks = self.tasks.lock().await;
            if let Some(entry) = tasks.get(task_id) {
                if entry.is_fresh(self.ttl, now) {
                    debug!(task_id, "task cache hit");
                    return Ok(entry.value.clone());
                }
            }
        }

        let record = gateway.get_task(task_id).await?;
        self.put_task(record.clone()).await;
        Ok(record)
    }

    /// Validate many ids, partitioning into cached vs. uncached and fetching
    /// the uncached set in sub-batches of [`BULK_VALIDATION_BATCH_SIZE`]
    /// concurrent calls, each sub-batch awaited fully before the next.
    ///
    /// Ids that fail to validate are logged and omitted from the result.
    pub async fn get_or_validate_tasks_bulk(
        &self,
        gateway: &dyn RemoteTaskGateway,
        ids: &[String],
    ) -> HashMap<String, TaskRecord> {
        let now = Utc::now();
        let mut resolved = HashMap::new();
        let mut uncached = Vec::new();

        {
            let tasks = self.tasks.lock().await;
            for id in ids {
                match tasks.get(id) {
                    Some(entry) if entry.is_fresh(self.ttl, now) => {
                        resolved.insert(id.clone(), entry.value.clone());
                    }
                    _ => uncached.push(id.clone()),
                }
            }
        }

        for batch in uncached.chunks(BULK_VALIDATION_BATCH_SIZE) {
            let fetches = batch.iter().map(|id| gateway.get_task(id));
            for (id, result) in batch.iter().zip(join_all(fetches).await) {
                match result {
                    Ok(record) => {
                        self.put_task(record.clone()).await;
                        resolved.insert(id.clone(), record);
                    }
                    Err(e) => warn!(task_id = %id, err = %e, "bulk validation skipped task"),
                }
            }
        }

        resolved
    }

    /// Record a freshly fetched task (also used by the resolver after any
    /// successful full-detail fetch).
    pub async fn put_task(&self, record: TaskRecord) {
        let mut tasks = self.tasks.lock().await;
        tasks.insert(record.id.clone(), CacheEntry::new(record));
    }

    /// Drop one task entry, e.g. after a move/delete performed elsewhere.
    pub async fn invalidate_task(&self, task_id: &str) {
        self.tasks.lock().await.remove(task_id);
    }

    // ─── List-validity store ──────────────────────────────────────────────────

    /// Confirm `list_id` exists, caching the outcome either way so a
    /// repeatedly-queried missing list does not re-hit the remote endpoint
    /// within the TTL window.
    pub async fn validate_list_exists(
        &self,
        gateway: &dyn RemoteTaskGateway,
        list_id: &str,
    ) -> Result<(), GatewayError> {
        let now = Utc::now();
        {
            let lists = self.lists.lock().await;
            if let Some(entry) = lists.get(list_id) {
                if entry.is_fresh(self.ttl, now) {
                    debug!(list_id, exists = entry.value, "list validity cache hit");
                    return if entry.value {
                        Ok(())
                    } else {
                        Err(GatewayError::not_found(format!("list {list_id}")))
                    };
                }
            }
        }

        match gateway.get_list(list_id).await {
            Ok(_) => {
                let mut lists = self.lists.lock().await;
                lists.insert(list_id.to_string(), CacheEntry::new(true));
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                let mut lists = self.lists.lock().await;
                lists.insert(list_id.to_string(), CacheEntry::new(false));
                Err(e)
            }
            // Transport/API trouble is not a verdict on existence — nothing
            // is cached.
            Err(e) => Err(e),
        }
    }

    // ─── Name → id store ──────────────────────────────────────────────────────

    /// Look up a cached task id for `name`.
    ///
    /// A lookup without a list scope matches any fresh entry for the name; a
    /// scoped lookup matches only entries recorded under the same list or
    /// recorded globally.
    pub async fn cached_task_id(&self, name: &str, list_id: Option<&str>) -> Option<String> {
        let now = Utc::now();
        let names = self.names.lock().await;
        let entries = names.get(name.trim())?;
        entries
            .iter()
            .filter(|e| now - e.validated_at < self.ttl)
            .find(|e| match (list_id, &e.list_id) {
                (None, _) => true,
                (Some(_), None) => true,
                (Some(scope), Some(recorded)) => recorded == scope,
            })
            .map(|e| e.task_id.clone())
    }

    /// Record a resolved name → id mapping, replacing any previous entry
    /// with the same scope.
    pub async fn store_task_id(&self, name: &str, task_id: &str, list_id: Option<&str>) {
        let mut names = self.names.lock().await;
        let entries = names.entry(name.trim().to_string()).or_default();
        entries.retain(|e| e.list_id.as_deref() != list_id);
        entries.push(NameEntry {
            list_id: list_id.map(str::to_string),
            task_id: task_id.to_string(),
            validated_at: Utc::now(),
        });
    }
}
