// SPDX-License-Identifier: MIT
//! The task resolution protocol.
//!
//! [`TaskResolver`] turns a loosely specified reference — canonical id,
//! custom id, or human-typed name optionally scoped to a list — into one or
//! more canonical task records. Resolution is attempted in strict priority
//! order (id → custom id → name in list → name workspace-wide); the first
//! applicable branch decides the outcome.
//!
//! The global name branch carries the disambiguation policy: candidates are
//! ordered by match score then recency, a unique confident match (score ≥
//! [`CONFIDENT_SCORE`]) wins outright over fresher weak matches, and
//! everything else is settled by fetching full details — sequentially, to
//! keep remote-call ordering predictable — before picking or refusing.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::cache::ValidationCache;
use crate::error::{CandidateInfo, ResolveError};
use crate::gateway::{RemoteTaskGateway, WorkspaceTaskFilters};
use crate::hierarchy::{self, HierarchyIndexer};
use crate::matcher::{is_name_match, quality_label, CONFIDENT_SCORE};
use crate::model::{EntityRef, ListContext, MatchResult, NodeKind, TaskRecord, TaskSummary};

/// Custom ids look like `DEV-1234`: a letter-led prefix, a hyphen, digits.
/// Canonical ids are hyphen-free alphanumerics, so the shapes are disjoint.
static CUSTOM_ID_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*-\d+$").expect("regex: custom id shape"));

/// Whether `id` has the user-defined custom-id shape rather than the
/// canonical one.
pub fn looks_like_custom_id(id: &str) -> bool {
    CUSTOM_ID_SHAPE.is_match(id)
}

// ─── Public request/response types ────────────────────────────────────────────

/// A loosely specified task reference. At least one of `id`, `custom_id`,
/// or `name` must be present; `list_id`/`list_name` narrow name and
/// custom-id lookups.
#[derive(Debug, Clone, Default)]
pub struct TaskRef {
    pub id: Option<String>,
    pub custom_id: Option<String>,
    pub name: Option<String>,
    pub list_id: Option<String>,
    pub list_name: Option<String>,
}

impl TaskRef {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Knobs governing resolution behavior. The defaults match the common
/// agent path: one confident answer, full detail, no hand-holding context.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Return every match (sorted) instead of failing on ambiguity.
    pub allow_multiple_matches: bool,
    /// Let score + recency pick a single winner among several matches.
    pub smart_disambiguation: bool,
    /// Refresh thin summary data to full task records before returning.
    pub full_details: bool,
    /// Enrich returned records with list/folder/space names from the
    /// workspace hierarchy.
    pub include_context: bool,
    /// Only accept exact-tier matches (score ≥ 80).
    pub exact_only: bool,
    /// Forwarded to the workspace-wide listing: include closed tasks.
    pub include_closed: bool,
    /// Forwarded to the workspace-wide listing: include archived lists.
    pub include_archived_lists: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            allow_multiple_matches: false,
            smart_disambiguation: true,
            full_details: true,
            include_context: false,
            exact_only: false,
            include_closed: false,
            include_archived_lists: false,
        }
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub enum Resolution {
    Single(TaskRecord),
    /// Every match, best first. Only produced under `allow_multiple_matches`.
    Multiple(Vec<TaskRecord>),
}

impl Resolution {
    /// The best task of the resolution (first of a multiple set).
    pub fn best(&self) -> Option<&TaskRecord> {
        match self {
            Resolution::Single(task) => Some(task),
            Resolution::Multiple(tasks) => tasks.first(),
        }
    }
}

// ─── Resolver ─────────────────────────────────────────────────────────────────

/// A name-query candidate flowing through the global disambiguation path.
struct Candidate {
    summary: TaskSummary,
    matched: MatchResult,
    context: Option<ListContext>,
}

pub struct TaskResolver {
    gateway: Arc<dyn RemoteTaskGateway>,
    hierarchy: HierarchyIndexer,
    cache: ValidationCache,
}

impl TaskResolver {
    /// Build a resolver around an injected gateway and an explicitly owned
    /// cache. One resolver per workspace/credential pair — the caches must
    /// not be shared across workspace connections.
    pub fn new(gateway: Arc<dyn RemoteTaskGateway>, cache: ValidationCache) -> Self {
        let hierarchy = HierarchyIndexer::new(gateway.clone());
        Self {
            gateway,
            hierarchy,
            cache,
        }
    }

    /// The hierarchy indexer, for callers that need structural queries
    /// (`get_tree`, name lookups) directly.
    pub fn hierarchy(&self) -> &HierarchyIndexer {
        &self.hierarchy
    }

    /// Drop the cached record for `task_id`. Call after a mutation (move,
    /// duplicate target, delete) performed outside the resolver.
    pub async fn invalidate_task(&self, task_id: &str) {
        self.cache.invalidate_task(task_id).await;
    }

    /// Drop the cached workspace tree. Call after structural mutations to
    /// lists or folders.
    pub async fn invalidate_hierarchy(&self) {
        self.hierarchy.invalidate().await;
    }

    /// Resolve a task reference.
    ///
    /// Branch priority: direct id, explicit custom id, name within a list
    /// scope, name workspace-wide. See the module docs for the
    /// disambiguation policy of the last branch.
    pub async fn resolve(
        &self,
        task_ref: &TaskRef,
        opts: &ResolveOptions,
    ) -> Result<Resolution, ResolveError> {
        if let Some(id) = task_ref.id.as_deref() {
            return self.resolve_by_id(id, task_ref).await.map(Resolution::Single);
        }
        if let Some(custom_id) = task_ref.custom_id.as_deref() {
            return self
                .resolve_by_custom_id(custom_id, task_ref)
                .await
                .map(Resolution::Single);
        }
        if let Some(name) = task_ref.name.as_deref() {
            if task_ref.list_id.is_some() || task_ref.list_name.is_some() {
                return self.resolve_in_list(name, task_ref, opts).await;
            }
            return self.resolve_global(name, opts).await;
        }
        Err(ResolveError::InvalidReference)
    }

    // ─── Branch 1: direct id ──────────────────────────────────────────────────

    async fn resolve_by_id(
        &self,
        id: &str,
        task_ref: &TaskRef,
    ) -> Result<TaskRecord, ResolveError> {
        if looks_like_custom_id(id) {
            match self.resolve_by_custom_id(id, task_ref).await {
                Ok(task) => return Ok(task),
                Err(e) => {
                    debug!(id, err = %e, "custom-id interpretation failed — retrying as canonical id");
                }
            }
        }

        self.cache
            .get_or_validate_task(self.gateway.as_ref(), id)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => ResolveError::NotFound(format!("task {id} not found")),
                e => ResolveError::upstream("get task", e),
            })
    }

    // ─── Branch 2: explicit custom id ─────────────────────────────────────────

    async fn resolve_by_custom_id(
        &self,
        custom_id: &str,
        task_ref: &TaskRef,
    ) -> Result<TaskRecord, ResolveError> {
        let scope = self.resolve_list_scope(task_ref).await?;
        let task = self
            .gateway
            .get_task_by_custom_id(custom_id, scope.as_deref())
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => {
                    let where_ = match &scope {
                        Some(list) => format!(" in list {list}"),
                        None => String::new(),
                    };
                    ResolveError::NotFound(format!(
                        "task with custom id {custom_id:?} not found{where_}"
                    ))
                }
                e => ResolveError::upstream("get task by custom id", e),
            })?;

        info!(custom_id, task_id = %task.id, "resolved by custom id");
        self.cache.put_task(task.clone()).await;
        Ok(task)
    }

    /// Resolve the optional list scope of a reference: by id (validated) or
    /// by name (exact lookup in the workspace tree).
    async fn resolve_list_scope(
        &self,
        task_ref: &TaskRef,
    ) -> Result<Option<String>, ResolveError> {
        if let Some(list_id) = task_ref.list_id.as_deref() {
            self.cache
                .validate_list_exists(self.gateway.as_ref(), list_id)
                .await
                .map_err(|e| match e {
                    e if e.is_not_found() => {
                        ResolveError::NotFound(format!("list {list_id} not found"))
                    }
                    e => ResolveError::upstream("validate list", e),
                })?;
            return Ok(Some(list_id.to_string()));
        }

        if let Some(list_name) = task_ref.list_name.as_deref() {
            let tree = self
                .hierarchy
                .get_tree(false)
                .await
                .map_err(|e| ResolveError::upstream("build workspace hierarchy", e))?;
            let hit = hierarchy::find_by_name_and_type(&tree, list_name, NodeKind::List)
                .ok_or_else(|| {
                    ResolveError::NotFound(format!("list {list_name:?} not found in workspace"))
                })?;
            debug!(list_name, list_id = %hit.id, path = %hit.path, "list scope resolved by name");
            return Ok(Some(hit.id));
        }

        Ok(None)
    }

    // ─── Branch 3: name within a list scope ───────────────────────────────────

    async fn resolve_in_list(
        &self,
        name: &str,
        task_ref: &TaskRef,
        opts: &ResolveOptions,
    ) -> Result<Resolution, ResolveError> {
        let list_id = match self.resolve_list_scope(task_ref).await? {
            Some(id) => id,
            None => return Err(ResolveError::InvalidReference),
        };

        // Repeat lookups of a recently resolved name skip the listing call.
        if let Some(cached_id) = self.cache.cached_task_id(name, Some(&list_id)).await {
            match self
                .cache
                .get_or_validate_task(self.gateway.as_ref(), &cached_id)
                .await
            {
                Ok(task) => {
                    debug!(name, task_id = %cached_id, "name cache hit");
                    let task = self.maybe_contextualize(task, opts).await;
                    return Ok(Resolution::Single(task));
                }
                Err(e) => {
                    warn!(name, task_id = %cached_id, err = %e, "stale name cache entry — re-listing");
                }
            }
        }

        let tasks = self
            .gateway
            .get_tasks_in_list(&list_id)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => ResolveError::NotFound(format!("list {list_id} not found")),
                e => ResolveError::upstream("list tasks", e),
            })?;

        let mut matched: Vec<(TaskRecord, MatchResult)> = tasks
            .into_iter()
            .filter_map(|task| {
                let m = is_name_match(&task.name, name);
                (m.is_match && (!opts.exact_only || m.exact_match)).then_some((task, m))
            })
            .collect();
        matched.sort_by(|a, b| {
            b.1.score
                .cmp(&a.1.score)
                .then(b.0.updated_at_millis().cmp(&a.0.updated_at_millis()))
        });

        if matched.is_empty() {
            return Err(ResolveError::NotFound(format!(
                "task {name:?} not found in list {list_id}"
            )));
        }

        if matched.len() > 1 && !opts.smart_disambiguation {
            if opts.allow_multiple_matches {
                let mut tasks = Vec::with_capacity(matched.len());
                for (task, _) in matched {
                    tasks.push(self.maybe_contextualize(task, opts).await);
                }
                return Ok(Resolution::Multiple(tasks));
            }
            let candidates = matched
                .iter()
                .map(|(task, m)| candidate_info(task, m, None))
                .collect();
            return Err(ResolveError::Ambiguous {
                query: name.to_string(),
                candidates,
            });
        }

        let (mut best, best_match) = matched.swap_remove(0);
        debug!(
            name,
            task_id = %best.id,
            score = best_match.score,
            reason = best_match.reason,
            "name resolved within list"
        );

        // List endpoints can return a thin shape; refresh when full detail
        // was asked for and is missing.
        if opts.full_details && !best.has_full_details() {
            match self
                .cache
                .get_or_validate_task(self.gateway.as_ref(), &best.id)
                .await
            {
                Ok(full) => best = full,
                Err(e) => warn!(task_id = %best.id, err = %e, "detail refresh failed — returning summary data"),
            }
        }

        self.cache
            .store_task_id(name, &best.id, Some(&list_id))
            .await;
        self.cache.put_task(best.clone()).await;

        let best = self.maybe_contextualize(best, opts).await;
        Ok(Resolution::Single(best))
    }

    // ─── Branch 4: name workspace-wide ────────────────────────────────────────

    async fn resolve_global(
        &self,
        name: &str,
        opts: &ResolveOptions,
    ) -> Result<Resolution, ResolveError> {
        let filters = WorkspaceTaskFilters {
            include_closed: opts.include_closed,
            include_archived_lists: opts.include_archived_lists,
        };
        let summaries = self
            .gateway
            .get_workspace_tasks(&filters)
            .await
            .map_err(|e| ResolveError::upstream("list workspace tasks", e))?;

        // One context map per search; partial information beats failing the
        // whole call, so a broken hierarchy only costs the breadcrumbs.
        let contexts = match self.hierarchy.get_tree(false).await {
            Ok(tree) => hierarchy::list_context_map(&tree),
            Err(e) => {
                warn!(err = %e, "workspace hierarchy unavailable — resolving without list context");
                HashMap::new()
            }
        };

        let mut candidates: Vec<Candidate> = summaries
            .into_iter()
            .filter_map(|summary| {
                let m = is_name_match(&summary.name, name);
                (m.is_match && (!opts.exact_only || m.exact_match)).then(|| {
                    let context = summary
                        .list
                        .as_ref()
                        .and_then(|l| contexts.get(&l.id).cloned());
                    Candidate {
                        summary,
                        matched: m,
                        context,
                    }
                })
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.matched
                .score
                .cmp(&a.matched.score)
                .then(b.summary.updated_at_millis().cmp(&a.summary.updated_at_millis()))
        });

        if candidates.is_empty() {
            return Err(ResolveError::NotFound(format!(
                "task {name:?} not found in any list"
            )));
        }
        debug!(name, count = candidates.len(), "global search candidates");

        // A lone candidate with neither full detail nor smart
        // disambiguation required costs no further remote call.
        if candidates.len() == 1 && !opts.full_details && !opts.smart_disambiguation {
            let c = &candidates[0];
            let task = record_from_summary(&c.summary, c.context.as_ref());
            return Ok(Resolution::Single(task));
        }

        // Confidence beats recency: a unique candidate at a confident score
        // wins outright over any fresher lower-scored match.
        let top_score = candidates[0].matched.score;
        let unique_at_top = candidates
            .get(1)
            .map_or(true, |c| c.matched.score < top_score);
        if top_score >= CONFIDENT_SCORE && unique_at_top {
            let winner = candidates.swap_remove(0);
            info!(
                name,
                task_id = %winner.summary.id,
                score = top_score,
                "confident match selected outright"
            );
            let task = self.finalize_candidate(name, winner, opts).await;
            return Ok(Resolution::Single(task));
        }

        // Fetch full detail for every remaining candidate, one at a time —
        // predictable remote-call ordering and failure attribution matter
        // more here than latency.
        let mut detailed: Vec<(TaskRecord, MatchResult, Option<ListContext>)> = Vec::new();
        let mut degraded = false;
        for c in &candidates {
            match self
                .cache
                .get_or_validate_task(self.gateway.as_ref(), &c.summary.id)
                .await
            {
                Ok(task) => detailed.push((task, c.matched.clone(), c.context.clone())),
                Err(e) => {
                    warn!(task_id = %c.summary.id, err = %e, "detail fetch failed — degrading to summaries");
                    degraded = true;
                    break;
                }
            }
        }
        if degraded {
            detailed = candidates
                .iter()
                .map(|c| {
                    (
                        record_from_summary(&c.summary, c.context.as_ref()),
                        c.matched.clone(),
                        c.context.clone(),
                    )
                })
                .collect();
        }

        detailed.sort_by(|a, b| {
            b.1.score
                .cmp(&a.1.score)
                .then(b.0.updated_at_millis().cmp(&a.0.updated_at_millis()))
        });

        if opts.smart_disambiguation || detailed.len() == 1 {
            let (mut task, m, context) = detailed.swap_remove(0);
            info!(
                name,
                task_id = %task.id,
                score = m.score,
                degraded,
                "global search resolved"
            );
            if opts.include_context || degraded {
                if let Some(ctx) = &context {
                    enrich_with_context(&mut task, ctx);
                }
            }
            self.record_winner(name, &task).await;
            return Ok(Resolution::Single(task));
        }

        if opts.allow_multiple_matches {
            let tasks = detailed
                .into_iter()
                .map(|(mut task, _, context)| {
                    if opts.include_context || degraded {
                        if let Some(ctx) = &context {
                            enrich_with_context(&mut task, ctx);
                        }
                    }
                    task
                })
                .collect();
            return Ok(Resolution::Multiple(tasks));
        }

        let candidate_infos = detailed
            .iter()
            .map(|(task, m, context)| candidate_info(task, m, context.as_ref()))
            .collect();
        Err(ResolveError::Ambiguous {
            query: name.to_string(),
            candidates: candidate_infos,
        })
    }

    /// Finish a confidently selected candidate: detail fetch if requested
    /// (degrading to the summary on failure), context enrichment, cache
    /// write-back.
    async fn finalize_candidate(
        &self,
        name: &str,
        winner: Candidate,
        opts: &ResolveOptions,
    ) -> TaskRecord {
        let mut degraded = false;
        let mut task = if opts.full_details {
            match self
                .cache
                .get_or_validate_task(self.gateway.as_ref(), &winner.summary.id)
                .await
            {
                Ok(task) => task,
                Err(e) => {
                    warn!(task_id = %winner.summary.id, err = %e, "detail fetch failed — returning summary data");
                    degraded = true;
                    record_from_summary(&winner.summary, winner.context.as_ref())
                }
            }
        } else {
            record_from_summary(&winner.summary, winner.context.as_ref())
        };

        if opts.include_context || degraded {
            if let Some(ctx) = &winner.context {
                enrich_with_context(&mut task, ctx);
            }
        }
        self.record_winner(name, &task).await;
        task
    }

    /// Write the winning name → id mapping back, scoped to the resolved
    /// list, and cache the record itself.
    async fn record_winner(&self, name: &str, task: &TaskRecord) {
        let list_id = task.list.as_ref().map(|l| l.id.as_str());
        self.cache.store_task_id(name, &task.id, list_id).await;
        self.cache.put_task(task.clone()).await;
    }

    /// Apply hierarchy context to a record when `include_context` is set.
    async fn maybe_contextualize(&self, mut task: TaskRecord, opts: &ResolveOptions) -> TaskRecord {
        if !opts.include_context {
            return task;
        }
        let list_id = match task.list.as_ref() {
            Some(l) => l.id.clone(),
            None => return task,
        };
        match self.hierarchy.get_tree(false).await {
            Ok(tree) => {
                let contexts = hierarchy::list_context_map(&tree);
                if let Some(ctx) = contexts.get(&list_id) {
                    enrich_with_context(&mut task, ctx);
                }
            }
            Err(e) => warn!(err = %e, "hierarchy unavailable — returning task without context"),
        }
        task
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Promote a workspace summary to a (thin) task record, applying hierarchy
/// context when available.
fn record_from_summary(summary: &TaskSummary, context: Option<&ListContext>) -> TaskRecord {
    let mut task = TaskRecord {
        id: summary.id.clone(),
        custom_id: summary.custom_id.clone(),
        name: summary.name.clone(),
        status: summary.status.clone(),
        list: summary.list.clone(),
        url: summary.url.clone(),
        date_updated: summary.date_updated.clone(),
        ..Default::default()
    };
    if let Some(ctx) = context {
        enrich_with_context(&mut task, ctx);
    }
    task
}

/// Overwrite a record's container refs with names from the hierarchy.
fn enrich_with_context(task: &mut TaskRecord, ctx: &ListContext) {
    task.list = Some(EntityRef::new(
        ctx.list_id.clone(),
        Some(ctx.list_name.clone()),
    ));
    if let (Some(folder_id), Some(folder_name)) = (&ctx.folder_id, &ctx.folder_name) {
        task.folder = Some(EntityRef::new(folder_id.clone(), Some(folder_name.clone())));
    }
    task.space = Some(EntityRef::new(
        ctx.space_id.clone(),
        Some(ctx.space_name.clone()),
    ));
}

/// Build one ambiguity-listing entry for a matched task.
fn candidate_info(
    task: &TaskRecord,
    matched: &MatchResult,
    context: Option<&ListContext>,
) -> CandidateInfo {
    let location = match context {
        Some(ctx) => ctx.breadcrumb(),
        None => {
            let parts: Vec<&str> = [&task.space, &task.folder, &task.list]
                .into_iter()
                .filter_map(|r| r.as_ref().and_then(|e| e.name.as_deref()))
                .collect();
            if parts.is_empty() {
                "unknown location".to_string()
            } else {
                parts.join(" > ")
            }
        }
    };
    CandidateInfo {
        id: task.id.clone(),
        name: task.name.clone(),
        location,
        last_updated: task
            .date_updated
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        quality: quality_label(matched.score),
    }
}
