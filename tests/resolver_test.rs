//! Integration tests for the resolution protocol: branch priority,
//! disambiguation policy, cache behavior, and failure degradation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use taskbridge::cache::DEFAULT_CACHE_TTL_SECS;
use taskbridge::gateway::{GatewayError, RemoteTaskGateway, WorkspaceTaskFilters};
use taskbridge::model::{EntityRef, TaskRecord, TaskSummary};
use taskbridge::{ResolveError, ResolveOptions, Resolution, TaskRef, TaskResolver, ValidationCache};

// ─── Mock gateway ────────────────────────────────────────────────────────────

/// Scriptable in-memory workspace with per-operation call counters.
#[derive(Default)]
struct MockGateway {
    tasks: HashMap<String, TaskRecord>,
    custom_ids: HashMap<String, String>,
    list_tasks: HashMap<String, Vec<String>>,
    lists: HashMap<String, String>,
    summaries: Vec<TaskSummary>,
    spaces: Vec<EntityRef>,
    /// Task ids whose detail fetch should fail with a 500.
    fail_detail_for: Mutex<Vec<String>>,
    get_task_calls: AtomicU32,
    list_tasks_calls: AtomicU32,
    workspace_calls: AtomicU32,
    get_list_calls: AtomicU32,
}

impl MockGateway {
    fn new() -> Self {
        Self::default()
    }

    fn add_list(&mut self, id: &str, name: &str) {
        self.lists.insert(id.to_string(), name.to_string());
        self.list_tasks.entry(id.to_string()).or_default();
    }

    fn add_task(&mut self, task: TaskRecord) {
        if let Some(custom) = &task.custom_id {
            self.custom_ids.insert(custom.clone(), task.id.clone());
        }
        if let Some(list) = &task.list {
            self.list_tasks
                .entry(list.id.clone())
                .or_default()
                .push(task.id.clone());
        }
        self.summaries.push(TaskSummary {
            id: task.id.clone(),
            custom_id: task.custom_id.clone(),
            name: task.name.clone(),
            status: task.status.clone(),
            list: task.list.clone(),
            url: None,
            date_updated: task.date_updated.clone(),
        });
        self.tasks.insert(task.id.clone(), task);
    }
}

/// Full-detail task fixture living in `list_id`.
fn task(id: &str, name: &str, list_id: &str, updated_millis: i64) -> TaskRecord {
    TaskRecord {
        id: id.to_string(),
        name: name.to_string(),
        list: Some(EntityRef::new(list_id, Some(format!("List {list_id}")))),
        url: Some(format!("https://pm.example/t/{id}")),
        date_created: Some("1700000000000".to_string()),
        date_updated: Some(updated_millis.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl RemoteTaskGateway for MockGateway {
    async fn get_task(&self, task_id: &str) -> Result<TaskRecord, GatewayError> {
        self.get_task_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_detail_for.lock().await.iter().any(|id| id == task_id) {
            return Err(GatewayError::Api {
                operation: "get task".into(),
                status: 500,
                message: "boom".into(),
            });
        }
        self.tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound {
                resource: format!("task {task_id}"),
            })
    }

    async fn get_task_by_custom_id(
        &self,
        custom_id: &str,
        list_id: Option<&str>,
    ) -> Result<TaskRecord, GatewayError> {
        let id = self
            .custom_ids
            .get(custom_id)
            .ok_or_else(|| GatewayError::NotFound {
                resource: format!("task {custom_id}"),
            })?;
        let found = self.tasks[id].clone();
        if let Some(scope) = list_id {
            if !found.list.as_ref().is_some_and(|l| l.id == scope) {
                return Err(GatewayError::NotFound {
                    resource: format!("task {custom_id} in list {scope}"),
                });
            }
        }
        Ok(found)
    }

    async fn get_tasks_in_list(&self, list_id: &str) -> Result<Vec<TaskRecord>, GatewayError> {
        self.list_tasks_calls.fetch_add(1, Ordering::Relaxed);
        let ids = self
            .list_tasks
            .get(list_id)
            .ok_or_else(|| GatewayError::NotFound {
                resource: format!("list {list_id}"),
            })?;
        Ok(ids.iter().map(|id| self.tasks[id].clone()).collect())
    }

    async fn get_workspace_tasks(
        &self,
        _filters: &WorkspaceTaskFilters,
    ) -> Result<Vec<TaskSummary>, GatewayError> {
        self.workspace_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.summaries.clone())
    }

    async fn get_list(&self, list_id: &str) -> Result<EntityRef, GatewayError> {
        self.get_list_calls.fetch_add(1, Ordering::Relaxed);
        self.lists
            .get(list_id)
            .map(|name| EntityRef::new(list_id, Some(name.clone())))
            .ok_or_else(|| GatewayError::NotFound {
                resource: format!("list {list_id}"),
            })
    }

    async fn get_spaces(&self) -> Result<Vec<EntityRef>, GatewayError> {
        Ok(self.spaces.clone())
    }

    async fn get_folders(&self, _space_id: &str) -> Result<Vec<EntityRef>, GatewayError> {
        Ok(vec![])
    }

    async fn get_folder_lists(&self, _folder_id: &str) -> Result<Vec<EntityRef>, GatewayError> {
        Ok(vec![])
    }

    async fn get_folderless_lists(&self, space_id: &str) -> Result<Vec<EntityRef>, GatewayError> {
        // Every known list is folderless under the single space.
        if space_id == "s1" {
            let mut lists: Vec<EntityRef> = self
                .lists
                .iter()
                .map(|(id, name)| EntityRef::new(id.clone(), Some(name.clone())))
                .collect();
            lists.sort_by(|a, b| a.id.cmp(&b.id));
            return Ok(lists);
        }
        Ok(vec![])
    }
}

fn resolver_for(gateway: MockGateway) -> (Arc<MockGateway>, TaskResolver) {
    let gateway = Arc::new(gateway);
    let resolver = TaskResolver::new(
        gateway.clone(),
        ValidationCache::new(DEFAULT_CACHE_TTL_SECS),
    );
    (gateway, resolver)
}

fn single(resolution: Resolution) -> TaskRecord {
    match resolution {
        Resolution::Single(task) => task,
        Resolution::Multiple(tasks) => panic!("expected single, got {} tasks", tasks.len()),
    }
}

// ─── Branch priority ─────────────────────────────────────────────────────────

#[tokio::test]
async fn direct_canonical_id_resolves_without_search() {
    let mut gw = MockGateway::new();
    gw.add_task(task("86c2p4qkd", "Fix login bug", "l1", 1));
    let (gw, resolver) = resolver_for(gw);

    let resolved = resolver
        .resolve(&TaskRef::by_id("86c2p4qkd"), &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(single(resolved).id, "86c2p4qkd");
    assert_eq!(gw.workspace_calls.load(Ordering::Relaxed), 0);
    assert_eq!(gw.list_tasks_calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn custom_id_shaped_reference_tries_custom_lookup_first() {
    let mut gw = MockGateway::new();
    let mut t = task("abc999", "Ship release", "l1", 1);
    t.custom_id = Some("DEV-42".to_string());
    gw.add_task(t);
    let (_gw, resolver) = resolver_for(gw);

    let resolved = resolver
        .resolve(&TaskRef::by_id("DEV-42"), &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(single(resolved).id, "abc999");
}

#[tokio::test]
async fn unknown_custom_id_falls_back_to_canonical_and_reports_literal_id() {
    let (_gw, resolver) = resolver_for(MockGateway::new());

    let err = resolver
        .resolve(&TaskRef::by_id("DEV-1234"), &ResolveOptions::default())
        .await
        .unwrap_err();
    match err {
        ResolveError::NotFound(msg) => assert!(msg.contains("DEV-1234"), "got: {msg}"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_reference_is_invalid() {
    let (_gw, resolver) = resolver_for(MockGateway::new());
    let err = resolver
        .resolve(&TaskRef::default(), &ResolveOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidReference));
}

#[tokio::test]
async fn custom_id_scoped_to_wrong_list_is_not_found() {
    let mut gw = MockGateway::new();
    gw.add_list("l1", "Backlog");
    gw.add_list("l2", "Done");
    let mut t = task("abc999", "Ship release", "l1", 1);
    t.custom_id = Some("DEV-42".to_string());
    gw.add_task(t);
    let (_gw, resolver) = resolver_for(gw);

    let task_ref = TaskRef {
        custom_id: Some("DEV-42".to_string()),
        list_id: Some("l2".to_string()),
        ..Default::default()
    };
    let err = resolver
        .resolve(&task_ref, &ResolveOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NotFound(_)));
}

// ─── Name within a list ──────────────────────────────────────────────────────

#[tokio::test]
async fn name_in_list_resolves_and_repeat_lookup_hits_the_cache() {
    let mut gw = MockGateway::new();
    gw.add_list("l1", "Backlog");
    gw.add_task(task("t1", "Fix login bug", "l1", 10));
    gw.add_task(task("t2", "Write docs", "l1", 20));
    let (gw, resolver) = resolver_for(gw);

    let task_ref = TaskRef {
        name: Some("Fix login bug".to_string()),
        list_id: Some("l1".to_string()),
        ..Default::default()
    };
    let first = resolver
        .resolve(&task_ref, &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(single(first).id, "t1");
    assert_eq!(gw.list_tasks_calls.load(Ordering::Relaxed), 1);

    // Identical repeat: served from the name + task caches, no second
    // listing call.
    let second = resolver
        .resolve(&task_ref, &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(single(second).id, "t1");
    assert_eq!(gw.list_tasks_calls.load(Ordering::Relaxed), 1);
    assert_eq!(gw.get_list_calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn name_scoped_by_list_name_resolves_through_the_hierarchy() {
    let mut gw = MockGateway::new();
    gw.spaces = vec![EntityRef::new("s1", Some("Engineering".to_string()))];
    gw.add_list("l1", "Backlog");
    gw.add_task(task("t1", "Fix login bug", "l1", 10));
    let (_gw, resolver) = resolver_for(gw);

    let task_ref = TaskRef {
        name: Some("Fix login bug".to_string()),
        list_name: Some("Backlog".to_string()),
        ..Default::default()
    };
    let resolved = resolver
        .resolve(&task_ref, &ResolveOptions::default())
        .await
        .unwrap();
    assert_eq!(single(resolved).id, "t1");
}

#[tokio::test]
async fn missing_list_fails_once_then_is_served_from_the_negative_cache() {
    let (gw, resolver) = resolver_for(MockGateway::new());

    let task_ref = TaskRef {
        name: Some("anything".to_string()),
        list_id: Some("000".to_string()),
        ..Default::default()
    };
    for _ in 0..2 {
        let err = resolver
            .resolve(&task_ref, &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }
    assert_eq!(gw.get_list_calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn name_cache_scoped_to_one_list_does_not_leak_into_another() {
    let mut gw = MockGateway::new();
    gw.add_list("l1", "Backlog");
    gw.add_list("l2", "Duplicates");
    gw.add_task(task("t1", "Fix login bug", "l1", 10));
    gw.add_task(task("t9", "Fix login bug", "l2", 5));
    let (gw, resolver) = resolver_for(gw);

    let in_a = TaskRef {
        name: Some("Fix login bug".to_string()),
        list_id: Some("l1".to_string()),
        ..Default::default()
    };
    assert_eq!(
        single(resolver.resolve(&in_a, &ResolveOptions::default()).await.unwrap()).id,
        "t1"
    );

    // Same name scoped to list B must re-list B, not reuse A's entry.
    let in_b = TaskRef {
        name: Some("Fix login bug".to_string()),
        list_id: Some("l2".to_string()),
        ..Default::default()
    };
    assert_eq!(
        single(resolver.resolve(&in_b, &ResolveOptions::default()).await.unwrap()).id,
        "t9"
    );
    assert_eq!(gw.list_tasks_calls.load(Ordering::Relaxed), 2);
}

// ─── Global search & disambiguation ──────────────────────────────────────────

#[tokio::test]
async fn equal_scores_tie_break_on_recency() {
    let mut gw = MockGateway::new();
    gw.add_list("l1", "Backlog");
    gw.add_list("l2", "Sprint");
    gw.add_task(task("t1", "Fix login bug", "l1", 1_000));
    gw.add_task(task("t2", "Fix login bug", "l2", 2_000));
    let (_gw, resolver) = resolver_for(gw);

    let resolved = resolver
        .resolve(
            &TaskRef::by_name("Fix login bug"),
            &ResolveOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(single(resolved).id, "t2", "the fresher task wins the tie");
}

#[tokio::test]
async fn confident_match_beats_fresher_weak_match() {
    let mut gw = MockGateway::new();
    gw.add_list("l1", "Backlog");
    gw.add_list("l2", "Sprint");
    // Case-insensitive (80) but stale vs. substring (50) but fresh.
    gw.add_task(task("t1", "Fix login bug", "l1", 1_000));
    gw.add_task(task("t2", "Login", "l2", 9_000));
    let (gw, resolver) = resolver_for(gw);

    let resolved = resolver
        .resolve(
            &TaskRef::by_name("fix LOGIN bug"),
            &ResolveOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(single(resolved).id, "t1");
    // Confident shortcut: only the winner's detail was fetched.
    assert_eq!(gw.get_task_calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn no_global_match_reports_not_found_in_any_list() {
    let mut gw = MockGateway::new();
    gw.add_list("l1", "Backlog");
    gw.add_task(task("t1", "Write docs", "l1", 1));
    let (_gw, resolver) = resolver_for(gw);

    let err = resolver
        .resolve(&TaskRef::by_name("Fix login bug"), &ResolveOptions::default())
        .await
        .unwrap_err();
    match err {
        ResolveError::NotFound(msg) => assert!(msg.contains("any list"), "got: {msg}"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn ambiguity_without_smart_disambiguation_lists_every_candidate() {
    let mut gw = MockGateway::new();
    gw.spaces = vec![EntityRef::new("s1", Some("Engineering".to_string()))];
    gw.add_list("l1", "Backlog");
    gw.add_list("l2", "Sprint");
    gw.add_task(task("t1", "Fix login bug", "l1", 1_000));
    gw.add_task(task("t2", "Fix login bug", "l2", 2_000));
    let (_gw, resolver) = resolver_for(gw);

    let opts = ResolveOptions {
        smart_disambiguation: false,
        ..Default::default()
    };
    let err = resolver
        .resolve(&TaskRef::by_name("Fix login bug"), &opts)
        .await
        .unwrap_err();
    match err {
        ResolveError::Ambiguous { query, candidates } => {
            assert_eq!(query, "Fix login bug");
            assert_eq!(candidates.len(), 2);
            let locations: Vec<&str> = candidates.iter().map(|c| c.location.as_str()).collect();
            assert!(locations.iter().any(|l| l.contains("Backlog")));
            assert!(locations.iter().any(|l| l.contains("Sprint")));
            assert!(candidates.iter().all(|c| c.quality == "exact"));
        }
        other => panic!("expected Ambiguous, got {other:?}"),
    }
}

#[tokio::test]
async fn allow_multiple_returns_the_full_sorted_set() {
    let mut gw = MockGateway::new();
    gw.add_list("l1", "Backlog");
    gw.add_list("l2", "Sprint");
    gw.add_task(task("t1", "Fix login bug", "l1", 1_000));
    gw.add_task(task("t2", "Fix login bug", "l2", 2_000));
    let (_gw, resolver) = resolver_for(gw);

    let opts = ResolveOptions {
        allow_multiple_matches: true,
        smart_disambiguation: false,
        ..Default::default()
    };
    let resolved = resolver
        .resolve(&TaskRef::by_name("Fix login bug"), &opts)
        .await
        .unwrap();
    match resolved {
        Resolution::Multiple(tasks) => {
            assert_eq!(tasks.len(), 2);
            assert_eq!(tasks[0].id, "t2", "sorted most-recent first");
            assert_eq!(tasks[1].id, "t1");
        }
        Resolution::Single(t) => panic!("expected multiple, got {}", t.id),
    }
}

#[tokio::test]
async fn detail_fetch_failure_degrades_to_summaries_instead_of_failing() {
    let mut gw = MockGateway::new();
    gw.spaces = vec![EntityRef::new("s1", Some("Engineering".to_string()))];
    gw.add_list("l1", "Backlog");
    gw.add_list("l2", "Sprint");
    gw.add_task(task("t1", "Fix login bug", "l1", 1_000));
    gw.add_task(task("t2", "Fix login bug", "l2", 2_000));
    gw.fail_detail_for = Mutex::new(vec!["t2".to_string()]);
    let (_gw, resolver) = resolver_for(gw);

    let resolved = resolver
        .resolve(
            &TaskRef::by_name("Fix login bug"),
            &ResolveOptions::default(),
        )
        .await
        .unwrap();
    let best = single(resolved);
    assert_eq!(best.id, "t2", "summary-level winner still selected");
    assert!(!best.has_full_details(), "degraded result is summary-shaped");
    // Context enrichment still applied from the hierarchy.
    assert_eq!(
        best.space.as_ref().and_then(|s| s.name.as_deref()),
        Some("Engineering")
    );
}

#[tokio::test]
async fn exact_only_drops_partial_matches() {
    let mut gw = MockGateway::new();
    gw.add_list("l1", "Backlog");
    gw.add_task(task("t1", "Investigate login timeouts", "l1", 9_000));
    let (_gw, resolver) = resolver_for(gw);

    let opts = ResolveOptions {
        exact_only: true,
        ..Default::default()
    };
    let err = resolver
        .resolve(&TaskRef::by_name("login"), &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::NotFound(_)));
}

#[tokio::test]
async fn include_context_enriches_container_names() {
    let mut gw = MockGateway::new();
    gw.spaces = vec![EntityRef::new("s1", Some("Engineering".to_string()))];
    gw.add_list("l1", "Backlog");
    gw.add_task(task("t1", "Fix login bug", "l1", 1_000));
    let (_gw, resolver) = resolver_for(gw);

    let opts = ResolveOptions {
        include_context: true,
        ..Default::default()
    };
    let resolved = resolver
        .resolve(&TaskRef::by_name("Fix login bug"), &opts)
        .await
        .unwrap();
    let best = single(resolved);
    assert_eq!(
        best.space.as_ref().and_then(|s| s.name.as_deref()),
        Some("Engineering")
    );
    assert_eq!(
        best.list.as_ref().and_then(|l| l.name.as_deref()),
        Some("Backlog")
    );
}

#[tokio::test]
async fn invalidate_task_forces_a_fresh_fetch() {
    let mut gw = MockGateway::new();
    gw.add_task(task("t1", "Fix login bug", "l1", 1_000));
    let (gw, resolver) = resolver_for(gw);

    let r = TaskRef::by_id("t1");
    resolver.resolve(&r, &ResolveOptions::default()).await.unwrap();
    resolver.resolve(&r, &ResolveOptions::default()).await.unwrap();
    assert_eq!(gw.get_task_calls.load(Ordering::Relaxed), 1);

    resolver.invalidate_task("t1").await;
    resolver.resolve(&r, &ResolveOptions::default()).await.unwrap();
    assert_eq!(gw.get_task_calls.load(Ordering::Relaxed), 2);
}
