// SPDX-License-Identifier: MIT
//! Workspace hierarchy indexing.
//!
//! Builds the space → folder → list tree by traversing the remote listing
//! endpoints, caches it for the process lifetime, and answers structural
//! queries (exact-name lookup, list context). The tree is replaced
//! wholesale on refresh; a failed rebuild leaves the previous tree
//! untouched and servable.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::gateway::{GatewayError, RemoteTaskGateway};
use crate::model::{ListContext, NodeKind, WorkspaceNode, WorkspaceTree};

/// A `find_by_name_and_type` hit: the node's id plus its breadcrumb path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyHit {
    pub id: String,
    pub path: String,
}

pub struct HierarchyIndexer {
    gateway: Arc<dyn RemoteTaskGateway>,
    tree: RwLock<Option<Arc<WorkspaceTree>>>,
}

impl HierarchyIndexer {
    pub fn new(gateway: Arc<dyn RemoteTaskGateway>) -> Self {
        Self {
            gateway,
            tree: RwLock::new(None),
        }
    }

    /// Return the cached tree, building it on first call or when
    /// `force_refresh` is set.
    ///
    /// Construction is sequential per space/folder; assembly is
    /// ordering-independent so this could be parallelized across spaces
    /// without affecting correctness. Concurrent first callers are not
    /// single-flighted and may trigger redundant builds — an accepted
    /// simplification at current call volumes.
    pub async fn get_tree(&self, force_refresh: bool) -> Result<Arc<WorkspaceTree>, GatewayError> {
        if !force_refresh {
            if let Some(tree) = self.tree.read().await.clone() {
                debug!("workspace tree cache hit");
                return Ok(tree);
            }
        }

        let built = Arc::new(self.build_tree().await?);
        *self.tree.write().await = Some(built.clone());
        info!(
            spaces = built.children.len(),
            "workspace tree built"
        );
        Ok(built)
    }

    /// Drop the cached tree so the next call rebuilds it. Called after
    /// structural mutations (list/folder create, move, delete) performed
    /// elsewhere in the system.
    pub async fn invalidate(&self) {
        *self.tree.write().await = None;
    }

    async fn build_tree(&self) -> Result<WorkspaceTree, GatewayError> {
        let spaces = self.gateway.get_spaces().await?;
        let mut space_nodes = Vec::with_capacity(spaces.len());

        for space in spaces {
            let space_name = space.name.clone().unwrap_or_default();
            let mut children = Vec::new();

            for folder in self.gateway.get_folders(&space.id).await? {
                let folder_name = folder.name.clone().unwrap_or_default();
                let lists = self.gateway.get_folder_lists(&folder.id).await?;
                let list_nodes = lists
                    .into_iter()
                    .map(|list| WorkspaceNode {
                        id: list.id,
                        name: list.name.unwrap_or_default(),
                        kind: NodeKind::List,
                        parent_id: Some(folder.id.clone()),
                        children: vec![],
                    })
                    .collect();
                children.push(WorkspaceNode {
                    id: folder.id.clone(),
                    name: folder_name,
                    kind: NodeKind::Folder,
                    parent_id: Some(space.id.clone()),
                    children: list_nodes,
                });
            }

            for list in self.gateway.get_folderless_lists(&space.id).await? {
                children.push(WorkspaceNode {
                    id: list.id,
                    name: list.name.unwrap_or_default(),
                    kind: NodeKind::List,
                    parent_id: Some(space.id.clone()),
                    children: vec![],
                });
            }

            space_nodes.push(WorkspaceNode {
                id: space.id,
                name: space_name,
                kind: NodeKind::Space,
                parent_id: None,
                children,
            });
        }

        Ok(WorkspaceTree {
            root_id: "workspace".to_string(),
            root_name: "Workspace".to_string(),
            children: space_nodes,
        })
    }
}

/// Find the first node matching `name` (exact equality, not fuzzy) and
/// `kind`, in depth-first order over the tree as the remote API returned
/// siblings.
///
/// Two lists sharing a name in different folders resolve to whichever the
/// walk reaches first — a documented limitation; callers needing precision
/// should scope by id.
pub fn find_by_name_and_type(
    tree: &WorkspaceTree,
    name: &str,
    kind: NodeKind,
) -> Option<HierarchyHit> {
    // Explicit stack of (node, accumulated path) instead of recursion;
    // children pushed in reverse so pop order matches sibling order.
    let mut stack: Vec<(&WorkspaceNode, String)> = Vec::new();
    for node in tree.children.iter().rev() {
        stack.push((node, node.name.clone()));
    }

    while let Some((node, path)) = stack.pop() {
        if node.kind == kind && node.name == name {
            return Some(HierarchyHit {
                id: node.id.clone(),
                path,
            });
        }
        for child in node.children.iter().rev() {
            stack.push((child, format!("{path} > {}", child.name)));
        }
    }

    if tree.children.is_empty() {
        warn!(%name, %kind, "lookup against an empty workspace tree");
    }
    None
}

/// Build the `list_id → ListContext` map from a tree. Rebuilt per global
/// search; only the tree itself is cached across calls.
pub fn list_context_map(tree: &WorkspaceTree) -> HashMap<String, ListContext> {
    let mut map = HashMap::new();
    for space in &tree.children {
        for child in &space.children {
            match child.kind {
                NodeKind::List => {
                    map.insert(
                        child.id.clone(),
                        ListContext {
                            list_id: child.id.clone(),
                            list_name: child.name.clone(),
                            space_id: space.id.clone(),
                            space_name: space.name.clone(),
                            folder_id: None,
                            folder_name: None,
                        },
                    );
                }
                NodeKind::Folder => {
                    for list in &child.children {
                        map.insert(
                            list.id.clone(),
                            ListContext {
                                list_id: list.id.clone(),
                                list_name: list.name.clone(),
                                space_id: space.id.clone(),
                                space_name: space.name.clone(),
                                folder_id: Some(child.id.clone()),
                                folder_name: Some(child.name.clone()),
                            },
                        );
                    }
                }
                NodeKind::Space => {}
            }
        }
    }
    map
}
