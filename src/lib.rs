// SPDX-License-Identifier: MIT
//! taskbridge — task reference resolution for remote project-management
//! workspaces.
//!
//! The engine turns a loosely specified reference (canonical id, custom id,
//! or human-typed name, optionally scoped to a list) into canonical task
//! records, combining:
//!
//! - a multi-strategy lookup protocol ([`resolver::TaskResolver`]),
//! - tiered fuzzy name matching with fixed scores ([`matcher`]),
//! - a cached space → folder → list index ([`hierarchy::HierarchyIndexer`]),
//! - TTL-bounded validation caches ([`cache::ValidationCache`]).
//!
//! All remote access goes through the injectable
//! [`gateway::RemoteTaskGateway`] trait; [`gateway::HttpTaskGateway`] is the
//! production implementation. State lives entirely in process memory — one
//! resolver per workspace/credential pair, dropped when done.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod hierarchy;
pub mod matcher;
pub mod model;
pub mod resolver;

pub use cache::ValidationCache;
pub use config::EngineConfig;
pub use error::ResolveError;
pub use gateway::{HttpTaskGateway, RemoteTaskGateway};
pub use hierarchy::HierarchyIndexer;
pub use model::{TaskRecord, TaskSummary};
pub use resolver::{ResolveOptions, Resolution, TaskRef, TaskResolver};
