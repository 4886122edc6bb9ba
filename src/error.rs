// SPDX-License-Identifier: MIT
//! Error taxonomy for task resolution.
//!
//! `NotFound` and `Ambiguous` are domain-significant and carry everything a
//! caller needs to self-correct (the query, the scope, and — for ambiguity —
//! the full candidate listing). `Upstream` wraps remote failures with the
//! operation that triggered them.

use crate::gateway::GatewayError;

/// One entry in an ambiguity listing: enough location and recency detail
/// for a caller to pick a candidate and retry with an exact identifier.
#[derive(Debug, Clone)]
pub struct CandidateInfo {
    pub id: String,
    pub name: String,
    /// Breadcrumb location, e.g. `"Engineering > Sprints > Sprint 12"`, or
    /// `"unknown location"` when no hierarchy context could be derived.
    pub location: String,
    /// Raw `date_updated` millis string, `"unknown"` when absent.
    pub last_updated: String,
    /// Match-quality tier label ("exact", "case-insensitive", ...).
    pub quality: &'static str,
}

impl std::fmt::Display for CandidateInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) in {} [updated {}, {} match]",
            self.name, self.id, self.location, self.last_updated, self.quality
        )
    }
}

fn render_candidates(candidates: &[CandidateInfo]) -> String {
    candidates
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No candidate matched the reference at all.
    #[error("{0}")]
    NotFound(String),

    /// Multiple candidates matched and disambiguation was not permitted.
    /// Narrow the scope (supply a list) or use an exact id to resolve.
    #[error(
        "ambiguous task reference {query:?}: {} candidates match — {}",
        .candidates.len(),
        render_candidates(.candidates)
    )]
    Ambiguous {
        query: String,
        candidates: Vec<CandidateInfo>,
    },

    /// None of id / custom id / name was supplied.
    #[error("invalid task reference: supply an id, a custom id, or a name")]
    InvalidReference,

    /// A remote call failed for reasons other than the resource missing.
    #[error("{operation} failed")]
    Upstream {
        operation: String,
        #[source]
        source: GatewayError,
    },
}

impl ResolveError {
    pub fn upstream(operation: impl Into<String>, source: GatewayError) -> Self {
        Self::Upstream {
            operation: operation.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, location: &str) -> CandidateInfo {
        CandidateInfo {
            id: id.to_string(),
            name: "Fix login bug".to_string(),
            location: location.to_string(),
            last_updated: "1712345678901".to_string(),
            quality: "exact",
        }
    }

    #[test]
    fn ambiguous_message_lists_every_candidate() {
        let err = ResolveError::Ambiguous {
            query: "Fix login bug".to_string(),
            candidates: vec![
                candidate("a1", "Engineering > Backlog"),
                candidate("b2", "Marketing > Campaigns > Launch"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 candidates"));
        assert!(msg.contains("Engineering > Backlog"));
        assert!(msg.contains("Marketing > Campaigns > Launch"));
        assert!(msg.contains("exact match"));
    }

    #[test]
    fn upstream_preserves_the_gateway_error_as_source() {
        let err = ResolveError::upstream(
            "list tasks",
            GatewayError::Api {
                operation: "list tasks".into(),
                status: 502,
                message: "bad gateway".into(),
            },
        );
        assert_eq!(err.to_string(), "list tasks failed");
        let source = std::error::Error::source(&err).expect("source");
        assert!(source.to_string().contains("502"));
    }
}
