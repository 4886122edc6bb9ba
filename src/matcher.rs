// SPDX-License-Identifier: MIT
//! Tiered name matching.
//!
//! [`is_name_match`] scores how well a candidate task name matches a query
//! string. Tiers are evaluated in order and short-circuit; the fixed score
//! constants are part of the engine contract — disambiguation treats
//! [`CONFIDENT_SCORE`] and above as "resolve without asking".

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::MatchResult;

/// Identical after trimming.
pub const SCORE_EXACT: u8 = 100;
/// Identical after trimming, ignoring case.
pub const SCORE_CASE_INSENSITIVE: u8 = 80;
/// Identical after stripping emoji from both sides.
pub const SCORE_EMOJI_STRIPPED: u8 = 70;
/// One side contains the other.
pub const SCORE_SUBSTRING: u8 = 50;
/// Minimum score the resolver trusts without disambiguation.
pub const CONFIDENT_SCORE: u8 = 80;

/// Emoji plus the joiners and variation selectors that ride along with them.
static EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{Emoji_Presentation}\p{Extended_Pictographic}\u{200D}\u{FE0E}\u{FE0F}]")
        .expect("regex: emoji")
});

/// Remove Unicode emoji (and their joiners/variation selectors) from `s`.
///
/// Isolated behind a named function so the Unicode matching strategy can be
/// swapped without touching the tier contract.
pub fn strip_emoji(s: &str) -> String {
    EMOJI.replace_all(s, "").into_owned()
}

/// Score `candidate` against `query`.
///
/// Tier order: exact (100) → case-insensitive (80) → emoji-stripped (70) →
/// bidirectional substring containment (50). Anything else is no match.
pub fn is_name_match(candidate: &str, query: &str) -> MatchResult {
    let candidate = candidate.trim();
    let query = query.trim();

    if candidate == query {
        return MatchResult {
            is_match: true,
            exact_match: true,
            score: SCORE_EXACT,
            reason: "exact match",
        };
    }

    let candidate_lower = candidate.to_lowercase();
    let query_lower = query.to_lowercase();
    if candidate_lower == query_lower {
        return MatchResult {
            is_match: true,
            exact_match: true,
            score: SCORE_CASE_INSENSITIVE,
            reason: "case-insensitive match",
        };
    }

    let candidate_stripped = strip_emoji(&candidate_lower).trim().to_string();
    let query_stripped = strip_emoji(&query_lower).trim().to_string();
    if !candidate_stripped.is_empty() && candidate_stripped == query_stripped {
        return MatchResult {
            is_match: true,
            exact_match: false,
            score: SCORE_EMOJI_STRIPPED,
            reason: "match after emoji removal",
        };
    }

    if !candidate_lower.is_empty()
        && !query_lower.is_empty()
        && (candidate_lower.contains(&query_lower) || query_lower.contains(&candidate_lower))
    {
        return MatchResult {
            is_match: true,
            exact_match: false,
            score: SCORE_SUBSTRING,
            reason: "substring match",
        };
    }

    MatchResult::no_match()
}

/// Human-readable label for a tier score, used in ambiguity listings.
pub fn quality_label(score: u8) -> &'static str {
    match score {
        SCORE_EXACT => "exact",
        SCORE_CASE_INSENSITIVE => "case-insensitive",
        SCORE_EMOJI_STRIPPED => "emoji-insensitive",
        SCORE_SUBSTRING => "partial",
        _ => "none",
    }
}
