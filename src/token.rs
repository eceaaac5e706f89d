//! Correlation tokens for fire-and-forget dispatch.
//!
//! The remote platform's dispatch endpoint returns no run identifier, so
//! every dispatch carries a short opaque token in its input map. The
//! resulting run echoes the token in its display title as `:<token>`,
//! which lets the correlator recover the run afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved dispatch-input key carrying the correlation token.
pub const RESERVED_INPUT_KEY: &str = "distinct_id";

/// Token length in characters.
pub const TOKEN_LEN: usize = 6;

/// An opaque short identifier, unique per dispatch attempt.
///
/// Generated locally, embedded in the dispatch payload, and discarded
/// once a run is matched or the polling window expires. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Generate a fresh token from a v4 UUID (first `TOKEN_LEN` hex chars).
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..TOKEN_LEN].to_string())
    }

    /// Wrap a known token value. Intended for tests and for re-parsing
    /// tokens out of persisted dispatch records.
    pub fn from_raw(raw: &str) -> Self {
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The delimiter-wrapped form expected in a run's display title.
    pub fn title_marker(&self) -> String {
        format!(":{}", self.0)
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check whether a run display title carries the token.
///
/// The token is matched as `:<token>` followed by a non-alphanumeric
/// boundary (or end of string), never as a bare substring. This keeps a
/// token from spuriously matching issue numbers or longer tokens that
/// happen to embed it.
pub fn title_matches(title: &str, token: &CorrelationToken) -> bool {
    let marker = token.title_marker();
    title.match_indices(&marker).any(|(pos, _)| {
        let end = pos + marker.len();
        title[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── generation ───────────────────────────────────────────────────

    #[test]
    fn generated_token_has_fixed_length() {
        let token = CorrelationToken::generate();
        assert_eq!(token.as_str().len(), TOKEN_LEN);
    }

    #[test]
    fn generated_token_is_lowercase_hex() {
        let token = CorrelationToken::generate();
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!token.as_str().chars().any(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn consecutive_tokens_differ() {
        let a = CorrelationToken::generate();
        let b = CorrelationToken::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn title_marker_is_colon_prefixed() {
        let token = CorrelationToken::from_raw("ab12cd");
        assert_eq!(token.title_marker(), ":ab12cd");
    }

    // ── matching ─────────────────────────────────────────────────────

    #[test]
    fn matches_token_at_end_of_title() {
        let token = CorrelationToken::from_raw("ab12cd");
        assert!(title_matches("feature-x:ab12cd", &token));
    }

    #[test]
    fn matches_token_mid_title() {
        let token = CorrelationToken::from_raw("ab12cd");
        assert!(title_matches("run :ab12cd (retry)", &token));
    }

    #[test]
    fn does_not_match_bare_substring_without_delimiter() {
        let token = CorrelationToken::from_raw("ab12cd");
        assert!(!title_matches("feature-ab12cd", &token));
    }

    #[test]
    fn does_not_match_when_token_is_prefix_of_longer_token() {
        // Searching for "ab12" must not match a title carrying ":ab12cd".
        let shorter = CorrelationToken::from_raw("ab12");
        assert!(!title_matches("feature-x:ab12cd", &shorter));
    }

    #[test]
    fn does_not_match_when_token_is_suffix_of_longer_token() {
        // ":12cd" never appears in "feature-x:ab12cd" because the char
        // before "12cd" is 'b', not ':'.
        let suffix = CorrelationToken::from_raw("12cd");
        assert!(!title_matches("feature-x:ab12cd", &suffix));
    }

    #[test]
    fn does_not_match_numeric_issue_reference() {
        // An issue number elsewhere in the title is not a token.
        let token = CorrelationToken::from_raw("142");
        assert!(!title_matches("Fix issue #142 :8fa3e1", &token));
    }

    #[test]
    fn matches_first_valid_occurrence_among_decoys() {
        let token = CorrelationToken::from_raw("ab12cd");
        // First occurrence is embedded in a longer run of hex, second is valid.
        assert!(title_matches("x:ab12cdef then y:ab12cd", &token));
    }

    #[test]
    fn empty_title_never_matches() {
        let token = CorrelationToken::from_raw("ab12cd");
        assert!(!title_matches("", &token));
    }

    #[test]
    fn boundary_allows_trailing_punctuation() {
        let token = CorrelationToken::from_raw("ab12cd");
        assert!(title_matches("step :ab12cd, queued", &token));
    }

    #[test]
    fn distinct_tokens_never_cross_match() {
        let t1 = CorrelationToken::from_raw("aaaaaa");
        let t2 = CorrelationToken::from_raw("aaaaab");
        assert!(title_matches("x:aaaaab", &t2));
        assert!(!title_matches("x:aaaaab", &t1));
    }
}
