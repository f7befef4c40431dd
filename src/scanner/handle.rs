//! Viewer handle and the `@handle` text pattern
//!
//! Handles follow a fixed grammar: 1-39 ASCII alphanumerics or internal
//! hyphens, never starting or ending with a hyphen. Matching is literal
//! (Aho-Corasick, ASCII case-insensitive), so no user input ever reaches a
//! regex compiler.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EngineError, Result};

/// Maximum handle length
pub const MAX_HANDLE_LEN: usize = 39;

// =============================================================================
// Handle
// =============================================================================

/// A validated viewer handle (without the leading `@`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Handle(String);

impl Handle {
    pub fn parse(raw: &str) -> Result<Handle> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_HANDLE_LEN
            && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !raw.starts_with('-')
            && !raw.ends_with('-');
        if valid {
            Ok(Handle(raw.to_string()))
        } else {
            Err(EngineError::InvalidHandle(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The visible mention form, `@handle`
    pub fn mention_text(&self) -> String {
        format!("@{}", self.0)
    }

    /// True when `text` is exactly `@handle` (ASCII case-insensitive)
    pub fn is_mention_text(&self, text: &str) -> bool {
        text.strip_prefix('@')
            .is_some_and(|rest| rest.eq_ignore_ascii_case(&self.0))
    }

    /// True when `segment` names this handle (ASCII case-insensitive)
    pub fn is_same(&self, segment: &str) -> bool {
        segment.eq_ignore_ascii_case(&self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Handle {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Handle::parse(&value)
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> String {
        handle.0
    }
}

// =============================================================================
// MentionPattern
// =============================================================================

/// Finds `@handle` occurrences in plain text
#[derive(Debug, Clone)]
pub struct MentionPattern {
    automaton: AhoCorasick,
    needle_len: usize,
}

impl MentionPattern {
    pub fn new(handle: &Handle) -> Result<Self> {
        let needle = handle.mention_text();
        let automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostFirst)
            .ascii_case_insensitive(true)
            .build([needle.as_str()])
            .map_err(|e| EngineError::Config(format!("Failed to build mention automaton: {}", e)))?;
        Ok(Self {
            automaton,
            needle_len: needle.len(),
        })
    }

    /// Byte length of a match (`@` plus the handle)
    pub fn match_len(&self) -> usize {
        self.needle_len
    }

    /// Cheap containment test used before boundary checks
    pub fn is_candidate(&self, text: &str) -> bool {
        self.automaton.is_match(text)
    }

    /// Byte offsets of every terminated occurrence, left to right
    pub fn find_offsets(&self, text: &str) -> Vec<usize> {
        self.automaton
            .find_iter(text)
            .filter(|m| is_terminated(&text[m.end()..]))
            .map(|m| m.start())
            .collect()
    }
}

/// Handle-grammar-aware terminating boundary.
///
/// The occurrence ends a handle unless the next character continues a word
/// (alphanumeric or `_`), or is a hyphen followed by an alphanumeric, which
/// would make it a longer, different handle (`@alice-bob` is not `@alice`).
fn is_terminated(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_alphanumeric() || c == '_' => false,
        Some('-') => !chars.next().is_some_and(|c| c.is_ascii_alphanumeric()),
        Some(_) => true,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(handle: &str) -> MentionPattern {
        MentionPattern::new(&Handle::parse(handle).unwrap()).unwrap()
    }

    #[test]
    fn test_handle_grammar() {
        assert!(Handle::parse("alice").is_ok());
        assert!(Handle::parse("a").is_ok());
        assert!(Handle::parse("alice-bob").is_ok());
        assert!(Handle::parse(&"a".repeat(39)).is_ok());

        assert!(Handle::parse("").is_err());
        assert!(Handle::parse("-alice").is_err());
        assert!(Handle::parse("alice-").is_err());
        assert!(Handle::parse("al ice").is_err());
        assert!(Handle::parse("al.ice").is_err());
        assert!(Handle::parse(&"a".repeat(40)).is_err());
    }

    #[test]
    fn test_single_mention_offset() {
        let p = pattern("alice");
        assert_eq!(p.find_offsets("cc @alice please"), vec![3]);
        assert_eq!(p.match_len(), 6);
    }

    #[test]
    fn test_longer_handle_is_not_a_match() {
        let p = pattern("alice");
        assert_eq!(p.find_offsets("@alice2 mentioned @alice"), vec![18]);
        assert!(p.find_offsets("@alice_x").is_empty());
        assert!(p.find_offsets("@alice-bob").is_empty());
    }

    #[test]
    fn test_punctuation_terminates() {
        let p = pattern("alice");
        assert_eq!(p.find_offsets("@alice, @alice. (@alice) @alice- x"), vec![0, 8, 17, 25]);
    }

    #[test]
    fn test_case_insensitive() {
        let p = pattern("alice");
        assert_eq!(p.find_offsets("Hey @ALICE and @Alice"), vec![4, 15]);
    }

    #[test]
    fn test_hyphenated_handle() {
        let p = pattern("bob-smith");
        assert_eq!(p.find_offsets("thanks @bob-smith!"), vec![7]);
        assert!(p.find_offsets("@bob-smithers").is_empty());
    }

    #[test]
    fn test_mention_text_comparison() {
        let h = Handle::parse("Alice").unwrap();
        assert!(h.is_mention_text("@alice"));
        assert!(!h.is_mention_text("alice"));
        assert!(!h.is_mention_text("@alice2"));
    }

    #[test]
    fn test_serde_validates() {
        let ok: Handle = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(ok.as_str(), "alice");
        assert!(serde_json::from_str::<Handle>("\"-bad\"").is_err());
    }
}
