//! Context snippets for summary list entries
//!
//! A snippet is a grapheme window around one match, with ellipsis markers
//! where it was cut and every `@handle` inside it emphasized.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::scanner::MentionPattern;

/// One run of snippet text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetSegment {
    pub text: String,
    pub emphasized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snippet {
    pub segments: Vec<SnippetSegment>,
}

impl Snippet {
    /// Build the snippet for the match at `span` (byte range) in `text`
    pub fn around(
        text: &str,
        start: usize,
        len: usize,
        radius: usize,
        ellipsis: &str,
        pattern: &MentionPattern,
    ) -> Snippet {
        let end = (start + len).min(text.len());
        let (Some(before), Some(matched), Some(after)) = (text.get(..start), text.get(start..end), text.get(end..)) else {
            return Snippet::plain(&collapse_whitespace(text), pattern);
        };

        let head: Vec<&str> = before.graphemes(true).collect();
        let tail: Vec<&str> = after.graphemes(true).collect();
        let head_cut = head.len() > radius;
        let tail_cut = tail.len() > radius;

        let mut window = String::new();
        if head_cut {
            window.push_str(ellipsis);
        }
        window.extend(head[head.len().saturating_sub(radius)..].iter().copied());
        window.push_str(matched);
        window.extend(tail[..tail.len().min(radius)].iter().copied());
        if tail_cut {
            window.push_str(ellipsis);
        }

        Snippet::plain(&collapse_whitespace(&window), pattern)
    }

    /// Split `text` into plain and emphasized runs
    pub fn plain(text: &str, pattern: &MentionPattern) -> Snippet {
        let mut segments = Vec::new();
        let mut cursor = 0;
        for offset in pattern.find_offsets(text) {
            if offset > cursor {
                segments.push(SnippetSegment {
                    text: text[cursor..offset].to_string(),
                    emphasized: false,
                });
            }
            let end = offset + pattern.match_len();
            segments.push(SnippetSegment {
                text: text[offset..end].to_string(),
                emphasized: true,
            });
            cursor = end;
        }
        if cursor < text.len() {
            segments.push(SnippetSegment {
                text: text[cursor..].to_string(),
                emphasized: false,
            });
        }
        Snippet { segments }
    }

    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn emphasized(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter(|s| s.emphasized).map(|s| s.text.as_str())
    }
}

/// Collapse whitespace runs to single spaces and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Handle;

    fn pattern() -> MentionPattern {
        MentionPattern::new(&Handle::parse("alice").unwrap()).unwrap()
    }

    #[test]
    fn test_short_text_is_not_truncated() {
        let s = Snippet::around("thanks @alice!", 7, 6, 30, "...", &pattern());
        assert_eq!(s.text(), "thanks @alice!");
        assert_eq!(s.emphasized().collect::<Vec<_>>(), vec!["@alice"]);
    }

    #[test]
    fn test_long_text_gets_ellipses() {
        let text = format!("{} @alice {}", "a".repeat(50), "b".repeat(50));
        let s = Snippet::around(&text, 51, 6, 30, "...", &pattern());
        let out = s.text();
        assert!(out.starts_with("..."));
        assert!(out.ends_with("..."));
        assert_eq!(out, format!("...{} @alice {}...", "a".repeat(29), "b".repeat(29)));
    }

    #[test]
    fn test_window_counts_graphemes() {
        let text = format!("{}@alice", "e\u{301}".repeat(5));
        let s = Snippet::around(&text, text.len() - 6, 6, 3, "...", &pattern());
        assert_eq!(s.text(), format!("...{}@alice", "e\u{301}".repeat(3)));
    }

    #[test]
    fn test_whitespace_collapsed_and_all_matches_emphasized() {
        let s = Snippet::around("  @alice\n\n and   @ALICE  ", 2, 6, 30, "...", &pattern());
        assert_eq!(s.text(), "@alice and @ALICE");
        assert_eq!(s.emphasized().count(), 2);
        assert!(!s.segments[1].emphasized);
    }
}
