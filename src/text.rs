//! Char-offset string helpers shared by the anchor builder and resolver.
//!
//! Anchors persist *char* offsets (the JS host works in UTF-16 code units;
//! for BMP text the two coincide, and the layered resolver absorbs any
//! residual difference as ordinary drift). Everything here indexes by char,
//! never by byte, so multi-byte pages cannot produce out-of-boundary slices.

use unicode_segmentation::UnicodeSegmentation;

/// Number of chars in a string (O(n), callers cache where it matters).
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Slice `s` by char offsets, clamping to the string's length.
pub fn char_slice(s: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let mut byte_start = s.len();
    let mut byte_end = s.len();
    for (count, (byte_idx, _)) in s.char_indices().enumerate() {
        if count == start {
            byte_start = byte_idx;
        }
        if count == end {
            byte_end = byte_idx;
            break;
        }
    }
    if byte_start >= byte_end {
        return "";
    }
    &s[byte_start..byte_end]
}

/// Char index of the first occurrence of `needle` in `haystack`.
pub fn char_index_of(haystack: &str, needle: &str) -> Option<usize> {
    let byte_idx = haystack.find(needle)?;
    Some(haystack[..byte_idx].chars().count())
}

/// Convert a byte offset into `s` to a char offset.
pub fn char_offset_at(s: &str, byte_idx: usize) -> usize {
    s[..byte_idx].chars().count()
}

/// Context window of at most `max` chars ending at char offset `pos`,
/// trimmed back so it never begins mid-grapheme-cluster.
pub fn window_before(s: &str, pos: usize, max: usize) -> String {
    let start = pos.saturating_sub(max);
    trim_severed_cluster(char_slice(s, start, pos))
}

/// Context window of at most `max` chars starting at char offset `pos`.
pub fn window_after(s: &str, pos: usize, max: usize) -> String {
    trim_severed_cluster(char_slice(s, pos, pos + max))
}

/// Drop a leading partial grapheme cluster. A window cut at an arbitrary
/// char offset can begin with a combining mark; comparing such a fragment
/// inflates edit distance for no signal.
fn trim_severed_cluster(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let clusters: Vec<&str> = s.graphemes(true).collect();
    let first = clusters[0];
    if first.chars().next().is_some_and(is_combining_mark) {
        return clusters[1..].concat();
    }
    s.to_string()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}' | '\u{1AB0}'..='\u{1AFF}' | '\u{20D0}'..='\u{20FF}')
}

/// True when a string holds no visible text (whitespace-only text nodes are
/// skipped when locating wrap targets).
pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_slice_ascii() {
        assert_eq!(char_slice("The quick brown fox", 4, 9), "quick");
        assert_eq!(char_slice("abc", 0, 3), "abc");
        assert_eq!(char_slice("abc", 2, 10), "c");
        assert_eq!(char_slice("abc", 5, 9), "");
        assert_eq!(char_slice("abc", 2, 2), "");
    }

    #[test]
    fn test_char_slice_multibyte() {
        let s = "héllo wörld";
        assert_eq!(char_slice(s, 0, 5), "héllo");
        assert_eq!(char_slice(s, 6, 11), "wörld");
    }

    #[test]
    fn test_char_index_of() {
        assert_eq!(char_index_of("The quick fox", "quick"), Some(4));
        assert_eq!(char_index_of("héllo wörld", "wörld"), Some(6));
        assert_eq!(char_index_of("abc", "zz"), None);
    }

    #[test]
    fn test_windows() {
        let s = "The quick brown fox";
        assert_eq!(window_before(s, 4, 20), "The ");
        assert_eq!(window_after(s, 9, 20), " brown fox");
        assert_eq!(window_before(s, 4, 2), "e ");
        assert_eq!(window_after(s, 9, 3), " br");
    }

    #[test]
    fn test_window_before_start_of_text() {
        assert_eq!(window_before("abc", 0, 20), "");
    }

    #[test]
    fn test_window_does_not_sever_cluster() {
        // "e" + combining acute at char offsets 3..5
        let s = "abce\u{0301}fg";
        // A window starting inside the cluster drops the orphaned mark.
        let w = window_after(s, 4, 3);
        assert!(!w.starts_with('\u{0301}'));
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank("  \n\t "));
        assert!(!is_blank(" x "));
    }
}
