//! Normalized Levenshtein similarity.
//!
//! `1 - distance / max(len)`, unit costs, no transposition. Inputs are
//! context windows (tens of chars), so the two-row DP is plenty.

/// Edit distance between two strings, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=a.len()).collect();
    let mut current = vec![0usize; a.len() + 1];

    for (i, bc) in b.iter().enumerate() {
        current[0] = i + 1;
        for (j, ac) in a.iter().enumerate() {
            let substitution = prev[j] + usize::from(ac != bc);
            current[j + 1] = substitution
                .min(prev[j + 1] + 1) // deletion
                .min(current[j] + 1); // insertion
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[a.len()]
}

/// Similarity in [0, 1]. Two empty strings are identical (1.0); exactly one
/// empty string shares nothing (0.0).
pub fn similarity(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 && len_b == 0 {
        return 1.0;
    }
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }
    let distance = levenshtein(a, b);
    1.0 - (distance as f64 / len_a.max(len_b) as f64)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        assert_eq!(similarity("hello", "hello"), 1.0);
    }

    #[test]
    fn test_both_empty() {
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_one_empty() {
        assert_eq!(similarity("abc", ""), 0.0);
        assert_eq!(similarity("", "abc"), 0.0);
    }

    #[test]
    fn test_kitten_sitting() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        let s = similarity("kitten", "sitting");
        assert!((s - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn test_symmetry() {
        assert_eq!(levenshtein("flaw", "lawn"), levenshtein("lawn", "flaw"));
        assert_eq!(similarity("abcd", "abxd"), similarity("abxd", "abcd"));
    }

    #[test]
    fn test_multibyte_counts_chars_not_bytes() {
        // One substitution in a 5-char string, regardless of byte widths.
        assert_eq!(levenshtein("héllo", "hèllo"), 1);
        assert!((similarity("héllo", "hèllo") - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_bounds() {
        for (a, b) in [("a", "zzzz"), ("same", "same"), ("", "x"), ("ab", "ba")] {
            let s = similarity(a, b);
            assert!((0.0..=1.0).contains(&s), "{} vs {} -> {}", a, b, s);
        }
    }
}
