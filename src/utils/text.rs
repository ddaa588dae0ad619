//! Small text helpers shared by the ledger and prompt layers.

/// Levenshtein edit distance over chars, two-row DP.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized similarity in `[0, 1]`: 1.0 for identical strings, 0.0 when
/// nothing matches. Both sides are compared as-is; callers lowercase first.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Preferred mention handle: `@username` when present, otherwise the
/// lowercased first name.
pub fn handle(first_name: Option<&str>, username: Option<&str>) -> String {
    match username {
        Some(u) if !u.is_empty() => {
            if u.starts_with('@') {
                u.to_string()
            } else {
                format!("@{}", u)
            }
        }
        _ => first_name.unwrap_or_default().to_lowercase(),
    }
}

/// Collapse runs of spaces into one.
pub fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_space = false;
    for c in text.chars() {
        if c == ' ' {
            if !prev_space {
                out.push(c);
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out
}

/// Truncate to at most `max` chars, appending an ellipsis when clipped.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_similar() {
        assert_eq!(similarity_ratio("diogo", "diogo"), 1.0);
    }

    #[test]
    fn disjoint_strings_are_not() {
        assert!(similarity_ratio("abc", "xyz") < 0.1);
    }

    #[test]
    fn close_names_pass_default_threshold() {
        // One substitution in a six-char name.
        assert!(similarity_ratio("renato", "renata") >= 0.8);
        assert!(similarity_ratio("ana", "bruno") < 0.8);
    }

    #[test]
    fn empty_vs_empty() {
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("", "abc"), 0.0);
    }

    #[test]
    fn handle_prefers_username() {
        assert_eq!(handle(Some("Ana"), Some("ana_s")), "@ana_s");
        assert_eq!(handle(Some("Ana"), Some("@ana_s")), "@ana_s");
        assert_eq!(handle(Some("Ana"), None), "ana");
        assert_eq!(handle(None, None), "");
    }

    #[test]
    fn spaces_collapse() {
        assert_eq!(collapse_spaces("a  b   c"), "a b c");
    }

    #[test]
    fn truncation_marks_clipped_text() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello world", 5), "hello…");
    }
}
