use std::borrow::Cow;

/// Prefix of at most `max_chars` characters, cut on a UTF-8 boundary.
pub fn prefix_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Shortened form for log lines: the first `n` characters, with the number
/// of dropped characters appended when anything was cut.
pub fn first_n_chars_lossy(s: &str, n: usize) -> Cow<'_, str> {
    let head = prefix_chars(s, n);
    if head.len() == s.len() {
        Cow::Borrowed(s)
    } else {
        let dropped = s[head.len()..].chars().count();
        Cow::Owned(format!("{}… (+{} chars)", head, dropped))
    }
}

/// Single-line preview of model output, newlines flattened.
pub fn one_line_preview(s: &str, n: usize) -> String {
    first_n_chars_lossy(s.trim(), n).replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_respects_char_boundaries() {
        assert_eq!(prefix_chars("héllo", 2), "hé");
        assert_eq!(prefix_chars("hi", 10), "hi");
    }

    #[test]
    fn test_lossy_preview_marks_truncation() {
        assert_eq!(first_n_chars_lossy("short", 10), "short");
        assert_eq!(first_n_chars_lossy("abcdef", 3), "abc… (+3 chars)");
    }

    #[test]
    fn test_one_line_preview_flattens_newlines() {
        assert_eq!(one_line_preview("  <div>\nHi</div>\n", 40), "<div> Hi</div>");
    }
}
