//! Mime allow-list matching
//!
//! A pattern containing `*` is a wildcard matched against the whole mime type,
//! `*` standing for any run of characters. Any other pattern must equal the
//! mime type exactly.

use regex::Regex;

/// Whether `mime_type` matches any of `patterns`.
pub fn is_mime_allowed<S: AsRef<str>>(patterns: &[S], mime_type: &str) -> bool {
    patterns
        .iter()
        .any(|pattern| pattern_matches(pattern.as_ref(), mime_type))
}

fn pattern_matches(pattern: &str, mime_type: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == mime_type;
    }

    let expression = format!(
        "^{}$",
        pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*")
    );

    match Regex::new(&expression) {
        Ok(re) => re.is_match(mime_type),
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "Ignoring invalid mime pattern");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(is_mime_allowed(&["image/png"], "image/png"));
        assert!(!is_mime_allowed(&["image/png"], "image/jpeg"));
        assert!(!is_mime_allowed(&["image/png"], "image/png+extra"));
    }

    #[test]
    fn test_wildcard_match() {
        let patterns = vec!["image/*".to_string()];
        assert!(is_mime_allowed(&patterns, "image/jpeg"));
        assert!(is_mime_allowed(&patterns, "image/svg+xml"));
        assert!(!is_mime_allowed(&patterns, "video/mp4"));
        assert!(!is_mime_allowed(&patterns, "x-image/png"));
    }

    #[test]
    fn test_dots_are_literal() {
        assert!(is_mime_allowed(&["application/vnd.*"], "application/vnd.ms-excel"));
        assert!(!is_mime_allowed(&["video/x.*"], "video/xy-test"));
    }

    #[test]
    fn test_empty_list_rejects() {
        let patterns: Vec<String> = Vec::new();
        assert!(!is_mime_allowed(&patterns, "image/png"));
        assert!(is_mime_allowed(&["*"], "anything/at-all"));
    }
}
