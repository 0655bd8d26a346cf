//! File names for exported documents

use url::Url;
use uuid::Uuid;

/// Longest title component kept in a file name, in characters
const MAX_TITLE_CHARS: usize = 60;

/// Longest URL component kept in a file name, in characters
const MAX_SOURCE_CHARS: usize = 80;

/// Builds `{title}_{url}_{id}.{extension}` for an exported page
///
/// Both the title and the URL are sanitized, and a random 8-hex-digit suffix
/// keeps pages with the same title and path apart.
///
/// # Examples
///
/// ```
/// use pagefold::output::document_file_name;
/// use url::Url;
///
/// let url = Url::parse("https://docs.example.com/guide/intro").unwrap();
/// let name = document_file_name(Some("Getting Started"), &url, "pdf");
/// assert!(name.starts_with("Getting_Started_docs.example.com_guide_intro_"));
/// assert!(name.ends_with(".pdf"));
/// ```
pub fn document_file_name(title: Option<&str>, url: &Url, extension: &str) -> String {
    let title = title
        .map(|t| sanitize_component(t, MAX_TITLE_CHARS))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "untitled".to_string());

    let source = format!("{}{}", url.host_str().unwrap_or_default(), url.path());
    let source = sanitize_component(&source, MAX_SOURCE_CHARS);

    format!("{}_{}_{}.{}", title, source, short_id(), extension)
}

/// Replaces everything but ASCII letters, digits, `-` and `.` with `_`
///
/// Runs of `_` are collapsed and leading or trailing `_` and `.` trimmed.
pub fn sanitize_component(text: &str, max_chars: usize) -> String {
    let mut sanitized = String::with_capacity(text.len());
    let mut last_was_sep = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            sanitized.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            sanitized.push('_');
            last_was_sep = true;
        }
    }

    let trimmed: String = sanitized
        .trim_matches(|c| c == '_' || c == '.')
        .chars()
        .take(max_chars)
        .collect();
    trimmed.trim_end_matches(|c| c == '_' || c == '.').to_string()
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("Hello, World!", 60), "Hello_World");
        assert_eq!(sanitize_component("a/b//c", 60), "a_b_c");
        assert_eq!(sanitize_component("../etc/passwd", 60), "etc_passwd");
        assert_eq!(sanitize_component("Über Café", 60), "ber_Caf");
        assert_eq!(sanitize_component("***", 60), "");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "word ".repeat(40);
        let sanitized = sanitize_component(&long, 20);
        assert!(sanitized.chars().count() <= 20);
        assert!(!sanitized.ends_with('_'));
    }

    #[test]
    fn test_document_file_name_shape() {
        let url = Url::parse("https://example.com/docs/a?b=c").unwrap();
        let name = document_file_name(Some("API / Reference"), &url, "html");

        let stem = name.strip_suffix(".html").unwrap();
        let (prefix, id) = stem.rsplit_once('_').unwrap();
        assert_eq!(prefix, "API_Reference_example.com_docs_a");
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_missing_title() {
        let url = Url::parse("https://example.com/").unwrap();
        assert!(document_file_name(None, &url, "pdf").starts_with("untitled_example.com_"));
        assert!(document_file_name(Some("!!!"), &url, "pdf").starts_with("untitled_"));
    }

    #[test]
    fn test_names_are_unique() {
        let url = Url::parse("https://example.com/same").unwrap();
        let a = document_file_name(Some("Same"), &url, "pdf");
        let b = document_file_name(Some("Same"), &url, "pdf");
        assert_ne!(a, b);
    }
}
