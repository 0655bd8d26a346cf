use super::normalize::{strip_to_identity, PAGE_PARAM};
use url::Url;

/// Returns the `host + path` string that allow-list prefixes are matched against
///
/// # Examples
///
/// ```
/// use pagefold::url::host_and_path;
/// use url::Url;
///
/// let url = Url::parse("https://docs.example.com:8443/guide/intro?x=1").unwrap();
/// assert_eq!(host_and_path(&url), "docs.example.com/guide/intro");
/// ```
pub fn host_and_path(url: &Url) -> String {
    format!("{}{}", url.host_str().unwrap_or(""), url.path())
}

/// Checks a URL against an allow-list of `host + path` prefixes
///
/// The match is a case-sensitive string prefix match, not a domain-suffix
/// match: `"docs.example.com"` allows `docs.example.com/anything` but not
/// `api.docs.example.com`. An empty allow-list allows everything.
///
/// # Examples
///
/// ```
/// use pagefold::url::matches_allowed;
/// use url::Url;
///
/// let prefixes = vec!["docs.example.com/guide".to_string()];
/// let inside = Url::parse("https://docs.example.com/guide/setup").unwrap();
/// let outside = Url::parse("https://docs.example.com/blog").unwrap();
///
/// assert!(matches_allowed(&inside, &prefixes));
/// assert!(!matches_allowed(&outside, &prefixes));
/// assert!(matches_allowed(&outside, &[]));
/// ```
pub fn matches_allowed(url: &Url, prefixes: &[String]) -> bool {
    if prefixes.is_empty() {
        return true;
    }

    let target = host_and_path(url);
    prefixes
        .iter()
        .any(|prefix| target.starts_with(prefix.as_str()))
}

/// Returns true if the URL carries a `page` query parameter (any key casing)
pub fn has_page_param(url: &Url) -> bool {
    url.query_pairs()
        .any(|(key, _)| key.eq_ignore_ascii_case(PAGE_PARAM))
}

/// Classifies a candidate link as a pagination variant of the base page
///
/// A pagination link must satisfy all of:
///
/// 1. its host is allowed: it passes the allow-list, or, with no allow-list,
///    it shares the base URL's host
/// 2. it has a `page` query parameter
/// 3. its scheme + host + path equal the configured base URL's
///
/// Paginated sections elsewhere on the site are ordinary links.
pub fn is_pagination_link(candidate: &Url, base: &Url, prefixes: &[String]) -> bool {
    let host_allowed = if prefixes.is_empty() {
        candidate.host_str() == base.host_str()
    } else {
        matches_allowed(candidate, prefixes)
    };

    host_allowed && has_page_param(candidate) && strip_to_identity(candidate) == strip_to_identity(base)
}
