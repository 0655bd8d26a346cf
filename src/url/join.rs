use url::form_urlencoded;
use url::Url;

/// Resolves a link reference against a base URL, carrying query state along
///
/// Plain RFC 3986 resolution drops the base's query string whenever the
/// reference has a path. Sites that keep state in query parameters (pagination
/// tokens, version selectors) lose it that way, so the query parameters of the
/// base and of the resolved URL are unioned:
///
/// - base parameters come first, in their original order
/// - resolved-URL parameters override base values on key collision
/// - new keys from the resolved URL are appended
///
/// The merged query is re-encoded as `application/x-www-form-urlencoded`.
///
/// Returns `None` for references that cannot be resolved or that leave the
/// web (`mailto:`, `javascript:`, `tel:`, `data:` and friends).
///
/// # Examples
///
/// ```
/// use pagefold::url::join;
/// use url::Url;
///
/// let base = Url::parse("https://x.com/a?p=1").unwrap();
/// let joined = join(&base, "/a?q=2").unwrap();
/// assert_eq!(joined.as_str(), "https://x.com/a?p=1&q=2");
/// ```
pub fn join(base: &Url, reference: &str) -> Option<Url> {
    let resolved = match base.join(reference.trim()) {
        Ok(url) => url,
        Err(e) => {
            tracing::trace!("Could not resolve {:?} against {}: {}", reference, base, e);
            return None;
        }
    };

    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }

    Some(merge_query(base, resolved))
}

fn merge_query(base: &Url, mut resolved: Url) -> Url {
    let mut merged: Vec<(String, String)> = Vec::new();
    let base_pairs = base.query_pairs().into_owned();
    let resolved_pairs: Vec<(String, String)> = resolved.query_pairs().into_owned().collect();

    for (key, value) in base_pairs.chain(resolved_pairs) {
        match merged.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => merged.push((key, value)),
        }
    }

    if merged.is_empty() {
        return resolved;
    }

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(merged.iter())
        .finish();
    resolved.set_query(Some(&query));
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_merges_both_queries() {
        let joined = join(&base("https://x/a?p=1"), "/a?q=2").unwrap();
        let pairs: Vec<(String, String)> = joined.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("p".to_string(), "1".to_string())));
        assert!(pairs.contains(&("q".to_string(), "2".to_string())));
    }

    #[test]
    fn test_resolved_value_wins_on_collision() {
        let joined = join(&base("https://x.com/list?page=1&lang=en"), "?page=2").unwrap();
        assert_eq!(joined.as_str(), "https://x.com/list?page=2&lang=en");
    }

    #[test]
    fn test_base_query_carried_to_plain_relative_link() {
        let joined = join(&base("https://x.com/docs/intro?version=3"), "setup").unwrap();
        assert_eq!(joined.as_str(), "https://x.com/docs/setup?version=3");
    }

    #[test]
    fn test_no_queries_anywhere() {
        let joined = join(&base("https://x.com/docs/"), "../blog/post").unwrap();
        assert_eq!(joined.as_str(), "https://x.com/blog/post");
    }

    #[test]
    fn test_absolute_reference_to_other_host() {
        let joined = join(&base("https://x.com/"), "https://other.org/page").unwrap();
        assert_eq!(joined.as_str(), "https://other.org/page");
    }

    #[test]
    fn test_fragment_is_kept() {
        let joined = join(&base("https://x.com/a?p=1"), "/b#part").unwrap();
        assert_eq!(joined.as_str(), "https://x.com/b?p=1#part");
    }

    #[test]
    fn test_query_is_reencoded() {
        let joined = join(&base("https://x.com/?q=a b"), "/s?t=%2F").unwrap();
        assert_eq!(joined.as_str(), "https://x.com/s?q=a+b&t=%2F");
    }

    #[test]
    fn test_non_web_schemes_are_dropped() {
        let b = base("https://x.com/");
        assert!(join(&b, "mailto:a@x.com").is_none());
        assert!(join(&b, "javascript:void(0)").is_none());
        assert!(join(&b, "tel:+123").is_none());
        assert!(join(&b, "data:text/plain,hi").is_none());
    }

    #[test]
    fn test_unresolvable_reference() {
        assert!(join(&base("https://x.com/"), "http://[::1").is_none());
    }
}
