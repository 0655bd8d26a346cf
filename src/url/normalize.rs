use url::form_urlencoded;
use url::Url;

/// Query parameter that marks a pagination variant of a page
pub const PAGE_PARAM: &str = "page";

/// Controls which parts of a URL survive identity normalization
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NormalizePolicy {
    /// Scheme, host and path only
    #[default]
    Identity,

    /// Like `Identity`, but URLs whose stripped identity equals `base` keep
    /// their `page` query parameter, so pagination variants of the base page
    /// stay distinct from each other
    Paginated {
        /// Stripped identity of the configured base URL
        base: String,
    },
}

impl NormalizePolicy {
    /// Builds the pagination policy for the given base URL
    pub fn paginated(base: &Url) -> Self {
        Self::Paginated {
            base: strip_to_identity(base),
        }
    }
}

/// Normalizes a URL string for visited-set membership
///
/// # Normalization Steps
///
/// 1. Parse the URL; malformed input is returned with any fragment and query
///    cut off, so the caller still gets a stable key
/// 2. Remove the fragment
/// 3. Remove the query string, except the `page` parameter when the policy
///    asks for it
///
/// The `url` crate already lowercases the host and resolves dot segments.
///
/// # Examples
///
/// ```
/// use pagefold::url::{normalize, NormalizePolicy};
///
/// let key = normalize("https://Example.com/docs?tab=2#intro", &NormalizePolicy::Identity);
/// assert_eq!(key, "https://example.com/docs");
/// ```
pub fn normalize(url_str: &str, policy: &NormalizePolicy) -> String {
    match Url::parse(url_str.trim()) {
        Ok(url) => normalize_url(&url, policy),
        Err(e) => {
            tracing::trace!("Keeping malformed URL {:?} as its own identity: {}", url_str, e);
            let end = url_str.find(['#', '?']).unwrap_or(url_str.len());
            url_str[..end].trim().to_string()
        }
    }
}

/// Normalizes an already-parsed URL for visited-set membership
pub fn normalize_url(url: &Url, policy: &NormalizePolicy) -> String {
    let identity = strip_to_identity(url);

    match policy {
        NormalizePolicy::Paginated { base } if *base == identity => {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| key.eq_ignore_ascii_case(PAGE_PARAM))
                .map(|(k, v)| (k.to_lowercase(), v.into_owned()))
                .collect();

            if kept.is_empty() {
                return identity;
            }

            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(kept.iter())
                .finish();
            format!("{}?{}", identity, query)
        }
        _ => identity,
    }
}

/// Returns scheme + host (+ port) + path, with no query or fragment
pub fn strip_to_identity(url: &Url) -> String {
    let mut stripped = url.clone();
    stripped.set_fragment(None);
    stripped.set_query(None);
    stripped.to_string()
}
