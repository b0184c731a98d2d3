//! URL normalization for the knowledge source registry (spec §4.6).

use url::Url;

/// Normalize `raw` for uniqueness: strip the fragment, drop tracking query
/// params (`utm_*`, `ref`), and collapse a trailing slash (the root path
/// `/` is left alone). URLs that fail to parse pass through unchanged.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    url.set_fragment(None);

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.starts_with("utm_") && key != "ref")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if retained.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&retained);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    url.to_string()
}

/// The hostname component of a URL, used in the contextual chunk header.
/// Falls back to the raw URL if it can't be parsed.
pub fn hostname(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fragment_and_tracking_params() {
        let normalized = normalize_url("https://example.com/post?utm_source=x&ref=y&id=5#section");
        assert_eq!(normalized, "https://example.com/post?id=5");
    }

    #[test]
    fn collapses_trailing_slash_but_keeps_root() {
        assert_eq!(normalize_url("https://example.com/docs/"), "https://example.com/docs");
        assert_eq!(normalize_url("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn non_parseable_url_passes_through() {
        assert_eq!(normalize_url("not a url"), "not a url");
    }

    #[test]
    fn hostname_extracts_host() {
        assert_eq!(hostname("https://react.dev/learn"), "react.dev");
    }
}
