//! URL identity, scope and extension rules shared by the crawler and the
//! result merger.

use crate::error::{Result, ScanError};
use url::{Position, Url};

/// Reduce a URL to `scheme://authority/path` with trailing slashes removed.
///
/// Query and fragment never survive. The result is the identity key for the
/// crawler's visited/failed sets, so `https://x.com/a/?q=1#f` and
/// `https://x.com/a` collapse to the same entry.
pub fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed[..Position::AfterPath].trim_end_matches('/').to_string(),
        Err(_) => {
            let end = url.find(['?', '#']).unwrap_or(url.len());
            url[..end].trim_end_matches('/').to_string()
        }
    }
}

/// True when the final path segment carries no file extension.
///
/// Exactly one trailing slash is ignored, so `/data/` and `/data` are treated
/// the same. A segment made only of leading dots (`.well-known`) has no
/// extension; a trailing dot (`data.`) does.
pub fn has_no_extension(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => return false,
    };

    let path = path.strip_suffix('/').unwrap_or(&path);
    let segment = path.rsplit('/').next().unwrap_or("");
    !segment.trim_start_matches('.').contains('.')
}

/// True for `http` and `https` URLs.
pub fn is_http_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Scope is a plain string prefix of the starting URL, not a host match.
pub fn is_in_scope(url: &str, base_url: &str) -> bool {
    url.starts_with(base_url)
}

/// Resolve an anchor `href` against the page it was found on.
pub fn resolve_link(current_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let base = Url::parse(current_url).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Validate a user supplied starting URL.
///
/// The scheme must be present and be http(s), and there must be a host.
pub fn validate_base_url(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ScanError::InvalidUrl("URL is empty".to_string()));
    }

    if !trimmed.starts_with("http") {
        return Err(ScanError::InvalidUrl(format!(
            "'{}' has no protocol, include http:// or https://",
            trimmed
        )));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| ScanError::InvalidUrl(format!("'{}': {}", trimmed, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ScanError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ScanError::InvalidUrl(format!("'{}' has no host", trimmed)));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_query_fragment_and_slash() {
        assert_eq!(normalize_url("https://x.com/a/?q=1#frag"), "https://x.com/a");
    }

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize_url("https://x.com/"), "https://x.com");
        assert_eq!(normalize_url("https://x.com"), "https://x.com");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "https://x.com/a/?q=1#frag",
            "http://x.com:8080/a/b//",
            "https://user@x.com/path",
            "https://x.com",
            "not a url/?x",
        ];
        for sample in samples {
            let once = normalize_url(sample);
            assert_eq!(normalize_url(&once), once, "not idempotent for {}", sample);
        }
    }

    #[test]
    fn test_normalize_keeps_port() {
        assert_eq!(normalize_url("http://127.0.0.1:8080/about/"), "http://127.0.0.1:8080/about");
    }

    #[test]
    fn test_extension_filter() {
        assert!(has_no_extension("https://x.com/data"));
        assert!(!has_no_extension("https://x.com/data.csv"));
        assert_eq!(
            has_no_extension("https://x.com/data/"),
            has_no_extension("https://x.com/data")
        );
    }

    #[test]
    fn test_extension_filter_root_and_dirs() {
        assert!(has_no_extension("https://x.com/"));
        assert!(has_no_extension("https://x.com"));
        assert!(has_no_extension("https://x.com/v1.2/items"));
        assert!(!has_no_extension("https://x.com/report.pdf/"));
    }

    #[test]
    fn test_extension_filter_dotfiles() {
        assert!(has_no_extension("https://x.com/.well-known"));
        assert!(!has_no_extension("https://x.com/data."));
    }

    #[test]
    fn test_extension_filter_ignores_query() {
        assert!(has_no_extension("https://x.com/search?file=a.csv"));
    }

    #[test]
    fn test_scope_is_string_prefix() {
        let base = "https://open.dosm.gov.my/";
        assert!(is_in_scope("https://open.dosm.gov.my/dashboard", base));
        assert!(!is_in_scope("https://evil.com/x", base));
        assert!(!is_in_scope("http://open.dosm.gov.my/dashboard", base));
    }

    #[test]
    fn test_resolve_relative_link() {
        assert_eq!(
            resolve_link("https://x.com/a/b", "../c"),
            Some("https://x.com/c".to_string())
        );
        assert_eq!(
            resolve_link("https://x.com/a/", "/about"),
            Some("https://x.com/about".to_string())
        );
        assert_eq!(resolve_link("https://x.com/", ""), None);
    }

    #[test]
    fn test_resolve_keeps_non_http_schemes_for_caller() {
        let resolved = resolve_link("https://x.com/", "mailto:a@x.com").unwrap();
        assert!(!is_http_url(&resolved));
    }

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("https://example.com").is_ok());
        assert!(validate_base_url("  http://example.com/  ").is_ok());
        assert!(matches!(
            validate_base_url("example.com"),
            Err(ScanError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_base_url(""),
            Err(ScanError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_base_url("httpx://example.com"),
            Err(ScanError::InvalidUrl(_))
        ));
    }
}
