use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (mailto:, tel:, data: and similar), it returns None.
///
/// # Arguments
///
/// * `url` - The URL to extract the domain from
///
/// # Returns
///
/// * `Some(String)` - The lowercase domain/host
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use tapmap::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}

/// Returns the key used to scope per-site state (rate buckets, robots.txt)
///
/// The key is `host` or `host:port` when a non-default port is present, so two
/// services on the same host but different ports are kept apart.
pub fn site_key(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Checks whether two URLs belong to the same crawlable site
///
/// Same scheme-independent host and effective port. Subdomains are distinct
/// sites: `www.example.com` and `example.com` do not match.
pub fn is_same_site(a: &Url, b: &Url) -> bool {
    site_key(a).is_some() && site_key(a) == site_key(b)
}

/// Checks whether a target URL is external to the scan's root domain
///
/// Exact host comparison, no subdomain equivalence. URLs without a host
/// (mailto:, tel:) never equal the root domain and count as external.
pub fn is_external(target: &Url, root_domain: &str) -> bool {
    extract_domain(target).as_deref() != Some(root_domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_uppercase_converted_to_lowercase() {
        let url = Url::parse("https://Example.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_mailto_has_no_domain() {
        let url = Url::parse("mailto:safety@example.com").unwrap();
        assert_eq!(extract_domain(&url), None);
    }

    #[test]
    fn test_site_key_includes_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/page").unwrap();
        assert_eq!(site_key(&url), Some("127.0.0.1:8080".to_string()));

        let url = Url::parse("https://example.com:443/page").unwrap();
        assert_eq!(site_key(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_same_site() {
        let a = Url::parse("https://example.com/a").unwrap();
        let b = Url::parse("http://example.com/b").unwrap();
        let c = Url::parse("https://www.example.com/a").unwrap();
        let d = Url::parse("https://example.com:8443/a").unwrap();

        assert!(is_same_site(&a, &b));
        assert!(!is_same_site(&a, &c));
        assert!(!is_same_site(&a, &d));
    }

    #[test]
    fn test_is_external_exact_match_only() {
        let same = Url::parse("https://brand.com/isi").unwrap();
        let sub = Url::parse("https://hcp.brand.com/").unwrap();
        let mail = Url::parse("mailto:info@brand.com").unwrap();

        assert!(!is_external(&same, "brand.com"));
        assert!(is_external(&sub, "brand.com"));
        assert!(is_external(&mail, "brand.com"));
    }
}
