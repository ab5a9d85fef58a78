//! Construction of the internal URLs that get screenshotted.
//!
//! Every image request maps onto the site's own `/og` template page with the
//! same query parameters. The resulting URL string is also the cache key, so
//! the serialization here decides what counts as "the same image":
//!
//! - Parameters keep their order (`a=1&b=2` and `b=2&a=1` stay distinct)
//! - Values are re-encoded as `application/x-www-form-urlencoded`
//! - An empty query still leaves a trailing `?`

use url::{Url, form_urlencoded};

/// Path of the template page on the site origin.
pub const OG_PATH: &str = "/og";

/// Error type for origin and target construction failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TargetError {
    #[error("empty origin")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("host not allowed: {0}")]
    HostNotAllowed(String),
}

/// Parse a site origin.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Drop query and fragment (a base path is kept)
pub fn parse_origin(input: &str) -> Result<Url, TargetError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(TargetError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| TargetError::InvalidOrigin(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(TargetError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| TargetError::InvalidOrigin(e.to_string()))?;
    }

    parsed.set_query(None);
    parsed.set_fragment(None);

    Ok(parsed)
}

/// Build the origin a request arrived on from its `Host` header.
///
/// `proto` comes from `X-Forwarded-Proto` when a proxy sets it.
pub fn origin_from_host(proto: Option<&str>, host: &str) -> Result<Url, TargetError> {
    let proto = proto.map(str::trim).filter(|p| !p.is_empty()).unwrap_or("http");
    let host = host.trim();
    if host.is_empty() {
        return Err(TargetError::Empty);
    }
    if host.contains(['/', '?', '#', '@']) {
        return Err(TargetError::InvalidOrigin(format!("bad host header: {host}")));
    }
    parse_origin(&format!("{}://{host}", proto.to_ascii_lowercase()))
}

/// Check a `Host` header value against an allowlist of `host[:port]` entries.
///
/// Comparison is exact apart from case and surrounding whitespace: an entry
/// without a port only matches a header without one. An empty list allows
/// nothing.
pub fn host_allowed(allowed: &[String], host: &str) -> bool {
    let host = host.trim();
    allowed.iter().any(|entry| entry.trim().eq_ignore_ascii_case(host))
}

/// Like [`origin_from_host`], but only for hosts on the allowlist.
pub fn allowed_origin_from_host(proto: Option<&str>, host: &str, allowed: &[String]) -> Result<Url, TargetError> {
    if !host_allowed(allowed, host) {
        return Err(TargetError::HostNotAllowed(host.trim().to_string()));
    }
    origin_from_host(proto, host)
}

/// The `/og` page on `origin`, carrying the parameters of `query`.
pub fn og_target(origin: &Url, query: Option<&str>) -> Url {
    let mut target = origin.clone();

    let base = origin.path().trim_end_matches('/');
    target.set_path(&format!("{base}{OG_PATH}"));

    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form_urlencoded::parse(query.unwrap_or_default().as_bytes()))
        .finish();
    target.set_query(Some(&encoded));
    target.set_fragment(None);

    target
}
