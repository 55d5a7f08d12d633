//! Security response headers.
//!
//! # Responsibilities
//! - Add hardening headers to every response the gateway itself produces
//! - Strip hop-by-hop headers from forwarded messages
//!
//! # Design Decisions
//! - No Content-Security-Policy: proxied pages load from arbitrary origins
//! - Existing values are never overwritten
//! - Tunnel backend responses pass through untouched

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Headers that describe a single transport hop and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Insert the hardening headers that are not already present.
pub fn insert_security_headers(headers: &mut HeaderMap) {
    for &(name, value) in SECURITY_HEADERS {
        headers
            .entry(HeaderName::from_static(name))
            .or_insert_with(|| HeaderValue::from_static(value));
    }
}

/// `map_response` middleware form of [`insert_security_headers`].
pub async fn apply_security_headers(mut response: Response) -> Response {
    insert_security_headers(response.headers_mut());
    response
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for &name in HOP_BY_HOP {
        headers.remove(name);
    }
}
