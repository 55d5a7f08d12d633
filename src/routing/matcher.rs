//! Path matching logic.
//!
//! # Responsibilities
//! - Extract the request path (query excluded) from origin-form targets
//! - Match path prefixes (adapter mounts) and path suffixes (upgrade mounts)
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching
//! - Suffix matching, not prefix matching, for the datagram mount so that
//!   sibling paths like `/wispy/` never match

use axum::extract::Request;
use axum::http::Method;

use crate::adapters::ClaimError;

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// The path of an origin-form request target.
///
/// `CONNECT` authority targets and `*` targets have no routable path.
pub fn target_path(request: &Request) -> Result<&str, ClaimError> {
    let path = request.uri().path();
    if request.method() == Method::CONNECT || !path.starts_with('/') {
        return Err(ClaimError::MalformedTarget(request.uri().to_string()));
    }
    Ok(path)
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefix {
    prefix: String,
}

impl PathPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }
}

impl Matcher for PathPrefix {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Matches the request path suffix.
#[derive(Debug, Clone)]
pub struct PathSuffix {
    suffix: String,
}

impl PathSuffix {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.suffix
    }
}

impl Matcher for PathSuffix {
    fn matches(&self, path: &str) -> bool {
        path.ends_with(&self.suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(method: Method, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_path_prefix() {
        let matcher = PathPrefix::new("/bare/");
        assert!(matcher.matches("/bare/"));
        assert!(matcher.matches("/bare/v3/"));
        assert!(!matcher.matches("/bare"));
        assert!(!matcher.matches("/barely/"));
    }

    #[test]
    fn test_path_suffix() {
        let matcher = PathSuffix::new("/wisp/");
        assert!(matcher.matches("/wisp/"));
        assert!(matcher.matches("/proxy/wisp/"));
        assert!(!matcher.matches("/wispy/"));
        assert!(!matcher.matches("/wisp/extra"));
        assert!(!matcher.matches("/wisp"));
    }

    #[test]
    fn target_path_excludes_query() {
        let req = request(Method::GET, "http://example.com/wisp/?session=1");
        assert_eq!(target_path(&req).unwrap(), "/wisp/");
    }

    #[test]
    fn non_origin_targets_are_malformed() {
        let connect = request(Method::CONNECT, "example.com:443");
        assert!(target_path(&connect).is_err());

        let star = request(Method::OPTIONS, "*");
        assert!(target_path(&star).is_err());
    }
}
