//! Static responder: asset serving and the terminal not-found page.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::map_response,
    response::Response,
    Router,
};
use bytes::Bytes;
use tower::ServiceExt;

use crate::security::headers::{apply_security_headers, insert_security_headers};
use crate::statics::assets::AssetMap;

const NOT_FOUND_PAGE: &str = "/404.html";

const BUILTIN_NOT_FOUND: &str = "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>404 Not Found</title></head>\n<body><h1>404 Not Found</h1><p>The requested page could not be found.</p></body>\n</html>\n";

struct Inner {
    assets: AssetMap,
    cache_control: HeaderValue,
    not_found: Bytes,
}

/// Serves the precompiled asset map and owns the system-wide 404.
///
/// Every response it produces carries the security headers.
#[derive(Clone)]
pub struct StaticResponder {
    inner: Arc<Inner>,
    router: Router,
}

impl StaticResponder {
    /// `max_age_secs` goes into the immutable cache directive of every
    /// resolved asset. `/404.html`, when present in the map, replaces the
    /// built-in not-found document.
    pub fn new(assets: AssetMap, max_age_secs: u64) -> Self {
        let not_found = assets
            .resolve(NOT_FOUND_PAGE)
            .map(|asset| asset.body.clone())
            .unwrap_or_else(|| Bytes::from_static(BUILTIN_NOT_FOUND.as_bytes()));
        let cache_control =
            HeaderValue::from_str(&format!("public, max-age={max_age_secs}, immutable"))
                .unwrap_or_else(|_| HeaderValue::from_static("public, immutable"));

        let inner = Arc::new(Inner {
            assets,
            cache_control,
            not_found,
        });

        let router = Router::new()
            .fallback(serve_asset)
            .with_state(inner.clone())
            .layer(map_response(apply_security_headers));

        Self { inner, router }
    }

    /// Resolve the request against the asset map, or answer 404.
    pub async fn serve(&self, request: Request) -> Response {
        match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    /// The not-found document, for requests that must not be resolved.
    pub fn not_found(&self) -> Response {
        let mut response = not_found_response(&self.inner, false);
        insert_security_headers(response.headers_mut());
        response
    }

    /// Number of servable assets.
    pub fn asset_count(&self) -> usize {
        self.inner.assets.len()
    }
}

async fn serve_asset(State(inner): State<Arc<Inner>>, request: Request) -> Response {
    let method = request.method();
    let head = method == Method::HEAD;
    if method != Method::GET && !head {
        return not_found_response(&inner, false);
    }

    let Some(asset) = inner.assets.resolve(request.uri().path()) else {
        tracing::debug!(path = %request.uri().path(), "No static asset");
        return not_found_response(&inner, head);
    };

    let mut response = body_response(asset.body.clone(), head);
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, asset.content_type.clone());
    headers.insert(header::CACHE_CONTROL, inner.cache_control.clone());
    response
}

fn not_found_response(inner: &Inner, head: bool) -> Response {
    let mut response = body_response(inner.not_found.clone(), head);
    *response.status_mut() = StatusCode::NOT_FOUND;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn body_response(body: Bytes, head: bool) -> Response {
    let length = HeaderValue::from(body.len());
    let mut response = if head {
        Response::new(Body::empty())
    } else {
        Response::new(Body::from(body))
    };
    response.headers_mut().insert(header::CONTENT_LENGTH, length);
    response
}
