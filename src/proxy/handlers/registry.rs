// Registry handler: forwards every path to the CodeArtifact repository endpoint
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::proxy::credential_store::CredentialSnapshot;
use crate::proxy::middleware::context::{peer_addr, user_agent};
use crate::proxy::request_context::{RequestContextRegistry, RequestId};
use crate::proxy::rewrite::{self, BodyRewrite, RedirectRewrite};
use crate::proxy::server::AppState;
use crate::proxy::upstream::client::{is_hop_by_hop, UpstreamClient};

/// Request details kept around for response logging
struct Exchange {
    id: RequestId,
    peer: String,
    method: String,
    path: String,
    user_agent: String,
}

/// Drops the request's context entry if the exchange ends early
struct ContextGuard<'a> {
    registry: &'a RequestContextRegistry,
    id: RequestId,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.registry.take(&self.id);
    }
}

/// Catch-all handler
pub async fn handle_proxy(State(state): State<AppState>, request: Request) -> Response {
    // Without the context middleware there is nothing to rewrite against
    let id = request
        .extensions()
        .get::<RequestId>()
        .copied()
        .unwrap_or_default();
    let exchange = Exchange {
        id,
        peer: peer_addr(&request),
        method: request.method().to_string(),
        path: request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
        user_agent: user_agent(request.headers()).to_string(),
    };
    let _guard = ContextGuard {
        registry: &state.contexts,
        id,
    };

    let snapshot = state.credentials.snapshot().await;
    let url = UpstreamClient::build_url(&snapshot.upstream_url, &exchange.path);
    info!(
        request_id = %id,
        "Sending request to {}{}",
        snapshot.upstream_url.trim_end_matches('/'),
        exchange.path
    );

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(request_id = %id, "Failed to read request body: {}", e);
            return (StatusCode::BAD_REQUEST, format!("Failed to read request body: {}", e))
                .into_response();
        }
    };

    let upstream_response = match state
        .upstream
        .forward(parts.method, &url, &parts.headers, &snapshot.token, body)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!(request_id = %id, "Upstream request to {} failed: {}", url, e);
            return (StatusCode::BAD_GATEWAY, format!("Upstream request failed: {}", e))
                .into_response();
        }
    };

    intercept_response(&state, &exchange, &snapshot, upstream_response).await
}

/// Response interceptor: rewrite redirects and package manager metadata
async fn intercept_response(
    state: &AppState,
    exchange: &Exchange,
    snapshot: &CredentialSnapshot,
    upstream: reqwest::Response,
) -> Response {
    let status = upstream.status();
    info!(
        request_id = %exchange.id,
        "Received {} response from {}",
        status.as_u16(),
        upstream.url()
    );
    info!(
        request_id = %exchange.id,
        "RES: {} \"{}\" {} \"{}\" \"{}\"",
        exchange.peer,
        exchange.method,
        status.as_u16(),
        exchange.path,
        exchange.user_agent
    );

    let mut headers = HeaderMap::with_capacity(upstream.headers().len());
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    let Some(origin) = state.contexts.take(&exchange.id) else {
        debug!(request_id = %exchange.id, "No client context recorded, passing response through");
        return build_response(status, headers, Body::from_stream(upstream.bytes_stream()));
    };

    if rewrite::is_redirect(status.as_u16()) {
        rewrite_redirect(&mut headers, upstream.url(), snapshot, &origin);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !rewrite::wants_body_rewrite(&exchange.user_agent, content_type) {
        return build_response(status, headers, Body::from_stream(upstream.bytes_stream()));
    }

    let original = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(request_id = %exchange.id, "Failed to read upstream response body: {}", e);
            return (
                StatusCode::BAD_GATEWAY,
                format!("Failed to read upstream response: {}", e),
            )
                .into_response();
        }
    };

    let gzipped = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("gzip"))
        .unwrap_or(false);

    match rewrite::rewrite_body(&original, gzipped, &snapshot.upstream_url, &origin) {
        BodyRewrite::Rewritten(text) => {
            if gzipped {
                headers.remove(header::CONTENT_ENCODING);
            }
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(text.len()));
            build_response(status, headers, Body::from(text))
        }
        BodyRewrite::Unchanged => {
            debug!(request_id = %exchange.id, "Response body left as is");
            build_response(status, headers, Body::from(original))
        }
    }
}

fn rewrite_redirect(
    headers: &mut HeaderMap,
    request_url: &Url,
    snapshot: &CredentialSnapshot,
    origin: &crate::proxy::request_context::ClientOrigin,
) {
    let Some(upstream) = snapshot.upstream() else {
        return;
    };
    let Some(location) = headers.get(header::LOCATION).and_then(|v| v.to_str().ok()) else {
        return;
    };

    if let RedirectRewrite::Rewritten(target) = rewrite::rewrite_location(location, request_url, &upstream, origin) {
        if let Ok(value) = HeaderValue::from_str(&target) {
            headers.insert(header::LOCATION, value);
        }
    }
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
