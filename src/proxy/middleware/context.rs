// Request interceptor: remembers how the client reached us
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};

use crate::proxy::request_context::{ClientOrigin, RequestId};
use crate::proxy::server::AppState;

/// Stamp the request with a fresh [`RequestId`] and record its client origin
pub async fn capture_client_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let id = RequestId::new();
    let origin = client_origin(request.headers(), request.uri());
    state.contexts.put(id, origin);
    request.extensions_mut().insert(id);

    tracing::info!(
        request_id = %id,
        "REQ: {} {} \"{}\" \"{}\"",
        peer_addr(&request),
        request.method(),
        request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/"),
        user_agent(request.headers())
    );

    next.run(request).await
}

/// Scheme and host the client used, preferring what a fronting proxy reports
pub fn client_origin(headers: &HeaderMap, uri: &Uri) -> ClientOrigin {
    let forwarded_proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_ascii_lowercase());

    let scheme = match forwarded_proto.as_deref() {
        Some("https") => "https",
        Some(_) => "http",
        None if uri.scheme_str() == Some("https") => "https",
        None => "http",
    };

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default();

    ClientOrigin {
        scheme: scheme.to_string(),
        host,
    }
}

pub fn peer_addr(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
