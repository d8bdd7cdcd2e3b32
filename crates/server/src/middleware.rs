use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

/// The resolved client address, inserted into request extensions so the request-log middleware
/// running inside this one can pick it up when building its span.
#[derive(Debug, Clone)]
pub struct RealIp(pub String);

/// Resolves the client's address from `X-Forwarded-For` (first hop) or `X-Real-Ip`, falling back
/// to the socket's peer address, and attaches it to the request so the request-log middleware
/// downstream of this one can record it.
///
/// `ConnectInfo` is optional rather than required: it's only populated when the router is served
/// via `into_make_service_with_connect_info`, which integration tests exercising the router
/// directly through `oneshot` don't go through.
pub async fn real_ip(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip().to_string());

    let resolved = forwarded_for(&headers)
        .or_else(|| real_ip_header(&headers))
        .or(peer)
        .unwrap_or_else(|| "unknown".to_owned());

    request.extensions_mut().insert(RealIp(resolved));

    next.run(request).await
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("x-forwarded-for")?.to_str().ok()?;
    value.split(',').next().map(|s| s.trim().to_owned())
}

fn real_ip_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-real-ip")?
        .to_str()
        .ok()
        .map(|s| s.trim().to_owned())
}
