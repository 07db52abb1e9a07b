use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Voter identity from the caller's network origin: the first hop of
/// `X-Forwarded-For` when a proxy set it, the peer address otherwise.
///
/// This is a weak, spoofable pseudo-identity used only to deduplicate
/// votes. It is not a security boundary.
pub fn voter_identity(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}
