//! Request handling and transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers, including those named by `Connection`
//! - Point the request at the upstream (URI authority and `Host`)
//! - Add the `x-forwarded-*` headers
//! - Keep the upgrade handshake headers on upgrade requests
//!
//! The body is moved into the upstream request untouched, so it streams.

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::uri::{Authority, PathAndQuery, Scheme, Uri};
use axum::http::Request;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("invalid upstream authority: {0}")]
    Authority(#[from] axum::http::uri::InvalidUri),

    #[error("invalid upstream uri: {0}")]
    Uri(#[from] axum::http::uri::InvalidUriParts),

    #[error("invalid header value: {0}")]
    Header(#[from] axum::http::header::InvalidHeaderValue),
}

/// Whether the request asks for a protocol upgrade.
pub fn is_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    connection_upgrade && headers.contains_key(header::UPGRADE)
}

/// Remove connection-scoped headers. With `keep_upgrade`, `Connection:
/// upgrade` and `Upgrade` survive so the handshake can reach the other side.
pub fn strip_hop_by_hop(headers: &mut HeaderMap, keep_upgrade: bool) {
    let upgrade = headers.get(header::UPGRADE).cloned();

    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_str(token.trim()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }

    if keep_upgrade {
        if let Some(upgrade) = upgrade {
            headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
            headers.insert(header::UPGRADE, upgrade);
        }
    }
}

/// Rewrite a client request for the upstream at `upstream`.
pub fn to_upstream(
    request: Request<Body>,
    upstream: SocketAddr,
    peer: SocketAddr,
) -> Result<Request<Body>, RewriteError> {
    let upgrade = is_upgrade(request.headers());
    let (mut parts, body) = request.into_parts();

    let original_host = parts
        .headers
        .get(header::HOST)
        .cloned()
        .or_else(|| {
            parts
                .uri
                .authority()
                .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
        });

    strip_hop_by_hop(&mut parts.headers, upgrade);

    let authority = Authority::from_str(&upstream.to_string())?;
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(authority.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = Uri::from_parts(uri_parts)?;

    parts
        .headers
        .insert(header::HOST, HeaderValue::from_str(authority.as_str())?);

    let peer_ip = peer.ip().to_string();
    let forwarded_for = match parts
        .headers
        .get(&X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
    {
        Some(existing) => format!("{existing}, {peer_ip}"),
        None => peer_ip,
    };
    parts
        .headers
        .insert(X_FORWARDED_FOR, HeaderValue::from_str(&forwarded_for)?);
    if let Some(host) = original_host {
        parts.headers.insert(X_FORWARDED_HOST, host);
    }
    parts
        .headers
        .insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));

    Ok(Request::from_parts(parts, body))
}
