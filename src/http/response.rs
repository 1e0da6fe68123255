//! Response handling and transformation.
//!
//! # Responsibilities
//! - Hand the upstream body to the client as a stream
//! - Strip hop-by-hop headers on the way back
//! - Map upstream failures to 502 and 504

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use hyper::body::Incoming;

use super::request::strip_hop_by_hop;

/// Wrap an upstream response without buffering its body.
pub fn from_upstream(response: Response<Incoming>) -> Response<Body> {
    let switching = response.status() == StatusCode::SWITCHING_PROTOCOLS;
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers, switching);
    Response::from_parts(parts, Body::new(body))
}

fn plain(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = (status, message).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

pub fn bad_gateway() -> Response<Body> {
    plain(StatusCode::BAD_GATEWAY, "Upstream unavailable")
}

pub fn gateway_timeout() -> Response<Body> {
    plain(StatusCode::GATEWAY_TIMEOUT, "Upstream did not respond in time")
}

pub fn bad_request() -> Response<Body> {
    plain(StatusCode::BAD_REQUEST, "Request cannot be forwarded")
}
