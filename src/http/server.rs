//! Streaming reverse proxy (forward mode `http`).
//!
//! # Responsibilities
//! - Create the Axum router: local health route, everything else proxied
//! - Wire up middleware (request id, tracing)
//! - Forward each request on its own upstream request, bodies streamed
//! - Tunnel upgraded connections
//! - Graceful shutdown bounded by the drain grace

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hyper::{body::Incoming, service::service_fn};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo},
    server::{conn::auto, graceful::GracefulShutdown},
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tower::{Service, ServiceBuilder};
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ForwardConfig;
use crate::http::{request, response, upgrade};
use crate::net::connection::SessionTracker;
use crate::observability::metrics;

/// UUID v4 request ids for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// State injected into handlers.
#[derive(Clone)]
pub struct ProxyState {
    pub upstream: SocketAddr,
    pub client: Client<HttpConnector, Body>,
    pub response_header_timeout: Duration,
    pub half_close_grace: Duration,
    pub tunnels: SessionTracker,
    pub stop: broadcast::Sender<()>,
}

/// The HTTP forwarder.
pub struct HttpProxy {
    config: ForwardConfig,
}

impl HttpProxy {
    pub fn new(config: &ForwardConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn client(&self) -> Client<HttpConnector, Body> {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(self.config.connect_timeout()));
        connector.set_nodelay(true);
        Client::builder(TokioExecutor::new()).build(connector)
    }

    /// Build the router for `upstream`.
    pub fn router(&self, upstream: SocketAddr, tunnels: SessionTracker, stop: broadcast::Sender<()>) -> Router {
        let state = ProxyState {
            upstream,
            client: self.client(),
            response_header_timeout: self.config.response_header_timeout(),
            half_close_grace: self.config.half_close_grace(),
            tunnels,
            stop,
        };

        let mut router = Router::new();
        if let Some(path) = &self.config.health_path {
            router = router.route(path, get(health_handler));
        }
        router
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Serve until `shutdown` fires. In-flight requests get the drain grace
    /// to finish, then their connections are aborted.
    pub async fn run(
        self,
        listener: TcpListener,
        upstream: SocketAddr,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, upstream = %upstream, "HTTP proxy accepting connections");

        let tunnels = SessionTracker::new();
        let (stop_tx, _) = broadcast::channel::<()>(1);
        let router = self.router(upstream, tunnels.clone(), stop_tx.clone());

        let builder = auto::Builder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };
                    let router = router.clone();
                    let service = service_fn(move |mut req: Request<Incoming>| {
                        req.extensions_mut().insert(ConnectInfo(peer));
                        router.clone().call(req)
                    });
                    let conn = builder
                        .serve_connection_with_upgrades(TokioIo::new(stream), service)
                        .into_owned();
                    let conn = graceful.watch(conn);
                    connections.spawn(async move {
                        if let Err(e) = conn.await {
                            tracing::debug!(peer = %peer, error = %e, "Client connection ended with error");
                        }
                    });
                }
            }
        }
        drop(listener);

        let drain_grace = self.config.drain_grace();
        tracing::info!(open = connections.len(), "HTTP proxy draining in-flight requests");
        if tokio::time::timeout(drain_grace, graceful.shutdown()).await.is_err() {
            tracing::warn!(
                grace = ?drain_grace,
                remaining = connections.len(),
                "Drain grace elapsed; closing remaining connections"
            );
        }
        connections.shutdown().await;

        let _ = stop_tx.send(());
        if !tunnels.wait_idle(Duration::from_secs(1)).await {
            tracing::warn!(remaining = tunnels.active_count(), "Upgraded tunnels still open at exit");
        }
        tracing::info!("HTTP proxy stopped");
        Ok(())
    }
}

async fn health_handler(State(state): State<ProxyState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "upstream": state.upstream.to_string(),
    }))
}

/// Forward one request and stream the answer back.
async fn proxy_handler(
    State(state): State<ProxyState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut req: Request<Body>,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!(request_id = %request_id, method = %method, path = %path, "Proxying request");

    let client_upgrade = request::is_upgrade(req.headers()).then(|| hyper::upgrade::on(&mut req));

    let upstream_req = match request::to_upstream(req, state.upstream, peer) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Request cannot be rewritten");
            metrics::record_request(method.as_str(), 400, start);
            return response::bad_request();
        }
    };

    let mut upstream_resp = match tokio::time::timeout(
        state.response_header_timeout,
        state.client.request(upstream_req),
    )
    .await
    {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            tracing::warn!(request_id = %request_id, error = %e, connect = e.is_connect(), "Upstream error");
            metrics::record_request(method.as_str(), 502, start);
            return response::bad_gateway();
        }
        Err(_) => {
            tracing::warn!(
                request_id = %request_id,
                timeout = ?state.response_header_timeout,
                "Upstream response headers timed out"
            );
            metrics::record_request(method.as_str(), 504, start);
            return response::gateway_timeout();
        }
    };

    let status = upstream_resp.status();
    metrics::record_request(method.as_str(), status.as_u16(), start);

    if status == StatusCode::SWITCHING_PROTOCOLS {
        if let Some(client_upgrade) = client_upgrade {
            let upstream_upgrade = hyper::upgrade::on(&mut upstream_resp);
            let guard = state.tunnels.track();
            tokio::spawn(upgrade::tunnel(
                client_upgrade,
                upstream_upgrade,
                guard,
                state.half_close_grace,
                state.stop.subscribe(),
            ));
        }
    }

    response::from_upstream(upstream_resp)
}
