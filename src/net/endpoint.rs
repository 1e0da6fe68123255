//! Service endpoints and their bind scope.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Which interfaces an endpoint is reachable on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindScope {
    Loopback,
    AllInterfaces,
}

/// A host:port pair plus the scope it is bound with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    host: String,
    port: u16,
    scope: BindScope,
}

impl ServiceEndpoint {
    /// The public endpoint. Always bound on all interfaces.
    pub fn external(port: u16) -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED.to_string(),
            port,
            scope: BindScope::AllInterfaces,
        }
    }

    /// The supervised service endpoint. Scope is derived from the host.
    pub fn internal(host: &str, port: u16) -> Self {
        let host = host.trim().trim_start_matches('[').trim_end_matches(']');
        let scope = if is_loopback_host(host) {
            BindScope::Loopback
        } else {
            BindScope::AllInterfaces
        };
        Self {
            host: host.to_string(),
            port,
            scope,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn scope(&self) -> BindScope {
        self.scope
    }

    pub fn is_loopback(&self) -> bool {
        self.scope == BindScope::Loopback
    }

    /// Socket address for binding a listener on this endpoint.
    pub fn bind_addr(&self) -> io::Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Addresses to try when connecting.
    ///
    /// `localhost` always yields both loopback families, IPv4 first, since
    /// the service may bind only one of them regardless of what the
    /// resolver returns.
    pub async fn candidates(&self) -> io::Result<Vec<SocketAddr>> {
        let mut addrs = Vec::new();
        if self.host.eq_ignore_ascii_case("localhost") {
            addrs.push(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), self.port));
            addrs.push(SocketAddr::new(Ipv6Addr::LOCALHOST.into(), self.port));
        }

        match tokio::net::lookup_host((self.host.as_str(), self.port)).await {
            Ok(resolved) => {
                for addr in resolved {
                    if !addrs.contains(&addr) {
                        addrs.push(addr);
                    }
                }
            }
            Err(e) if addrs.is_empty() => return Err(e),
            Err(e) => {
                tracing::debug!(host = %self.host, error = %e, "Resolver failed; using loopback defaults");
            }
        }

        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} resolved to no addresses", self.host),
            ));
        }
        Ok(addrs)
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn is_loopback_host(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}
