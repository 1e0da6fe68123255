//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};

use ui_gateway::config::{Credentials, GatewayConfig, Secret};

/// A loopback port that was free a moment ago.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// TCP upstream that echoes every byte back.
pub async fn start_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut read, mut write) = socket.split();
                let _ = tokio::io::copy(&mut read, &mut write).await;
                let _ = write.shutdown().await;
            });
        }
    });
    addr
}

/// TCP upstream that reports when its side of a connection sees EOF.
pub async fn start_eof_reporting_upstream() -> (SocketAddr, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
                let _ = tx.send(());
            });
        }
    });
    (addr, rx)
}

/// HTTP upstream that returns a fixed body.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_head(&mut socket).await;
                let response_str = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(response_str.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// What an inspecting backend saw.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

/// HTTP upstream that reports each request (head plus a content-length
/// body) and answers with hop-by-hop headers the proxy should strip.
pub async fn start_inspecting_backend() -> (SocketAddr, mpsc::UnboundedReceiver<SeenRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let Some((head, mut body)) = read_head(&mut socket).await else {
                    return;
                };
                let length = head
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.trim()
                            .eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                while body.len() < length {
                    let mut buf = vec![0u8; length - body.len()];
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => body.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = tx.send(SeenRequest { head, body });
                let reply = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nKeep-Alive: timeout=5\r\nX-Upstream: yes\r\nConnection: close\r\n\r\nok";
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (addr, rx)
}

/// HTTP upstream that sends the first chunk, then waits for `release`
/// before sending the rest of a chunked body.
pub async fn start_chunked_backend(first: &'static str, rest: &'static str) -> (SocketAddr, Arc<Notify>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let release = Arc::new(Notify::new());
    let gate = release.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let gate = gate.clone();
            tokio::spawn(async move {
                let _ = read_head(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Type: text/plain\r\n\r\n";
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket
                    .write_all(format!("{:x}\r\n{first}\r\n", first.len()).as_bytes())
                    .await;
                let _ = socket.flush().await;

                gate.notified().await;
                let _ = socket
                    .write_all(format!("{:x}\r\n{rest}\r\n0\r\n\r\n", rest.len()).as_bytes())
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (addr, release)
}

/// HTTP upstream that accepts and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Read up to the end of the request head. Returns the head and any body
/// bytes read past it.
pub async fn read_head(socket: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&data[..pos]).to_string();
            return Some((head, data[pos + 4..].to_vec()));
        }
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
}

/// Poll until something accepts on `addr`.
pub async fn wait_for_port(addr: SocketAddr, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if TcpStream::connect(addr).await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

pub fn credentials() -> Credentials {
    Credentials {
        endpoint: "minio.test:9000".into(),
        access_key: Secret::new("test-user"),
        secret_key: Secret::new("test-password"),
        use_tls: false,
        bucket: "garment".into(),
    }
}

/// Shell stand-in for the engine: acknowledges every marker and exits with
/// status 1 on a line containing `fail_on`.
pub fn fake_engine_script(fail_on: Option<&str>) -> String {
    let fail = match fail_on {
        Some(pattern) => format!("*'{pattern}'*) echo \"Error: rejected\" >&2; exit 1 ;;"),
        None => String::new(),
    };
    format!(
        r##"while IFS= read -r line; do
  case "$line" in
    {fail}
    "SELECT '"*"';") m=${{line#"SELECT '"}}; m=${{m%"';"}}; printf '%s\n' "$m" ;;
  esac
done"##
    )
}

/// Like [`fake_engine_script`], but exits once the UI start has been
/// acknowledged.
pub fn fake_engine_exiting_after_ui() -> String {
    r##"while IFS= read -r line; do
  case "$line" in
    *start_ui_server*) started=1 ;;
    "SELECT '"*"';") m=${line#"SELECT '"}; m=${m%"';"}; printf '%s\n' "$m"; [ -n "$started" ] && exit 0 ;;
  esac
done"##
        .to_string()
}

/// Config that runs `script` as the engine, with fast timings.
pub fn gateway_config(script: String, external_port: u16, internal_port: u16) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.port = external_port;
    config.internal.host = "127.0.0.1".into();
    config.internal.port = internal_port;
    config.engine.command = "sh".into();
    config.engine.args = vec!["-c".into(), script];
    config.engine.database_dir = std::env::temp_dir()
        .join(format!("ui-gateway-test-{}", uuid::Uuid::new_v4()))
        .display()
        .to_string();
    config.engine.stop_grace_secs = 1;
    config.bootstrap.max_attempts = 2;
    config.bootstrap.base_delay_ms = 10;
    config.bootstrap.max_delay_ms = 20;
    config.bootstrap.statement_timeout_secs = 5;
    config.readiness.timeout_secs = 2;
    config.readiness.interval_ms = 50;
    config.readiness.connect_timeout_ms = 200;
    config.readiness.prewarm.enabled = false;
    config.forward.drain_grace_secs = 1;
    config
}
