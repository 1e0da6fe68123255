//! Whole startup sequence against a shell stand-in for the engine.

mod common;

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use ui_gateway::config::Secret;
use ui_gateway::lifecycle::error::{
    EXIT_BOOTSTRAP, EXIT_LISTENER_BIND, EXIT_MISSING_CONFIGURATION, EXIT_PROCESS_DIED,
    EXIT_READINESS_TIMEOUT,
};
use ui_gateway::{Gateway, Shutdown, StartupError};

/// Serve a fixed HTTP body on `port` until the test ends.
async fn serve_ui_on(port: u16, body: &'static str) {
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if common::read_head(&mut socket).await.is_none() {
                    return;
                }
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
}

#[tokio::test]
async fn missing_credentials_fail_before_launch() {
    let marker = std::env::temp_dir().join(format!("ui-gateway-launched-{}", uuid::Uuid::new_v4()));
    let script = format!("touch '{}'", marker.display());
    let config = common::gateway_config(script, common::free_port().await, common::free_port().await);

    let mut credentials = common::credentials();
    credentials.secret_key = Secret::default();

    let err = Gateway::new(config, credentials)
        .run(&Shutdown::new())
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), EXIT_MISSING_CONFIGURATION);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!marker.exists(), "engine was launched");
}

#[tokio::test]
async fn failing_directive_exhausts_attempts() {
    let script = common::fake_engine_script(Some("INSTALL aws"));
    let config = common::gateway_config(script, common::free_port().await, common::free_port().await);

    let err = Gateway::new(config, common::credentials())
        .run(&Shutdown::new())
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), EXIT_BOOTSTRAP);
    assert!(matches!(err, StartupError::Bootstrap { attempts: 2, .. }));
}

#[tokio::test]
async fn silent_ui_is_a_readiness_timeout() {
    let script = common::fake_engine_script(None);
    let config = common::gateway_config(script, common::free_port().await, common::free_port().await);

    let started = std::time::Instant::now();
    let err = Gateway::new(config, common::credentials())
        .run(&Shutdown::new())
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), EXIT_READINESS_TIMEOUT);
    assert!(started.elapsed() < Duration::from_secs(6));
}

#[tokio::test]
async fn engine_exit_before_ready_is_process_died() {
    let script = common::fake_engine_exiting_after_ui();
    let mut config = common::gateway_config(script, common::free_port().await, common::free_port().await);
    config.readiness.timeout_secs = 60;

    let started = std::time::Instant::now();
    let err = Gateway::new(config, common::credentials())
        .run(&Shutdown::new())
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), EXIT_PROCESS_DIED);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn occupied_external_port_is_a_bind_failure() {
    let occupied = TcpListener::bind("0.0.0.0:0").await.unwrap();
    let external = occupied.local_addr().unwrap().port();
    let internal = common::free_port().await;
    serve_ui_on(internal, "ui").await;

    let config = common::gateway_config(common::fake_engine_script(None), external, internal);
    let err = Gateway::new(config, common::credentials())
        .run(&Shutdown::new())
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), EXIT_LISTENER_BIND);
    drop(occupied);
}

#[tokio::test]
async fn forwards_only_after_readiness() {
    let external = common::free_port().await;
    let internal = common::free_port().await;
    let mut config = common::gateway_config(common::fake_engine_script(None), external, internal);
    config.readiness.timeout_secs = 20;

    let shutdown = Shutdown::new();
    let gateway = Gateway::new(config, common::credentials());
    let run = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { gateway.run(&shutdown).await })
    };

    let external_addr: SocketAddr = ([127, 0, 0, 1], external).into();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(
        TcpStream::connect(external_addr).await.is_err(),
        "external port opened before the engine was ready"
    );

    serve_ui_on(internal, "engine ui").await;
    assert!(common::wait_for_port(external_addr, Duration::from_secs(10)).await);

    let body = reqwest::get(format!("http://{external_addr}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "engine ui");

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok(), "{result:?}");
}

#[tokio::test]
async fn shutdown_during_startup_is_clean() {
    let mut config = common::gateway_config(
        common::fake_engine_script(None),
        common::free_port().await,
        common::free_port().await,
    );
    config.readiness.timeout_secs = 60;

    let shutdown = Shutdown::new();
    let gateway = Gateway::new(config, common::credentials());
    let run = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { gateway.run(&shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
