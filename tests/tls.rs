//! TLS termination on the primary listener.

use edge_gateway::config::{TlsMode, VirtualHostConfig};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

mod common;

fn insecure_client(resolve: Option<std::net::SocketAddr>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .no_proxy();
    if let Some(addr) = resolve {
        builder = builder.resolve("localhost", addr);
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn self_signed_listener_serves_https() {
    let mut config = common::test_config();
    config.tls.mode = TlsMode::SelfSigned;
    config.tls.default_server_name = Some("localhost".to_string());
    let server = common::spawn_server(config).await;

    let body: serde_json::Value = insecure_client(None)
        .post(format!("https://127.0.0.1:{}/rpc/hello", server.address.port()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["result"], "Hello there!");
}

#[tokio::test]
async fn managed_mode_issues_and_caches_per_host() {
    let cert_dir = tempfile::tempdir().unwrap();

    let mut config = common::test_config();
    config.tls.mode = TlsMode::Managed;
    config.tls.cert_dir = cert_dir.path().to_path_buf();
    config.hosts.push(VirtualHostConfig::local("localhost"));
    let server = common::spawn_server(config).await;

    let response = insecure_client(Some(server.address))
        .post(format!("https://localhost:{}/rpc/echo", server.address.port()))
        .body(r#""secure""#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["result"], "secure");
    assert!(cert_dir.path().join("localhost.json").exists());
}

#[tokio::test]
async fn failed_handshakes_do_not_stop_the_listener() {
    let cert_dir = tempfile::tempdir().unwrap();

    let mut config = common::test_config();
    config.tls.mode = TlsMode::Managed;
    config.tls.cert_dir = cert_dir.path().to_path_buf();
    config.hosts.push(VirtualHostConfig::local("localhost"));
    let server = common::spawn_server(config).await;
    let port = server.address.port();

    // Not TLS at all.
    let mut garbage = TcpStream::connect(server.address).await.unwrap();
    garbage
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    drop(garbage);

    // A name with no configured host gets no certificate.
    let unknown = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .no_proxy()
        .resolve("unknown.test", server.address)
        .build()
        .unwrap()
        .get(format!("https://unknown.test:{port}/rpc/hello"))
        .send()
        .await;
    assert!(unknown.is_err());
    assert!(!cert_dir.path().join("unknown.test.json").exists());

    let body: serde_json::Value = insecure_client(Some(server.address))
        .get(format!("https://localhost:{port}/rpc/hello"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["result"], "Hello there!");
}
