//! Draining lets in-flight work finish; a second signal forces termination.

use std::time::Duration;

use edge_gateway::lifecycle::Phase;
use edge_gateway::rpc::{api, ProcedureError, Registry};
use edge_gateway::Termination;
use tokio::net::TcpStream;

mod common;

fn registry() -> Registry {
    let mut registry = api::registry().unwrap();
    registry
        .register("sleep", |ms: u64| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, ProcedureError>(ms)
        })
        .unwrap();
    registry
}

#[tokio::test]
async fn drain_finishes_in_flight_requests() {
    let mut config = common::test_config();
    config.timeouts.drain_ms = 5_000;
    let server = common::spawn_server_with(config, registry()).await;
    let address = server.address;

    let in_flight = tokio::spawn(async move {
        common::raw_request(address, "POST", "example.com", "/rpc/sleep", "500").await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(server.shutdown().begin_drain());
    assert!(!server.shutdown().begin_drain());
    assert_eq!(server.shutdown().phase(), Phase::Draining);

    let response = in_flight.await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.json()["result"], 500);

    let shutdown = server.shutdown().clone();
    let termination = server.wait().await;
    assert_eq!(termination, Termination::Clean);
    assert_eq!(shutdown.phase(), Phase::Stopped);

    assert!(TcpStream::connect(address).await.is_err());
}

#[tokio::test]
async fn grace_period_bounds_the_drain() {
    let mut config = common::test_config();
    config.timeouts.drain_ms = 200;
    let server = common::spawn_server_with(config, registry()).await;
    let address = server.address;

    let _in_flight = tokio::spawn(async move {
        common::raw_request(address, "POST", "example.com", "/rpc/sleep", "5000").await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    server.shutdown().begin_drain();
    let termination = tokio::time::timeout(Duration::from_secs(3), server.wait())
        .await
        .unwrap();
    assert_eq!(termination, Termination::GraceExpired);
    assert_eq!(termination.exit_code(), 1);
}

#[tokio::test]
async fn second_signal_forces_termination() {
    let mut config = common::test_config();
    config.timeouts.drain_ms = 60_000;
    let server = common::spawn_server_with(config, registry()).await;
    let address = server.address;

    let _in_flight = tokio::spawn(async move {
        common::raw_request(address, "POST", "example.com", "/rpc/sleep", "30000").await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let shutdown = server.shutdown().clone();
    assert!(shutdown.begin_drain());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(shutdown.force());
    assert!(!shutdown.force());

    let termination = tokio::time::timeout(Duration::from_secs(3), server.wait())
        .await
        .unwrap();
    assert_eq!(termination, Termination::Forced);
    assert_eq!(termination.exit_code(), 2);
}
