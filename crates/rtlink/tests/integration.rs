//! Integration tests for rtlink.
//!
//! These tests change kernel state and need a throwaway network namespace.
//! Run with: `sudo unshare -n cargo test -p rtlink --test integration --features integration`
//!
//! The tests are gated behind the `integration` feature to avoid running
//! them in normal CI without proper setup.

#![cfg(feature = "integration")]

use std::process::Command;
use std::time::Duration;

use rtlink::netlink::events::NetworkEvent;
use rtlink::{Route, Session, SessionConfig};
use tokio_stream::StreamExt;

/// Open a session with loopback up, so routes through it are accepted.
async fn open() -> Session {
    // A fresh namespace starts with lo down
    let _ = Command::new("ip").args(["link", "set", "lo", "up"]).status();
    Session::open(SessionConfig::default())
        .await
        .expect("failed to open session")
}

#[tokio::test]
async fn test_loopback_is_cached() {
    let session = open().await;

    assert_eq!(session.interface_index("lo"), Some(1));
    let lo = session.interface(1).unwrap();
    assert_eq!(lo.name, "lo");
    assert_eq!(lo.mac, [0; 6]);
    assert!(lo.mtu > 0);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_unknown_interface_fails_fast_on_remove() {
    let session = open().await;
    let err = session
        .remove_address("10.201.0.1/24".parse().unwrap(), "nonexistent0")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_address_round_trip() {
    let session = open().await;
    let address = "10.200.0.1/24".parse().unwrap();

    session.add_address(address, "lo").await.unwrap();
    // Adding twice is rejected
    let err = session.add_address(address, "lo").await.unwrap_err();
    assert!(err.is_already_exists());

    session.remove_address(address, "lo").await.unwrap();
}

#[tokio::test]
async fn test_route_add_is_seen_by_cache_and_events() {
    let session = open().await;
    let mut events = session.subscribe();
    let route = Route::new()
        .destination("10.202.0.0/24".parse().unwrap())
        .interface("lo");

    session.add_route(&route).await.unwrap();

    let seen = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.next().await {
            if let NetworkEvent::NewRoute(msg) = event {
                if msg.dst_len() == 24 && msg.oif == Some(1) {
                    return true;
                }
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(seen, "no RTM_NEWROUTE for 10.202.0.0/24");

    assert!(
        session
            .ipv4_routes()
            .iter()
            .any(|r| r.destination.to_string() == "10.202.0.0/24" && r.oif == 1)
    );

    let err = session.add_route(&route).await.unwrap_err();
    assert!(err.is_already_exists());

    session.del_route(&route).await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_route_without_destination_is_noop() {
    let session = open().await;
    session.add_route(&Route::new().interface("lo")).await.unwrap();
    session.del_route(&Route::new()).await.unwrap();
}
