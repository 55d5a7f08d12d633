//! End-to-end routing through a live gateway.

use std::sync::Arc;

use reqwest::header::{CACHE_CONTROL, COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use frontdoor::adapters::DatagramTunnel;
use frontdoor::config::DatagramConfig;
use frontdoor::statics::AssetMap;

mod common;
use common::{Claim, MockAdapter};

fn bare() -> Arc<MockAdapter> {
    MockAdapter::new("bare", Claim::Prefix("/bare/"), Claim::Prefix("/bare/"))
}

fn wisp() -> Arc<MockAdapter> {
    MockAdapter::new("wisp", Claim::Never, Claim::Suffix("/wisp/"))
}

#[tokio::test]
async fn claimed_request_goes_to_backend_only() {
    let (backend, datagram) = (bare(), wisp());
    let gateway =
        common::start_gateway(backend.clone(), datagram.clone(), common::sample_assets()).await;

    let response = reqwest::get(gateway.url("/bare/v3/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().starts_with("mock:bare"));

    assert_eq!(backend.claim_checks(), 1);
    assert_eq!(backend.served(), 1);
    // Plain requests never consult the datagram adapter.
    assert_eq!(datagram.claim_checks(), 0);
    assert_eq!(datagram.served(), 0);

    let stats = gateway.dispatcher.stats();
    assert_eq!(stats.backend, 1);
    assert_eq!(stats.statics, 0);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn unclaimed_request_is_served_as_immutable_asset() {
    let backend = bare();
    let gateway = common::start_gateway(backend.clone(), wisp(), common::sample_assets()).await;

    let response = reqwest::get(gateway.url("/assets/app.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CACHE_CONTROL],
        format!("public, max-age={}, immutable", common::MAX_AGE_SECS)
    );
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.text().await.unwrap(), "console.log('front door');");

    assert_eq!(backend.claim_checks(), 1);
    assert_eq!(backend.served(), 0);
    assert_eq!(gateway.dispatcher.stats().statics, 1);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn root_serves_index_page() {
    let gateway = common::start_gateway(bare(), wisp(), common::sample_assets()).await;

    let response = reqwest::get(gateway.url("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "<h1>front door</h1>");

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn unknown_path_gets_not_found_page() {
    let gateway = common::start_gateway(bare(), wisp(), common::sample_assets()).await;

    let response = reqwest::get(gateway.url("/unknown/path")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.text().await.unwrap().contains("404"));

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn custom_not_found_document_replaces_builtin() {
    let mut assets = AssetMap::new();
    assets.insert("/404.html", "<p>lost</p>");
    let gateway = common::start_gateway(bare(), wisp(), assets).await;

    let response = reqwest::get(gateway.url("/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text().await.unwrap(), "<p>lost</p>");

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn failing_claim_check_falls_through_to_not_found() {
    let backend = MockAdapter::new("bare", Claim::Fail, Claim::Fail);
    let gateway = common::start_gateway(backend.clone(), wisp(), common::sample_assets()).await;

    // Even a path the statics could serve gets the 404 page.
    let response = reqwest::get(gateway.url("/assets/app.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(backend.served(), 0);

    let stats = gateway.dispatcher.stats();
    assert_eq!(stats.claim_errors, 1);
    assert_eq!(stats.not_found, 1);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn datagram_suffix_wins_without_asking_backend() {
    // The backend would claim everything, but the suffix match comes first.
    let backend = MockAdapter::new("bare", Claim::Prefix("/"), Claim::Prefix("/"));
    let datagram = wisp();
    let gateway =
        common::start_gateway(backend.clone(), datagram.clone(), AssetMap::new()).await;

    let raw = common::raw_upgrade(gateway.addr, "/service/wisp/").await;
    let raw = String::from_utf8_lossy(&raw);
    assert!(raw.contains("upgrade:wisp"), "unexpected response: {raw}");

    assert_eq!(datagram.upgrades_served(), 1);
    assert_eq!(backend.upgrade_claim_checks(), 0);
    assert_eq!(backend.upgrades_served(), 0);
    assert_eq!(gateway.dispatcher.stats().upgrade_datagram, 1);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn backend_claimed_upgrade_is_handed_over_once() {
    let (backend, datagram) = (bare(), wisp());
    let gateway =
        common::start_gateway(backend.clone(), datagram.clone(), AssetMap::new()).await;

    let raw = common::raw_upgrade(gateway.addr, "/bare/v3/").await;
    assert!(String::from_utf8_lossy(&raw).contains("upgrade:bare"));

    assert_eq!(datagram.upgrade_claim_checks(), 1);
    assert_eq!(backend.upgrade_claim_checks(), 1);
    assert_eq!(backend.upgrades_served(), 1);
    assert_eq!(datagram.upgrades_served(), 0);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn unclaimed_upgrade_is_closed_silently() {
    let (backend, datagram) = (bare(), wisp());
    let gateway =
        common::start_gateway(backend.clone(), datagram.clone(), common::sample_assets()).await;

    let raw = common::raw_upgrade(gateway.addr, "/some/other/path").await;
    assert!(raw.is_empty(), "expected no bytes, got {:?}", String::from_utf8_lossy(&raw));

    assert_eq!(backend.upgrades_served(), 0);
    assert_eq!(datagram.upgrades_served(), 0);
    // Not even the static responder saw it.
    let stats = gateway.dispatcher.stats();
    assert_eq!(stats.upgrade_dropped, 1);
    assert_eq!(stats.statics, 0);
    assert_eq!(stats.not_found, 0);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn failing_upgrade_claim_is_dropped() {
    let backend = MockAdapter::new("bare", Claim::Never, Claim::Fail);
    let gateway = common::start_gateway(backend.clone(), wisp(), AssetMap::new()).await;

    let raw = common::raw_upgrade(gateway.addr, "/bare/v3/").await;
    assert!(raw.is_empty());

    let stats = gateway.dispatcher.stats();
    assert_eq!(stats.claim_errors, 1);
    assert_eq!(stats.upgrade_dropped, 1);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn first_contact_issues_session_cookie() {
    let backend = bare();
    let gateway = common::start_gateway(backend.clone(), wisp(), common::sample_assets()).await;
    let client = reqwest::Client::new();

    let first = client.get(gateway.url("/bare/v3/")).send().await.unwrap();
    let set_cookie = first.headers()[SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("frontdoor.sid="));
    assert!(set_cookie.contains("HttpOnly"));
    let first_body = first.text().await.unwrap();

    let second = client
        .get(gateway.url("/bare/v3/"))
        .header(COOKIE, common::cookie_pair(&set_cookie))
        .send()
        .await
        .unwrap();
    assert!(second.headers().get(SET_COOKIE).is_none());
    assert_eq!(second.text().await.unwrap(), first_body);
    assert_eq!(gateway.dispatcher.sessions().len(), 1);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn tampered_cookie_gets_a_fresh_session() {
    let gateway = common::start_gateway(bare(), wisp(), common::sample_assets()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(gateway.url("/assets/app.js"))
        .header(COOKIE, "frontdoor.sid=forged.c2lnbmF0dXJl")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_some());

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn datagram_upgrade_is_spliced_to_upstream() {
    let upstream = common::start_echo_upstream().await;
    let datagram = Arc::new(DatagramTunnel::new(&DatagramConfig {
        mount_suffix: "/wisp/".to_string(),
        upstream: Some(upstream.to_string()),
    }));
    let gateway = common::start_gateway(bare(), datagram.clone(), AssetMap::new()).await;

    let mut stream = TcpStream::connect(gateway.addr).await.unwrap();
    stream
        .write_all(common::upgrade_request("/wisp/").as_bytes())
        .await
        .unwrap();
    let head = common::read_head(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected head: {head}");

    stream.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"ping");
    assert_eq!(datagram.active_tunnels(), 1);

    // Shutdown cuts the live tunnel.
    gateway.stop().await.unwrap();
    assert_eq!(datagram.active_tunnels(), 0);
    let mut rest = Vec::new();
    let _ = stream.read_to_end(&mut rest).await;
}
