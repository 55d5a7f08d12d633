//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use frontdoor::adapters::{AdapterError, ClaimError, TunnelAdapter};
use frontdoor::config::SessionConfig;
use frontdoor::http::ServerError;
use frontdoor::net::Listener;
use frontdoor::session::{Session, SessionStore};
use frontdoor::statics::{AssetMap, StaticResponder};
use frontdoor::{Dispatcher, Gateway, Shutdown};

pub const MAX_AGE_SECS: u64 = 2_592_000;

/// How a mock adapter answers claim checks.
#[derive(Debug, Clone, Copy)]
pub enum Claim {
    Never,
    Prefix(&'static str),
    Suffix(&'static str),
    Fail,
}

impl Claim {
    fn evaluate(&self, request: &Request) -> Result<bool, ClaimError> {
        let path = request.uri().path();
        match self {
            Claim::Never => Ok(false),
            Claim::Prefix(prefix) => Ok(path.starts_with(prefix)),
            Claim::Suffix(suffix) => Ok(path.ends_with(suffix)),
            Claim::Fail => Err(ClaimError::MalformedTarget(path.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct Calls {
    pub claims: AtomicUsize,
    pub claims_upgrade: AtomicUsize,
    pub serve: AtomicUsize,
    pub serve_upgrade: AtomicUsize,
    pub close: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Adapter double that records every call.
///
/// `serve` answers `mock:<name> session=<token>`; `serve_upgrade` answers
/// `upgrade:<name>` with `Connection: close` so raw clients see EOF.
pub struct MockAdapter {
    name: &'static str,
    claim: Claim,
    upgrade_claim: Claim,
    pub calls: Calls,
}

impl MockAdapter {
    pub fn new(name: &'static str, claim: Claim, upgrade_claim: Claim) -> Arc<Self> {
        Arc::new(Self {
            name,
            claim,
            upgrade_claim,
            calls: Calls::default(),
        })
    }

    pub fn claim_checks(&self) -> usize {
        Calls::get(&self.calls.claims)
    }

    pub fn upgrade_claim_checks(&self) -> usize {
        Calls::get(&self.calls.claims_upgrade)
    }

    pub fn served(&self) -> usize {
        Calls::get(&self.calls.serve)
    }

    pub fn upgrades_served(&self) -> usize {
        Calls::get(&self.calls.serve_upgrade)
    }

    pub fn closed(&self) -> usize {
        Calls::get(&self.calls.close)
    }
}

#[async_trait]
impl TunnelAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn claims(&self, request: &Request) -> Result<bool, ClaimError> {
        self.calls.claims.fetch_add(1, Ordering::SeqCst);
        self.claim.evaluate(request)
    }

    fn claims_upgrade(&self, request: &Request) -> Result<bool, ClaimError> {
        self.calls.claims_upgrade.fetch_add(1, Ordering::SeqCst);
        self.upgrade_claim.evaluate(request)
    }

    async fn serve(&self, request: Request) -> Response {
        self.calls.serve.fetch_add(1, Ordering::SeqCst);
        let token = request
            .extensions()
            .get::<Session>()
            .map(|s| s.token.to_string())
            .unwrap_or_default();
        format!("mock:{} session={token}", self.name).into_response()
    }

    async fn serve_upgrade(&self, _request: Request) -> Result<Response, AdapterError> {
        self.calls.serve_upgrade.fetch_add(1, Ordering::SeqCst);
        Ok((
            StatusCode::OK,
            [(header::CONNECTION, "close")],
            format!("upgrade:{}", self.name),
        )
            .into_response())
    }

    async fn close(&self) -> Result<(), AdapterError> {
        self.calls.close.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A gateway running on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub dispatcher: Arc<Dispatcher>,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server loop to return.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("gateway did not stop")
            .expect("gateway task panicked")
    }
}

pub async fn start_gateway(
    backend: Arc<dyn TunnelAdapter>,
    datagram: Arc<dyn TunnelAdapter>,
    assets: AssetMap,
) -> TestGateway {
    let sessions = SessionStore::new(&SessionConfig::default(), false).unwrap();
    let statics = StaticResponder::new(assets, MAX_AGE_SECS);
    let gateway = Gateway::new(
        Dispatcher::new(backend, datagram, statics, sessions),
        Duration::from_secs(2),
    );

    let listener = Listener::from_tcp(TcpListener::bind("127.0.0.1:0").await.unwrap(), 64).unwrap();
    let addr = listener.local_addr().unwrap();
    let dispatcher = gateway.dispatcher().clone();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(gateway.run(listener, shutdown.clone()));

    TestGateway {
        addr,
        shutdown,
        dispatcher,
        handle,
    }
}

/// Asset map with one script and one index page.
pub fn sample_assets() -> AssetMap {
    let mut assets = AssetMap::new();
    assets.insert("/assets/app.js", "console.log('front door');");
    assets.insert("/index.html", "<h1>front door</h1>");
    assets
}

pub fn upgrade_request(path: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: localhost\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
    )
}

/// Send a raw upgrade request and read until the server closes.
pub async fn raw_upgrade(addr: SocketAddr, path: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(upgrade_request(path).as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    // A reset counts as closed too.
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("server kept the connection open");
    buf
}

/// Read an HTTP head (up to the blank line) from a raw stream.
pub async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).await.unwrap();
        assert!(n > 0, "connection closed mid-head");
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

/// Upstream that accepts one upgrade, answers 101 and echoes bytes back.
pub async fn start_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_head(&mut socket).await;
                let reply = "HTTP/1.1 101 Switching Protocols\r\n\
                             Connection: Upgrade\r\n\
                             Upgrade: websocket\r\n\r\n";
                if socket.write_all(reply.as_bytes()).await.is_err() {
                    return;
                }
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// Pull the `name=value` pair out of a Set-Cookie header.
pub fn cookie_pair(set_cookie: &str) -> &str {
    set_cookie.split(';').next().unwrap_or_default().trim()
}

/// Upstream that accepts one request, hands its head to the returned
/// receiver and answers with `reply` verbatim.
pub async fn start_recording_upstream(
    reply: &'static str,
) -> (SocketAddr, tokio::sync::oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let head = read_head(&mut socket).await;
        let _ = tx.send(head);
        let _ = socket.write_all(reply.as_bytes()).await;
        let _ = socket.shutdown().await;
    });

    (addr, rx)
}

/// Header lines of a raw HTTP head, lower-cased, status or request line dropped.
pub fn header_lines(head: &str) -> Vec<String> {
    head.lines()
        .skip(1)
        .filter(|line| !line.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}
