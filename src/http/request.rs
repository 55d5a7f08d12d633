//! Request inspection helpers.
//!
//! # Responsibilities
//! - Detect protocol upgrade attempts
//! - Carry the peer address to adapters

use std::net::SocketAddr;

use axum::http::{header, HeaderMap};

/// Address of the client on the other end of the connection.
///
/// Inserted into request extensions by the server loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// Whether the request negotiates a protocol switch.
///
/// Requires an `upgrade` token in `Connection` (comma lists and repeated
/// headers allowed, case-insensitive) and an `Upgrade` header.
pub fn is_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    connection_upgrade && headers.contains_key(header::UPGRADE)
}
