//! Front door for a web tunneling service.
//!
//! One listening socket, one dispatcher, every connection routed to exactly
//! one handler.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                      FRONT DOOR                       │
//!                         │                                                       │
//!   Client connection     │  ┌─────────┐   ┌─────────┐   ┌──────────────┐         │
//!   ──────────────────────┼─▶│   net   │──▶│  http   │──▶│   routing    │         │
//!                         │  │listener │   │ server  │   │  dispatcher  │         │
//!                         │  └─────────┘   └─────────┘   └──────┬───────┘         │
//!                         │                                     │                 │
//!                         │        plain request                │  upgrade        │
//!                         │   ┌─────────────┬───────────────────┼──────────┐      │
//!                         │   ▼             ▼                   ▼          ▼      │
//!                         │ ┌──────┐   ┌─────────┐      ┌──────────┐ ┌───────┐    │
//!                         │ │ bare │   │ statics │      │   wisp   │ │ drop  │    │
//!                         │ │adapt.│   │responder│      │ (suffix) │ │(close)│    │
//!                         │ └──┬───┘   └─────────┘      └────┬─────┘ └───────┘    │
//!                         │    │                             │                    │
//!                         │    ▼                             ▼                    │
//!                         │  tunnel backend upstream   datagram tunnel upstream   │
//!                         │                                                       │
//!                         │  ┌─────────────────────────────────────────────────┐  │
//!                         │  │              Cross-Cutting Concerns             │  │
//!                         │  │ config │ session │ observability │ security     │  │
//!                         │  │ lifecycle (RUNNING → DRAINING → STOPPED)        │  │
//!                         │  └─────────────────────────────────────────────────┘  │
//!                         └──────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Handlers
pub mod adapters;
pub mod session;
pub mod statics;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::Gateway;
pub use lifecycle::{Shutdown, ShutdownState};
pub use routing::Dispatcher;
