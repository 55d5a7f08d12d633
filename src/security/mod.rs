//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway-produced response:
//!     → headers.rs (hardening headers)
//! Forwarded request/response:
//!     → headers.rs (strip hop-by-hop headers)
//! ```

pub mod headers;
