//! Session identity subsystem.
//!
//! # Responsibilities
//! - Issue signed session cookies on first contact
//! - Resolve presented cookies to a stable per-client identity
//!
//! # Design Decisions
//! - Never gates access: a missing or invalid session just mints a new one
//! - Cookie attributes are fixed policy (HttpOnly, SameSite=Lax, Secure in production)
//! - Injected into the dispatcher, never a global

pub mod cookie;
pub mod store;

pub use store::{Ensured, Session, SessionError, SessionStore, SessionToken};
