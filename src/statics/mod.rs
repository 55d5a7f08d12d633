//! Static responder subsystem.
//!
//! # Data Flow
//! ```text
//! startup:  public_dir + mounts + adapter client assets → assets.rs (AssetMap)
//! request:  unclaimed request → responder.rs → asset (200, immutable cache) | 404 page
//! ```
//!
//! # Design Decisions
//! - Assets are read into memory once; no filesystem access while serving
//! - The responder always produces a response, so it is the terminal fallback

pub mod assets;
pub mod responder;

pub use assets::{Asset, AssetMap};
pub use responder::StaticResponder;
