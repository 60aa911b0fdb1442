//! node-targets Core Library
//!
//! This crate provides the membership model behind node-targets: node
//! records, the in-memory membership store, watch event application and the
//! scrape target rendering.
//!
//! # Modules
//!
//! - [`types`]: Node identities, records, version tokens and watch events
//! - [`store`]: The membership store
//! - [`applier`]: Applying watch events to the store
//! - [`render`]: Target file rendering
//! - [`error`]: Error types

pub mod applier;
pub mod error;
pub mod render;
pub mod store;
pub mod types;

pub use applier::{apply, Applied};
pub use error::{Error, Result};
pub use render::render_targets;
pub use store::MembershipStore;
pub use types::*;
