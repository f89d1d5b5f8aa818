//! Database models for the Apparel Wholesale Platform
//!
//! Re-exports models from the shared crate

pub use shared::models::*;
