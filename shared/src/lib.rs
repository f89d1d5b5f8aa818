//! Shared types and models for the Apparel Wholesale Platform
//!
//! This crate contains the domain models, the inventory allocation engine,
//! and validation helpers shared across the backend and tooling.

pub mod allocation;
pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
