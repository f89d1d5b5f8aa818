//! HTTP handlers for the Apparel Wholesale Platform

mod health;
mod orders;
mod products;

pub use health::*;
pub use orders::*;
pub use products::*;
