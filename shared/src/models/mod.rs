//! Domain models for the Apparel Wholesale Platform

mod order;
mod product;

pub use order::*;
pub use product::*;
