//! Business logic services for the Apparel Wholesale Platform

pub mod allocation;
pub mod order;
pub mod product;

pub use allocation::AllocationService;
pub use order::OrderService;
pub use product::ProductService;
