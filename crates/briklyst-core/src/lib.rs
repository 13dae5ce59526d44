pub mod analytics;
pub mod config;
pub mod error;
pub mod range;
pub mod storefront;
pub mod visitor;
