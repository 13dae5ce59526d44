pub mod analytics_impl;
pub mod auth;
pub mod backend;
pub mod campaign;
pub mod clicks;
pub mod collection;
pub mod product;
pub mod schema;
pub mod storefront;
pub mod subscriber;
pub mod template;

pub use backend::DuckDbBackend;
