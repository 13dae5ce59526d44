pub mod analytics;
pub mod campaigns;
pub mod clicks;
pub mod collections;
pub mod export;
pub mod health;
pub mod products;
pub mod public;
pub mod storefront;
pub mod subscribers;
