mod setups;
mod steps;
mod world;

pub use world::{MarketWorld, MarketplaceSystem, WEBHOOK_SECRET};
