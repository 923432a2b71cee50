//! # Farmgate engine public API
//!
//! The `fg_api` module exposes the programmatic API of the marketplace engine. Each API covers one part of the
//! marketplace and can be used on its own:
//!
//! * [`order_flow_api`] places orders from a buyer's cart and moves them through their lifecycle, keeping the
//!   inventory ledger in step with every status change. It also records payment attempts.
//! * [`payment_reconciliation_api`] consumes signed payment provider notifications and applies them idempotently.
//! * [`quote_api`] runs wholesale inquiries, from the buyer's opening proposal to the order at the agreed price.
//!
//! The `*_objects` submodules hold the request and support types used by these APIs.
//!
//! # API usage
//!
//! Every API is created by supplying a database backend that implements [`MarketplaceDatabase`] and the event
//! producers that should be told about committed changes. Every call names the [`Actor`] it acts for.
//!
//! ```rust,ignore
//! use farmgate_engine::{db_types::{Actor, DeliveryMethod}, events::EventProducers, order_objects::Cart, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/farmgate.db", 5).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let cart = Cart::new(DeliveryMethod::Pickup).with_item(1, 10);
//! let order = api.place_order(&Actor::buyer("somchai"), cart).await?;
//! ```
//!
//! [`MarketplaceDatabase`]: crate::traits::MarketplaceDatabase
//! [`Actor`]: crate::db_types::Actor

pub mod inquiry_objects;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_objects;
pub mod payment_reconciliation_api;
pub mod quote_api;
