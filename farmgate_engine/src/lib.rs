//! Farmgate Marketplace Engine
//!
//! Farmgate connects buyers directly with farms. This library contains the core logic of the marketplace: the order
//! lifecycle, the inventory ledger that backs it, payment reconciliation and wholesale quote negotiation. It is
//! transport-agnostic; the HTTP surface lives in the `farmgate_server` crate.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`mod@traits`] and [`mod@sqlite`]). The traits define what a backend must provide. SQLite is the
//!    supported backend. You should never need to access the database directly. Use the public API instead. The
//!    exception is the data types used in the database, which are defined in [`mod@db_types`] and are public.
//! 2. The lifecycle rules ([`mod@lifecycle`]) and the price resolver ([`mod@pricing`]). These are pure functions with no
//!    I/O, and every status change in the engine is validated by them first.
//! 3. The public API ([`OrderFlowApi`], [`PaymentReconciliationApi`] and [`QuoteApi`]).
//!
//! The engine also emits events after committed changes, for example when an order has been paid. A simple pub-sub
//! framework ([`mod@events`]) lets you hook into these events and perform custom actions, such as notifying the buyer.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod lifecycle;
pub mod pricing;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

mod fg_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use fg_api::{
    inquiry_objects,
    order_flow_api::{role_may_request, OrderFlowApi},
    order_objects,
    payment_objects,
    payment_reconciliation_api::{PaymentReconciliationApi, DEFAULT_SIGNATURE_TOLERANCE},
    quote_api::{QuoteApi, DEFAULT_INQUIRY_TTL_HOURS},
};
pub use traits::{
    InquiryManagement,
    InventoryManagement,
    MarketplaceDatabase,
    MarketplaceError,
    OrderManagement,
    PaymentManagement,
    PaymentSettlement,
    SweepResult,
    TransitionDetails,
};
