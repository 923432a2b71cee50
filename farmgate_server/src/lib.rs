//! # Farmgate server
//! This crate hosts the HTTP surface of the Farmgate marketplace. It is responsible for:
//! * Reading the caller's identity from the gateway headers and enforcing role requirements per route.
//! * Translating requests into calls on the engine APIs and engine errors into HTTP responses.
//! * Receiving signed payment notifications from the payment provider.
//! * Running the expiry worker that closes stale inquiries and, optionally, unpaid orders.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/payments/webhook`: The payment provider's notification endpoint.
//! * `/api/orders/...` and `/api/inquiries/...`: The marketplace API. See [routes](routes/index.html).

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
