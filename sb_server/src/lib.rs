//! HTTP server for the simple_bank ledger.
//!
//! The binary in `main.rs` wires configuration, logging, metrics and the
//! PostgreSQL store into the router built by [`api::create_router`].

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
