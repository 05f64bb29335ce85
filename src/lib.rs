//! boxoffice: an event ticketing backend.
//!
//! Sells tickets against a hard capacity, reconciles payment outcomes from a
//! card gateway (polling and webhooks converge on the same ledger), issues
//! signed single-use scan credentials, and runs per-event waitlists.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod payments;
pub mod promo;
pub mod scan;
pub mod util;
