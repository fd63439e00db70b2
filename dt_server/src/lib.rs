//! HTTP server for shared dine-in table tabs.
//!
//! Exposes [`dine_tab`] over a JSON API. See [`api`] for the endpoint list.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
