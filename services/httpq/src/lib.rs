//! httpq service library crate.
//!
//! Exposes the HTTP API, configuration, and observability wiring for use by
//! the `httpq` binary and integration tests.
pub mod api;
pub mod app;
pub mod config;
pub mod observability;
pub mod server;
pub mod sweeper;
