//! rssagg-notify library crate.
//!
//! Notification storage and dispatch plus periodic change detection for an RSS
//! aggregator. The binary wires these together; the modules are public for
//! integration testing.

pub mod config;
pub mod database;
pub mod detector;
pub mod error;
pub mod logging;
pub mod notification;
pub mod scheduler;
pub mod starring;

pub use error::{Error, Result};
