//! chartkit - building blocks for chart reconcilers
//!
//! A bounded, TTL-aware artifact cache with event counters, and a generator
//! for registry clients backed by per-request credentials files.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod registry;
pub mod ui;

pub use error::{ChartkitError, ChartkitResult};
