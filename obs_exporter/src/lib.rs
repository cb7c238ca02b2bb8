//! Library surface for obs_exporter; the binary and integration tests use it.

pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod proto;
pub mod state;
pub mod types;
pub mod ws;
