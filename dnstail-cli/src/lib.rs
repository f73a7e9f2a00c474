//! dnstail CLI library.
//!
//! Exposes the binary's building blocks for integration testing.
//! In production, `dnstail` is used as a binary (main.rs).

pub mod cli;
pub mod error;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
