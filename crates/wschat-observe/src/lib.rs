//! Logging setup for wschat.

pub mod tracing_setup;
