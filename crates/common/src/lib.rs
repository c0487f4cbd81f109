//! Common utilities and types shared across the SFU control-plane crates.

#![warn(clippy::pedantic)]

/// Module for common identifier and application data types
pub mod types;

/// Module for common configuration
pub mod config;

/// Module for tracing subscriber initialisation
pub mod logging;
