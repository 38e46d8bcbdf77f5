//! Shared utilities for stock-pulse
//!
//! This crate provides the ambient pieces used across the workspace:
//! tracing subscriber setup and helpers for reading configuration from
//! environment variables.

pub mod config;
pub mod logging;

pub use config::{EnvError, env_parse, env_string};
pub use logging::{LogFormat, init_tracing_with};
