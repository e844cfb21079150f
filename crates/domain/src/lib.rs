//! Shared types for the httpsession workspace: the error type, structured
//! trace events, and the TOML configuration model.

pub mod config;
pub mod error;
pub mod trace;
