//! HTTP host for the session layer: axum router, session middleware,
//! background sweep wiring and the `httpsession` CLI.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod state;
