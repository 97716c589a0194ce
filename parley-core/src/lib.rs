//! Shared runtime pieces for the Parley backend.
//!
//! Every other crate in the workspace leans on this one for three things:
//! layered configuration ([`ParleyConfig`]), the JSON error envelope used by
//! plain HTTP handlers ([`HttpError`]), and the tower layers installed around
//! the router ([`init_tracing`], [`default_trace`], [`default_cors`]).

pub mod config;
pub mod error;
pub mod layers;

pub use config::{ConfigError, ConfigValue, DefaultSecretResolver, FromConfigValue, ParleyConfig, SecretResolver};
pub use error::{error_response, HttpError};
pub use layers::{catch_panic_layer, default_cors, default_trace, init_tracing};
