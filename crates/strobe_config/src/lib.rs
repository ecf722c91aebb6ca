//! Parsing and validation of `strobe.toml` clock/reset configuration files.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`ProjectConfig`], then resolves it into a [`ResolvedDesign`] whose
//! frequencies are exact and whose cross-references have been checked.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::{
    resolve_design, BridgeRequest, CalibrationRequest, DomainRequest, ResolvedDesign,
    ResolvedPll,
};
pub use types::*;
