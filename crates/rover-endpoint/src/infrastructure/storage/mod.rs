//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the endpoint's TOML file, fills in defaults
//! for everything the file leaves out, and validates the result before any
//! hardware is touched.

pub mod config;
