// src/config/mod.rs

//! Configuration loading and validation for prefwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and merge CLI overrides (`loader.rs`).
//! - Validate windows, intervals and the event pattern (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_effective, load_from_path};
pub use model::{
    expand_home, ConfigFile, ConfigOverrides, ConfigSection, EventsSection, ExcludeSection,
    PollConfig, RawConfigFile, WatchSection,
};
