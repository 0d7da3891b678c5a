// src/config/loader.rs

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, ConfigOverrides, RawConfigFile};
use crate::errors::{PrefwatchError, Result};
use crate::fs::FileSystem;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_effective`] for that.
pub fn load_from_path(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs.read_to_string(path).map_err(read_error)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load the config used by a run: the file at `path` if it exists (an empty
/// config otherwise, unless `required`), with `overrides` merged in, then
/// validated.
pub fn load_effective(
    fs: &dyn FileSystem,
    path: impl AsRef<Path>,
    required: bool,
    overrides: &ConfigOverrides,
) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw = if fs.is_file(path) || required {
        load_from_path(fs, path)?
    } else {
        debug!(path = %path.display(), "no config file; using defaults");
        RawConfigFile::default()
    };
    raw.apply(overrides);
    ConfigFile::try_from(raw)
}

/// Keep an underlying I/O failure visible as `IoError`.
fn read_error(err: anyhow::Error) -> PrefwatchError {
    match err.downcast_ref::<io::Error>() {
        Some(io_err) => PrefwatchError::IoError(io::Error::new(io_err.kind(), format!("{err:#}"))),
        None => PrefwatchError::Other(err),
    }
}

/// Default config location: `Prefwatch.toml` in the current working
/// directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Prefwatch.toml")
}
