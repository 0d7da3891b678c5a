// src/config/validate.rs

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PrefwatchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PrefwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let event_pattern = compile_event_pattern(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, event_pattern))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_polls(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    let window = cfg.config.window_secs;
    if !window.is_finite() || window <= 0.0 {
        return Err(PrefwatchError::ConfigError(format!(
            "[config].window_secs must be > 0 (got {window})"
        )));
    }

    if cfg.config.flush_tick_ms == 0 {
        return Err(PrefwatchError::ConfigError(
            "[config].flush_tick_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_polls(cfg: &RawConfigFile) -> Result<()> {
    for (i, poll) in cfg.poll.iter().enumerate() {
        if poll.target.trim().is_empty() {
            return Err(PrefwatchError::ConfigError(format!(
                "[[poll]] entry {} has an empty target",
                i + 1
            )));
        }
        let secs = poll.interval_secs;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(PrefwatchError::ConfigError(format!(
                "[[poll]] '{}' must have interval_secs > 0 (got {secs})",
                poll.target
            )));
        }
    }
    Ok(())
}

fn compile_event_pattern(cfg: &RawConfigFile) -> Result<Option<Regex>> {
    let Some(events) = &cfg.events else {
        return Ok(None);
    };

    if events.command.trim().is_empty() {
        return Err(PrefwatchError::ConfigError(
            "[events].command must not be empty".to_string(),
        ));
    }

    let pattern = Regex::new(&events.domain_regex).map_err(|e| {
        PrefwatchError::ConfigError(format!("[events].domain_regex is invalid: {e}"))
    })?;

    if !pattern.capture_names().flatten().any(|name| name == "domain") {
        return Err(PrefwatchError::ConfigError(
            "[events].domain_regex must contain a named group `domain`".to_string(),
        ));
    }

    Ok(Some(pattern))
}
