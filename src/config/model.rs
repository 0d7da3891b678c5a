// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::engine::{PollSpec, SchedulerOptions};
use crate::filter::ExclusionRules;
use crate::snapshot::Target;
use crate::types::Scope;
use crate::watch::EventFeedSpec;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// window_secs = 3
/// bundle_dir = "~/Desktop/prefwatch"
/// log_file = "~/Library/Logs/prefwatch.log"
///
/// [exclude]
/// domains = ["com.apple.xpc.*", "com.vendor.blocked"]
/// commands = ["*MRU*"]
///
/// [noise]
/// "com.apple.dock" = ["lastShowIndicatorTime"]
///
/// [watch]
/// dirs = ["~/Library/Preferences"]
///
/// [[poll]]
/// target = "com.apple.dock"
/// interval_secs = 2
///
/// [events]
/// command = "log stream --style compact --predicate 'subsystem == \"com.apple.defaults\"'"
/// domain_regex = 'domain: (?P<domain>[\w.-]+)'
/// ```
///
/// All sections are optional and have reasonable defaults; a missing config
/// file is the same as an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub exclude: ExcludeSection,

    /// Extra volatile keys: domain glob → key globs.
    #[serde(default)]
    pub noise: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub watch: WatchSection,

    /// `[[poll]]` entries.
    #[serde(default)]
    pub poll: Vec<PollConfig>,

    #[serde(default)]
    pub events: Option<EventsSection>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Transaction window in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    /// How often an expired transaction window is checked, in milliseconds.
    #[serde(default = "default_flush_tick_ms")]
    pub flush_tick_ms: u64,

    /// Append `Cmd:` lines here.
    #[serde(default)]
    pub log_file: Option<String>,

    /// Write one bundle script per transaction into this directory.
    #[serde(default)]
    pub bundle_dir: Option<String>,

    /// Echo `Cmd:` lines on stdout.
    #[serde(default = "default_true")]
    pub echo_stdout: bool,

    /// Baseline every domain the provider lists at startup.
    #[serde(default = "default_true")]
    pub initial_scan: bool,

    /// Use the built-in noisy-key and noisy-command tables.
    #[serde(default = "default_true")]
    pub builtin_noise: bool,
}

fn default_window_secs() -> f64 {
    3.0
}

fn default_flush_tick_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            flush_tick_ms: default_flush_tick_ms(),
            log_file: None,
            bundle_dir: None,
            echo_stdout: true,
            initial_scan: true,
            builtin_noise: true,
        }
    }
}

/// `[exclude]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExcludeSection {
    /// Domain globs; matching domains are never fetched, diffed or logged.
    #[serde(default)]
    pub domains: Vec<String>,

    /// Globs over rendered command lines.
    #[serde(default)]
    pub commands: Vec<String>,

    /// Extra regular expressions over rendered command lines.
    #[serde(default)]
    pub noisy_commands: Vec<String>,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_watch_dirs")]
    pub dirs: Vec<String>,
}

fn default_watch_dirs() -> Vec<String> {
    vec!["~/Library/Preferences".to_string()]
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            enabled: true,
            dirs: default_watch_dirs(),
        }
    }
}

/// One `[[poll]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Domain name or plist path.
    pub target: String,

    #[serde(default = "default_poll_secs")]
    pub interval_secs: f64,

    #[serde(default)]
    pub current_host: bool,
}

fn default_poll_secs() -> f64 {
    5.0
}

/// `[events]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsSection {
    pub command: String,
    /// Must contain a `(?P<domain>...)` group; `(?P<context>...)` is optional.
    pub domain_regex: String,
}

/// Command-line overrides merged into a raw config before validation.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub exclude_domains: Vec<String>,
    pub exclude_commands: Vec<String>,
    pub window_secs: Option<f64>,
    pub bundle_dir: Option<String>,
    pub log_file: Option<String>,
    pub polls: Vec<PollConfig>,
    pub no_fs: bool,
    pub quiet: bool,
}

impl RawConfigFile {
    /// Merge `overrides`: pattern lists and polls are appended, scalars
    /// replace.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        self.exclude
            .domains
            .extend(overrides.exclude_domains.iter().cloned());
        self.exclude
            .commands
            .extend(overrides.exclude_commands.iter().cloned());
        if let Some(window) = overrides.window_secs {
            self.config.window_secs = window;
        }
        if let Some(dir) = &overrides.bundle_dir {
            self.config.bundle_dir = Some(dir.clone());
        }
        if let Some(file) = &overrides.log_file {
            self.config.log_file = Some(file.clone());
        }
        self.poll.extend(overrides.polls.iter().cloned());
        if overrides.no_fs {
            self.watch.enabled = false;
        }
        if overrides.quiet {
            self.config.echo_stdout = false;
        }
    }
}

/// A validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub exclude: ExcludeSection,
    pub noise: BTreeMap<String, Vec<String>>,
    pub watch: WatchSection,
    pub poll: Vec<PollConfig>,
    pub events: Option<EventsSection>,
    event_pattern: Option<Regex>,
}

impl ConfigFile {
    /// Construct a `ConfigFile` without running validation.
    pub(crate) fn new_unchecked(raw: RawConfigFile, event_pattern: Option<Regex>) -> Self {
        Self {
            config: raw.config,
            exclude: raw.exclude,
            noise: raw.noise,
            watch: raw.watch,
            poll: raw.poll,
            events: raw.events,
            event_pattern,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs_f64(self.config.window_secs)
    }

    pub fn flush_tick(&self) -> Duration {
        Duration::from_millis(self.config.flush_tick_ms)
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.config.log_file.as_deref().map(expand_home)
    }

    pub fn bundle_dir(&self) -> Option<PathBuf> {
        self.config.bundle_dir.as_deref().map(expand_home)
    }

    pub fn exclusion_rules(&self) -> ExclusionRules {
        ExclusionRules {
            domain_patterns: self.exclude.domains.clone(),
            command_target_patterns: self.exclude.commands.clone(),
            noisy_keys: self.noise.clone(),
            noisy_command_patterns: self.exclude.noisy_commands.clone(),
            builtin_noise: self.config.builtin_noise,
        }
    }

    pub fn polls(&self) -> Vec<PollSpec> {
        self.poll
            .iter()
            .map(|p| {
                let scope = if p.current_host {
                    Scope::CurrentHost
                } else {
                    Scope::User
                };
                PollSpec {
                    target: Target::parse(&expand_home(&p.target).to_string_lossy(), scope),
                    interval: Duration::from_secs_f64(p.interval_secs),
                }
            })
            .collect()
    }

    pub fn event_feed(&self) -> Option<EventFeedSpec> {
        let events = self.events.as_ref()?;
        let pattern = self.event_pattern.clone()?;
        Some(EventFeedSpec {
            command: events.command.clone(),
            pattern,
        })
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            initial_scan: self.config.initial_scan,
            watch_dirs: self.watch.dirs.iter().map(|d| expand_home(d)).collect(),
            fs_feed: self.watch.enabled,
            polls: self.polls(),
            events: self.event_feed(),
            flush_tick: self.flush_tick(),
        }
    }
}

/// Expand a leading `~` to `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}
