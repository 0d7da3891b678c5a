// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{ConfigOverrides, PollConfig};
use crate::filter::split_patterns;

/// Command-line arguments for `prefwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "prefwatch",
    version,
    about = "Watch macOS preferences and turn every change into a replayable command.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Prefwatch.toml` in the current working directory. A missing
    /// default file means built-in defaults; a missing explicit file is an
    /// error.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PREFWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Parse + validate config, print the effective setup, but don't watch.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Flags layered over the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct OverrideArgs {
    /// Comma-separated domain globs to ignore entirely.
    #[arg(long, env = "PREFWATCH_EXCLUDE_DOMAINS", value_name = "GLOBS", global = true)]
    pub exclude_domains: Option<String>,

    /// Comma-separated globs over rendered commands to suppress.
    #[arg(long, env = "PREFWATCH_EXCLUDE_COMMANDS", value_name = "GLOBS", global = true)]
    pub exclude_commands: Option<String>,

    /// Transaction window in seconds.
    #[arg(long, value_name = "SECS")]
    pub window: Option<f64>,

    /// Write one executable bundle script per transaction into this directory.
    #[arg(long, value_name = "DIR")]
    pub bundle_dir: Option<String>,

    /// Append command lines to this file.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<String>,

    /// Poll a target periodically: `DOMAIN[@SECS]` or `PATH[@SECS]`.
    #[arg(long = "poll", value_name = "TARGET[@SECS]")]
    pub polls: Vec<String>,

    /// Disable the filesystem watcher.
    #[arg(long)]
    pub no_fs: bool,

    /// Don't echo command lines on stdout.
    #[arg(long, short)]
    pub quiet: bool,
}

impl OverrideArgs {
    pub fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            exclude_domains: self
                .exclude_domains
                .as_deref()
                .map(split_patterns)
                .unwrap_or_default(),
            exclude_commands: self
                .exclude_commands
                .as_deref()
                .map(split_patterns)
                .unwrap_or_default(),
            window_secs: self.window,
            bundle_dir: self.bundle_dir.clone(),
            log_file: self.log_file.clone(),
            polls: self.polls.iter().map(|p| parse_poll_arg(p)).collect(),
            no_fs: self.no_fs,
            quiet: self.quiet,
        }
    }
}

/// Parse `TARGET[@SECS]`. A suffix that is not a number is part of the
/// target.
pub fn parse_poll_arg(arg: &str) -> PollConfig {
    let (target, secs) = match arg.rsplit_once('@') {
        Some((target, secs)) => match secs.parse::<f64>() {
            Ok(secs) => (target, Some(secs)),
            Err(_) => (arg, None),
        },
        None => (arg, None),
    };
    let (target, current_host) = match target.strip_prefix("host:") {
        Some(rest) => (rest, true),
        None => (target, false),
    };
    PollConfig {
        target: target.to_string(),
        interval_secs: secs.unwrap_or(5.0),
        current_host,
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Watch preferences and log synthesized commands (the default).
    Watch,

    /// Diff two JSON renderings of a domain and print the commands that turn
    /// OLD into NEW.
    Diff {
        old: PathBuf,
        new: PathBuf,

        /// Domain the commands address.
        #[arg(long, default_value = "com.example.app")]
        domain: String,

        #[arg(long)]
        current_host: bool,

        /// Skip noise and exclusion filtering.
        #[arg(long)]
        raw: bool,

        /// Apply the unfiltered commands to OLD and check the result equals
        /// NEW.
        #[arg(long)]
        verify: bool,
    },

    /// Capture one target and print its leaves with inferred types.
    Snapshot {
        /// Domain name or plist path.
        target: String,

        #[arg(long)]
        current_host: bool,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
