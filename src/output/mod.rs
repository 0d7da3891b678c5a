// src/output/mod.rs

//! Where admitted commands and flushed transactions go.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local};

use crate::fs::FileSystem;
use crate::snapshot::Target;
use crate::synth::SynthesizedCommand;
use crate::txn::{BundleWriter, Transaction};
use crate::types::TriggerSource;

/// Admitted commands of one observation cycle of one target.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub target: Target,
    pub source: TriggerSource,
    pub context: Option<String>,
    pub at: DateTime<Local>,
    pub commands: Vec<SynthesizedCommand>,
}

impl Cycle {
    /// Log rendering: a comment header followed by every command's lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "# {} {} ({}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.target,
            self.source
        );
        if let Some(context) = &self.context {
            let _ = write!(out, ", {context}");
        }
        out.push_str(")\n");
        for command in &self.commands {
            for line in command.render_lines() {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

/// Consumer-side output. Only the pipeline consumer calls this, so
/// implementations need no internal locking.
pub trait CommandSink: Send {
    fn emit(&mut self, cycle: &Cycle) -> Result<()>;

    /// Persist a flushed transaction; returns the bundle path if one was
    /// written.
    fn flush(&mut self, txn: &Transaction) -> Result<Option<PathBuf>>;
}

/// Appends `Cmd:` lines to a log file, optionally echoes them to stdout, and
/// writes bundles.
#[derive(Debug)]
pub struct LogSink {
    fs: Arc<dyn FileSystem>,
    log_file: Option<PathBuf>,
    echo_stdout: bool,
    bundles: Option<BundleWriter>,
}

impl LogSink {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            log_file: None,
            echo_stdout: false,
            bundles: None,
        }
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_stdout(mut self, echo: bool) -> Self {
        self.echo_stdout = echo;
        self
    }

    pub fn with_bundle_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundles = Some(BundleWriter::new(dir, Arc::clone(&self.fs)));
        self
    }
}

impl CommandSink for LogSink {
    fn emit(&mut self, cycle: &Cycle) -> Result<()> {
        let rendered = cycle.render();
        if self.echo_stdout {
            print!("{rendered}");
        }
        if let Some(path) = &self.log_file {
            self.fs.append(path, rendered.as_bytes())?;
        }
        Ok(())
    }

    fn flush(&mut self, txn: &Transaction) -> Result<Option<PathBuf>> {
        match &self.bundles {
            Some(writer) => writer.write(txn),
            None => Ok(None),
        }
    }
}
