// src/txn/bundle.rs

//! Script bundle rendering and writing.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::info;

use crate::fs::FileSystem;
use crate::synth::render::sh_quote;
use crate::synth::SynthesizedCommand;

use super::Transaction;

const HOST_UUID_LINE: &str = r#"HOST_UUID="$(ioreg -rd1 -c IOPlatformExpertDevice | awk -F'"' '/IOPlatformUUID/{print $4}')""#;

/// File name of the bundle for a transaction started at `started_at`.
pub fn bundle_file_name(started_at: DateTime<Local>) -> String {
    format!("prefwatch-{}.sh", started_at.format("%Y%m%d-%H%M%S-%3f"))
}

/// Render a transaction as a self-contained bash script.
///
/// Every step tolerates failure; a failing step reports itself on stderr and
/// the script carries on.
pub fn render_bundle(txn: &Transaction) -> String {
    let mut out = String::new();
    let domains: Vec<&str> = txn.domains().collect();

    out.push_str("#!/bin/bash\n");
    out.push_str("# prefwatch transaction bundle\n");
    let _ = writeln!(
        out,
        "# Started: {}",
        txn.started_at().format("%Y-%m-%d %H:%M:%S%.3f %:z")
    );
    let _ = writeln!(out, "# Context: {}", txn.context());
    let _ = writeln!(out, "# Domains: {}", domains.join(", "));
    let _ = writeln!(out, "# Commands: {}", txn.len());
    out.push('\n');

    if txn.commands().iter().any(|c| c.target.is_current_host()) {
        out.push_str(HOST_UUID_LINE);
        out.push_str("\n\n");
    }

    let mut step = 0usize;
    for domain in &domains {
        let _ = writeln!(out, "# ---- {domain} ----");
        for command in txn.commands_for(domain) {
            step += 1;
            render_step(&mut out, step, command);
        }

        let alternates: Vec<&String> = txn
            .commands_for(domain)
            .flat_map(|c| c.alternate.iter())
            .collect();
        if !alternates.is_empty() {
            out.push_str("# Structural-edit equivalents (PlistBuddy):\n");
            for alt in alternates {
                let _ = writeln!(out, "# {alt}");
            }
        }
        out.push('\n');
    }

    out.push_str("# Reload the preference daemon so the changes are picked up.\n");
    out.push_str("killall cfprefsd 2>/dev/null || true\n");
    out
}

fn render_step(out: &mut String, step: usize, command: &SynthesizedCommand) {
    for warning in &command.warnings {
        let _ = writeln!(out, "# warning: {warning}");
    }
    if command.placeholder {
        let _ = writeln!(out, "# placeholder, edit before use:");
        let _ = writeln!(out, "# {}", command.primary);
        return;
    }
    let failure = format!(
        "prefwatch: step {step} failed ({} {} {})",
        command.domain(),
        command.operation,
        command.path
    );
    let _ = writeln!(out, "{} || echo {} >&2", command.primary, sh_quote(&failure));
}

/// Writes flushed transactions into a bundle directory.
#[derive(Debug, Clone)]
pub struct BundleWriter {
    dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl BundleWriter {
    pub fn new(dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            dir: dir.into(),
            fs,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `txn` and mark it executable. Empty transactions write nothing.
    pub fn write(&self, txn: &Transaction) -> Result<Option<PathBuf>> {
        if txn.is_empty() {
            return Ok(None);
        }
        let path = self.dir.join(bundle_file_name(txn.started_at()));
        self.fs
            .write(&path, render_bundle(txn).as_bytes())
            .with_context(|| format!("writing bundle {}", path.display()))?;
        self.fs
            .set_executable(&path)
            .with_context(|| format!("marking bundle {} executable", path.display()))?;
        info!(
            path = %path.display(),
            commands = txn.len(),
            context = txn.context(),
            "wrote transaction bundle"
        );
        Ok(Some(path))
    }
}
