// src/provider/defaults.rs

//! Provider backed by the macOS `defaults` and `plutil` tools.
//!
//! - tree: `defaults export <domain> -` piped into `plutil -convert json`
//!   (plist files are converted directly);
//! - text: `defaults read <domain>`;
//! - targets: `defaults domains` plus the global domain;
//! - typed lookup: `defaults read-type` for top-level keys.
//!
//! `plutil` refuses to convert `<data>` and `<date>` values to JSON; such
//! domains fall back to the text rendering.

use std::io::ErrorKind;
use std::process::{Command, Output, Stdio};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, trace};

use crate::errors::PrefwatchError;
use crate::snapshot::Target;
use crate::value::{KeyPath, Segment, Value};

use super::SnapshotProvider;

const DEFAULTS: &str = "/usr/bin/defaults";
const PLUTIL: &str = "/usr/bin/plutil";
const GLOBAL_DOMAIN: &str = "NSGlobalDomain";

#[derive(Debug, Clone)]
pub struct DefaultsProvider {
    defaults: String,
    plutil: String,
}

impl Default for DefaultsProvider {
    fn default() -> Self {
        Self {
            defaults: DEFAULTS.to_string(),
            plutil: PLUTIL.to_string(),
        }
    }
}

impl DefaultsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn defaults_cmd(&self, target: &Target) -> Command {
        let mut cmd = Command::new(&self.defaults);
        if target.is_current_host() {
            cmd.arg("-currentHost");
        }
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<Output> {
        trace!(?cmd, "running provider command");
        cmd.stdin(Stdio::null())
            .output()
            .with_context(|| format!("running {cmd:?}"))
    }
}

fn does_not_exist(output: &Output) -> bool {
    String::from_utf8_lossy(&output.stderr).contains("does not exist")
}

fn tool_failed(command: String, output: &Output) -> anyhow::Error {
    PrefwatchError::ToolFailed {
        command,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
    .into()
}

fn json_to_tree(bytes: &[u8]) -> Result<Value> {
    let json: serde_json::Value = serde_json::from_slice(bytes).map_err(PrefwatchError::from)?;
    Ok(Value::from(json))
}

impl SnapshotProvider for DefaultsProvider {
    fn fetch_text(&self, target: &Target) -> Result<String> {
        let mut cmd = self.defaults_cmd(target);
        cmd.arg("read").arg(target.defaults_arg());
        let output = self.run(cmd)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        if does_not_exist(&output) {
            return Ok(String::new());
        }
        Err(tool_failed(format!("defaults read {target}"), &output))
    }

    fn fetch_tree(&self, target: &Target) -> Result<Option<Value>> {
        if let Some(path) = target.file_path() {
            if !path.exists() {
                return Ok(Some(Value::Absent));
            }
            let mut cmd = Command::new(&self.plutil);
            cmd.args(["-convert", "json", "-o", "-"]).arg(path);
            let output = match cmd.stdin(Stdio::null()).output() {
                Ok(output) => output,
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
                Err(err) => return Err(err).context("running plutil"),
            };
            if !output.status.success() {
                debug!(target = %target, "plutil could not convert file; using text rendering");
                return Ok(None);
            }
            return json_to_tree(&output.stdout).map(Some);
        }

        let mut export = self.defaults_cmd(target);
        export
            .arg("export")
            .arg(target.defaults_arg())
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut export = export
            .spawn()
            .with_context(|| format!("spawning defaults export for {target}"))?;
        let Some(xml) = export.stdout.take() else {
            return Err(anyhow!("defaults export for {target} has no stdout"));
        };

        let converted = Command::new(&self.plutil)
            .args(["-convert", "json", "-o", "-", "-"])
            .stdin(Stdio::from(xml))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();
        let exported = export
            .wait_with_output()
            .with_context(|| format!("waiting for defaults export of {target}"))?;

        if !exported.status.success() {
            if does_not_exist(&exported) {
                return Ok(Some(Value::Absent));
            }
            return Err(tool_failed(format!("defaults export {target}"), &exported));
        }

        let converted = match converted {
            Ok(output) => output,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).context("running plutil"),
        };
        if !converted.status.success() {
            debug!(
                target = %target,
                stderr = %String::from_utf8_lossy(&converted.stderr).trim(),
                "plutil could not convert export; using text rendering"
            );
            return Ok(None);
        }
        json_to_tree(&converted.stdout).map(Some)
    }

    fn list_targets(&self) -> Result<Vec<Target>> {
        let mut cmd = Command::new(&self.defaults);
        cmd.arg("domains");
        let output = self.run(cmd)?;
        if !output.status.success() {
            return Err(tool_failed("defaults domains".to_string(), &output));
        }
        let listing = String::from_utf8_lossy(&output.stdout);
        let mut targets = vec![Target::domain(GLOBAL_DOMAIN)];
        targets.extend(
            listing
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(Target::domain),
        );
        Ok(targets)
    }

    fn extract_typed(&self, target: &Target, path: &KeyPath) -> Option<Value> {
        let [Segment::Key(key)] = path.segments() else {
            return None;
        };

        let mut cmd = self.defaults_cmd(target);
        cmd.arg("read-type").arg(target.defaults_arg()).arg(key);
        let output = self.run(cmd).ok()?;
        if !output.status.success() {
            return None;
        }
        let kind = String::from_utf8_lossy(&output.stdout)
            .trim()
            .strip_prefix("Type is ")?
            .to_string();

        let mut cmd = self.defaults_cmd(target);
        cmd.arg("read").arg(target.defaults_arg()).arg(key);
        let output = self.run(cmd).ok()?;
        if !output.status.success() {
            return None;
        }
        let raw = String::from_utf8_lossy(&output.stdout);
        let raw = raw.strip_suffix('\n').unwrap_or(&raw);

        let typed = match kind.as_str() {
            "string" => Value::String(raw.to_string()),
            "boolean" => Value::Bool(raw.trim() == "1"),
            "integer" => Value::Integer(raw.trim().parse().ok()?),
            "float" => Value::Float(raw.trim().parse().ok()?),
            other => {
                debug!(target = %target, key = %key, kind = other, "no typed rendering for value");
                return None;
            }
        };
        Some(typed)
    }
}
