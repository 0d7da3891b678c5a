#![allow(dead_code)]

use chrono::{DateTime, Local, TimeDelta, TimeZone};
use prefwatch::config::{ConfigFile, PollConfig, RawConfigFile};
use prefwatch::snapshot::{Snapshot, Target};
use prefwatch::value::{Record, Value};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn window_secs(mut self, secs: f64) -> Self {
        self.config.config.window_secs = secs;
        self
    }

    pub fn exclude_domain(mut self, pattern: &str) -> Self {
        self.config.exclude.domains.push(pattern.to_string());
        self
    }

    pub fn exclude_command(mut self, pattern: &str) -> Self {
        self.config.exclude.commands.push(pattern.to_string());
        self
    }

    pub fn noisy_key(mut self, domain: &str, key: &str) -> Self {
        self.config
            .noise
            .entry(domain.to_string())
            .or_default()
            .push(key.to_string());
        self
    }

    pub fn poll(mut self, target: &str, interval_secs: f64) -> Self {
        self.config.poll.push(PollConfig {
            target: target.to_string(),
            interval_secs,
            current_host: false,
        });
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `Value::String`.
pub fn s(v: &str) -> Value {
    Value::String(v.to_string())
}

/// `Value::Integer`.
pub fn int(v: i64) -> Value {
    Value::Integer(v)
}

/// `Value::Array`.
pub fn arr(items: Vec<Value>) -> Value {
    Value::Array(items)
}

/// Record with fields in the given order.
pub fn rec(fields: &[(&str, Value)]) -> Value {
    let mut record = Record::new();
    for (key, value) in fields {
        record.insert((*key).to_string(), value.clone());
    }
    Value::Record(record)
}

/// Structured snapshot of `domain` with sequence number `seq`.
pub fn tree_snapshot(domain: &str, tree: Value, seq: u64) -> Snapshot {
    Snapshot::from_tree(Target::domain(domain), tree).with_seq(seq)
}

/// Fixed reference instant for time-driven tests.
pub fn t0() -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 5, 17, 10, 0, 0)
        .single()
        .expect("unambiguous test instant")
}

/// `base` shifted by `secs` (may be fractional).
pub fn after(base: DateTime<Local>, secs: f64) -> DateTime<Local> {
    base + TimeDelta::milliseconds((secs * 1000.0).round() as i64)
}
