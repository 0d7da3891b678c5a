// src/snapshot.rs

//! Observed state of one preference target.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::Regex;

use crate::types::{Scope, SnapshotOrigin};
use crate::value::{KeyPath, TypedLookup, Value};

/// `ByHost` files are named `<domain>.<hardware-uuid>.plist` (older systems
/// used the 12-hex-digit MAC address instead of a UUID).
static BYHOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<domain>.+)\.(?:[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}|[0-9A-Fa-f]{12})$")
        .expect("valid ByHost regex")
});

/// Something that can be snapshotted: a preference domain in a given scope,
/// or a preference file addressed by path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    domain: String,
    scope: Scope,
    file: Option<PathBuf>,
}

impl Target {
    pub fn domain(name: impl Into<String>) -> Self {
        Self {
            domain: name.into(),
            scope: Scope::User,
            file: None,
        }
    }

    pub fn current_host(name: impl Into<String>) -> Self {
        Self {
            domain: name.into(),
            scope: Scope::CurrentHost,
            file: None,
        }
    }

    /// A preference file outside the per-user directory, e.g.
    /// `/Library/Preferences/com.apple.loginwindow.plist`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let domain = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            domain,
            scope: Scope::User,
            file: Some(path),
        }
    }

    /// Parse a target as given on the command line or in `[[poll]]`:
    /// anything that looks like a path is treated as a plist file.
    pub fn parse(spec: &str, scope: Scope) -> Self {
        let spec = spec.trim();
        if spec.contains('/') || spec.ends_with(".plist") {
            let path = Path::new(spec);
            return Target::from_plist_path(path).unwrap_or_else(|| Target::file(path));
        }
        match scope {
            Scope::User => Target::domain(spec),
            Scope::CurrentHost => Target::current_host(spec),
        }
    }

    /// Map a preference file path to its target.
    ///
    /// Returns `None` for anything that is not a `.plist` file (lock files,
    /// atomic-write temporaries such as `com.foo.plist.Xa81`).
    pub fn from_plist_path(path: &Path) -> Option<Target> {
        let name = path.file_name()?.to_str()?;
        if name.starts_with('.') {
            return None;
        }
        let stem = name.strip_suffix(".plist")?;
        if stem.is_empty() {
            return None;
        }
        let parent = path.parent()?;

        if parent.file_name().is_some_and(|n| n == "ByHost") {
            let domain = BYHOST_RE
                .captures(stem)
                .and_then(|c| c.name("domain"))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| stem.to_string());
            return Some(Target::current_host(domain));
        }

        if parent.ends_with("Library/Preferences") && parent != Path::new("/Library/Preferences") {
            return Some(Target::domain(stem));
        }

        Some(Target::file(path))
    }

    /// Logical domain name (never contains a host identifier).
    pub fn name(&self) -> &str {
        &self.domain
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn is_current_host(&self) -> bool {
        self.scope == Scope::CurrentHost
    }

    /// Stable key for the snapshot cache.
    pub fn cache_key(&self) -> String {
        match (&self.file, self.scope) {
            (Some(path), _) => path.display().to_string(),
            (None, Scope::User) => self.domain.clone(),
            (None, Scope::CurrentHost) => format!("{}@currentHost", self.domain),
        }
    }

    /// Domain argument for `defaults`: the name, or the file path without
    /// its `.plist` extension for file targets.
    pub fn defaults_arg(&self) -> String {
        match &self.file {
            Some(path) => path.with_extension("").display().to_string(),
            None => self.domain.clone(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// Immutable observation of a target.
#[derive(Debug, Clone)]
pub struct Snapshot {
    target: Target,
    origin: SnapshotOrigin,
    tree: Value,
    hints: BTreeMap<KeyPath, Value>,
    seq: u64,
    captured_at: DateTime<Local>,
}

impl Snapshot {
    /// Snapshot from a structured tree. An absent tree is an empty domain.
    pub fn from_tree(target: Target, tree: Value) -> Self {
        let tree = match tree {
            Value::Absent => Value::empty_record(),
            other => other,
        };
        Self::build(target, SnapshotOrigin::Tree, tree, BTreeMap::new())
    }

    /// Snapshot parsed from the text rendering. `hints` carries typed values
    /// the provider managed to extract for otherwise ambiguous tokens.
    pub fn from_text(target: Target, tree: Value, hints: BTreeMap<KeyPath, Value>) -> Self {
        Self::build(target, SnapshotOrigin::Text, tree, hints)
    }

    /// A failed fetch.
    pub fn missing(target: Target) -> Self {
        Self::build(target, SnapshotOrigin::Missing, Value::empty_record(), BTreeMap::new())
    }

    /// The state of a target that has never been observed.
    pub fn empty(target: Target) -> Self {
        Self::from_tree(target, Value::empty_record())
    }

    fn build(
        target: Target,
        origin: SnapshotOrigin,
        tree: Value,
        hints: BTreeMap<KeyPath, Value>,
    ) -> Self {
        Self {
            target,
            origin,
            tree,
            hints,
            seq: 0,
            captured_at: Local::now(),
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        self.tree.get(path)
    }

    /// Ordered path → value view.
    pub fn leaves(&self) -> Vec<(KeyPath, &Value)> {
        self.tree.leaves()
    }

    /// True only when this snapshot is a real read and `path` is not in it.
    pub fn confirms_absent(&self, path: &KeyPath) -> bool {
        self.origin != SnapshotOrigin::Missing && self.tree.get(path).is_none()
    }
}

impl TypedLookup for Snapshot {
    fn extract(&self, path: &KeyPath) -> Option<Value> {
        if let Some(hint) = self.hints.get(path) {
            return Some(hint.clone());
        }
        if self.origin.is_structured() {
            return self.tree.get(path).cloned();
        }
        None
    }
}
