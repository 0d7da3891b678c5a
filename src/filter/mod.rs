// src/filter/mod.rs

//! Noise and exclusion filtering.
//!
//! Three independent checks, applied at three points of the pipeline:
//!
//! 1. [`ExclusionFilter::is_excluded_domain`] before a target is fetched,
//!    diffed or cached at all;
//! 2. [`ExclusionFilter::is_noisy_key`] per diff entry, against per-domain
//!    tables of volatile keys;
//! 3. [`ExclusionFilter::is_noisy_command`] on every rendered command line,
//!    against generic volatile patterns, the command-target globs, and the
//!    domain named inside the command itself.
//!
//! Any single match suppresses the item. Pattern evaluation never fails: a
//! pattern that does not compile is logged once and never matches.

pub mod noise;

use std::collections::{BTreeMap, HashMap};
use std::sync::{LazyLock, Mutex};

use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};
use regex::Regex;
use tracing::{debug, warn};

use crate::diff::DiffEntry;
use crate::synth::SynthesizedCommand;
use crate::value::KeyPath;

static DEFAULTS_DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^defaults(?:\s+-currentHost)?\s+(?:write|delete)\s+('(?:[^']|'\\'')*'|\S+)")
        .expect("valid defaults domain regex")
});

static PLIST_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"/([^"/]+?)(?:\.\$HOST_UUID)?\.plist"\s*$"#).expect("valid plist file regex")
});

/// Raw exclusion configuration.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    /// Globs over domain names; a match excludes the domain entirely.
    pub domain_patterns: Vec<String>,
    /// Globs over rendered command lines.
    pub command_target_patterns: Vec<String>,
    /// Domain glob → key globs of volatile keys.
    pub noisy_keys: BTreeMap<String, Vec<String>>,
    /// Regular expressions over rendered command lines.
    pub noisy_command_patterns: Vec<String>,
    /// Merge the tables from [`noise`].
    pub builtin_noise: bool,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self {
            domain_patterns: Vec::new(),
            command_target_patterns: Vec::new(),
            noisy_keys: BTreeMap::new(),
            noisy_command_patterns: Vec::new(),
            builtin_noise: true,
        }
    }
}

impl ExclusionRules {
    /// Rules from the two comma-separated glob lists of the CLI/environment.
    pub fn from_comma_lists(domains: &str, commands: &str) -> Self {
        Self {
            domain_patterns: split_patterns(domains),
            command_target_patterns: split_patterns(commands),
            ..Self::default()
        }
    }
}

/// Split a comma-separated pattern list, dropping empty items.
pub fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compiled, memoizing filter. Shared between producers and the consumer.
pub struct ExclusionFilter {
    domain_set: GlobSet,
    command_set: GlobSet,
    noisy_keys: Vec<(GlobMatcher, GlobSet)>,
    noisy_commands: Vec<Regex>,
    domain_cache: Mutex<HashMap<String, bool>>,
    key_cache: Mutex<HashMap<(String, String), bool>>,
}

impl std::fmt::Debug for ExclusionFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusionFilter")
            .field("domain_patterns", &self.domain_set.len())
            .field("command_patterns", &self.command_set.len())
            .field("noisy_key_tables", &self.noisy_keys.len())
            .field("noisy_command_patterns", &self.noisy_commands.len())
            .finish_non_exhaustive()
    }
}

impl Default for ExclusionFilter {
    fn default() -> Self {
        Self::new(&ExclusionRules::default())
    }
}

impl ExclusionFilter {
    pub fn new(rules: &ExclusionRules) -> Self {
        let mut key_tables: Vec<(String, Vec<String>)> = Vec::new();
        if rules.builtin_noise {
            for (domain, keys) in noise::NOISY_KEYS {
                key_tables.push((
                    domain.to_string(),
                    keys.iter().map(|k| k.to_string()).collect(),
                ));
            }
        }
        for (domain, keys) in &rules.noisy_keys {
            key_tables.push((domain.clone(), keys.clone()));
        }

        let noisy_keys = key_tables
            .iter()
            .filter_map(|(domain, keys)| {
                let matcher = compile_glob(domain)?.compile_matcher();
                Some((matcher, lenient_globset(keys)))
            })
            .collect();

        let mut command_patterns: Vec<String> = Vec::new();
        if rules.builtin_noise {
            command_patterns.extend(noise::NOISY_COMMAND_PATTERNS.iter().map(|p| p.to_string()));
        }
        command_patterns.extend(rules.noisy_command_patterns.iter().cloned());
        let noisy_commands = command_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(pattern = %pattern, error = %err, "ignoring invalid noisy-command pattern");
                    None
                }
            })
            .collect();

        Self {
            domain_set: lenient_globset(&rules.domain_patterns),
            command_set: lenient_globset(&rules.command_target_patterns),
            noisy_keys,
            noisy_commands,
            domain_cache: Mutex::new(HashMap::new()),
            key_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Checkpoint (a): is this domain excluded from observation altogether?
    pub fn is_excluded_domain(&self, domain: &str) -> bool {
        if let Ok(cache) = self.domain_cache.lock() {
            if let Some(&hit) = cache.get(domain) {
                return hit;
            }
        }
        let excluded = self.domain_set.is_match(domain);
        if let Ok(mut cache) = self.domain_cache.lock() {
            cache.insert(domain.to_string(), excluded);
        }
        excluded
    }

    /// Checkpoint (b): is `path` a known-volatile key of `domain`?
    pub fn is_noisy_key(&self, domain: &str, path: &KeyPath) -> bool {
        let rendered = path.to_string();
        let cache_key = (domain.to_string(), rendered);
        if let Ok(cache) = self.key_cache.lock() {
            if let Some(&hit) = cache.get(&cache_key) {
                return hit;
            }
        }

        let top = path.top_key().unwrap_or_default();
        let noisy = self.noisy_keys.iter().any(|(domain_glob, keys)| {
            domain_glob.is_match(domain) && (keys.is_match(top) || keys.is_match(&cache_key.1))
        });

        if let Ok(mut cache) = self.key_cache.lock() {
            cache.insert(cache_key, noisy);
        }
        noisy
    }

    /// Checkpoint (c): should this rendered command line be suppressed?
    pub fn is_noisy_command(&self, rendered: &str) -> bool {
        if self.noisy_commands.iter().any(|re| re.is_match(rendered)) {
            return true;
        }
        if self.command_set.is_match(rendered) {
            return true;
        }
        command_domain(rendered).is_some_and(|domain| self.is_excluded_domain(&domain))
    }

    /// Drop noisy-key entries and any entry nested inside an array element
    /// that is already reported whole.
    pub fn filter_entries(&self, domain: &str, entries: Vec<DiffEntry>) -> Vec<DiffEntry> {
        let element_paths: Vec<KeyPath> = entries
            .iter()
            .filter(|e| e.element)
            .map(|e| e.path.clone())
            .collect();

        entries
            .into_iter()
            .filter(|entry| {
                if self.is_noisy_key(domain, &entry.path) {
                    debug!(domain, path = %entry.path, "suppressing noisy key");
                    return false;
                }
                if element_paths.iter().any(|p| p.is_strict_prefix_of(&entry.path)) {
                    debug!(domain, path = %entry.path, "suppressing entry inside reported element");
                    return false;
                }
                true
            })
            .collect()
    }

    /// Final gate for a synthesized command: its own domain, then every
    /// rendered line.
    pub fn admit(&self, command: &SynthesizedCommand) -> bool {
        if self.is_excluded_domain(command.domain()) {
            return false;
        }
        let noisy = std::iter::once(&command.primary)
            .chain(command.alternate.iter())
            .any(|line| self.is_noisy_command(line));
        if noisy {
            debug!(
                domain = command.domain(),
                path = %command.path,
                "suppressing noisy command"
            );
        }
        !noisy
    }
}

/// The domain a rendered command writes to, if it can be recognised.
pub fn command_domain(rendered: &str) -> Option<String> {
    if let Some(caps) = DEFAULTS_DOMAIN_RE.captures(rendered.trim_start()) {
        let raw = caps.get(1)?.as_str();
        let unquoted = raw
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .map(|s| s.replace(r"'\''", "'"))
            .unwrap_or_else(|| raw.to_string());
        let name = unquoted.rsplit('/').next().unwrap_or(&unquoted).to_string();
        return Some(name);
    }
    PLIST_FILE_RE
        .captures(rendered)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn compile_glob(pattern: &str) -> Option<Glob> {
    match Glob::new(pattern) {
        Ok(glob) => Some(glob),
        Err(err) => {
            warn!(pattern = %pattern, error = %err, "ignoring invalid glob pattern");
            None
        }
    }
}

/// Build a GlobSet, skipping patterns that do not compile.
fn lenient_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Some(glob) = compile_glob(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|err| {
        warn!(error = %err, "failed to build glob set; patterns will not match");
        GlobSet::empty()
    })
}
