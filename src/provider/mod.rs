// src/provider/mod.rs

//! Snapshot providers.
//!
//! A provider knows how to read the preference store; the rest of the crate
//! only ever sees [`Snapshot`]s. [`capture`] implements the fallback chain:
//! structured tree first, then the canonical text rendering (parsed by
//! [`text`]), and finally a `Missing` snapshot when both fail.

pub mod defaults;
pub mod mock;
pub mod text;

use std::collections::BTreeMap;
use std::fmt::Debug;

use anyhow::Result;
use tracing::{debug, warn};

use crate::snapshot::{Snapshot, Target};
use crate::value::{infer_token, KeyPath, NoLookup, Value};

pub use defaults::DefaultsProvider;
pub use mock::MockProvider;

/// Source of preference state.
///
/// Implementations may block (subprocesses, disk); the scheduler calls them
/// from the blocking pool.
pub trait SnapshotProvider: Send + Sync + Debug {
    /// Canonical text rendering of `target`. A target that does not exist
    /// renders as an empty string, not an error.
    fn fetch_text(&self, target: &Target) -> Result<String>;

    /// Structured tree of `target`.
    ///
    /// - `Ok(Some(tree))`: the state (`Value::Absent` for a missing target);
    /// - `Ok(None)`: structured rendering is unavailable, use the text form;
    /// - `Err(_)`: the read failed.
    fn fetch_tree(&self, target: &Target) -> Result<Option<Value>>;

    /// Targets to baseline at startup.
    fn list_targets(&self) -> Result<Vec<Target>> {
        Ok(Vec::new())
    }

    /// Typed value at `path`, for tokens the text rendering leaves ambiguous.
    fn extract_typed(&self, _target: &Target, _path: &KeyPath) -> Option<Value> {
        None
    }
}

/// Capture the current state of `target`. Never fails.
pub fn capture(provider: &dyn SnapshotProvider, target: &Target) -> Snapshot {
    match provider.fetch_tree(target) {
        Ok(Some(tree)) => return Snapshot::from_tree(target.clone(), tree),
        Ok(None) => debug!(target = %target, "structured state unavailable; using text rendering"),
        Err(err) => warn!(target = %target, error = %err, "structured fetch failed; trying text rendering"),
    }

    match provider.fetch_text(target) {
        Ok(rendered) => {
            let parsed = text::parse_text(&rendered);
            if parsed.skipped > 0 {
                debug!(target = %target, skipped = parsed.skipped, "skipped malformed snapshot lines");
            }
            let hints = typed_hints(provider, target, &parsed.tree);
            Snapshot::from_text(target.clone(), parsed.tree, hints)
        }
        Err(err) => {
            warn!(target = %target, error = %err, "snapshot fetch failed; treating as missing");
            Snapshot::missing(target.clone())
        }
    }
}

/// Ask the provider for typed values of every token the inferencer cannot
/// classify on its own.
fn typed_hints(
    provider: &dyn SnapshotProvider,
    target: &Target,
    tree: &Value,
) -> BTreeMap<KeyPath, Value> {
    tree.leaves()
        .into_iter()
        .filter_map(|(path, value)| match value {
            Value::String(token) if infer_token(token, &NoLookup, &path).is_unknown() => {
                let typed = provider.extract_typed(target, &path)?;
                Some((path, typed))
            }
            _ => None,
        })
        .collect()
}
