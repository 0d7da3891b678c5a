// src/provider/mock.rs

//! Scripted provider for tests and offline runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use crate::snapshot::Target;
use crate::value::{KeyPath, Value};

use super::SnapshotProvider;

#[derive(Debug, Clone)]
enum MockState {
    Tree(Value),
    Text(String),
    Failing,
}

#[derive(Debug, Default)]
struct Inner {
    states: HashMap<String, MockState>,
    typed: HashMap<String, BTreeMap<KeyPath, Value>>,
    listed: Vec<Target>,
    fetches: HashMap<String, usize>,
}

/// In-memory provider. Clones share state, so a test can keep a handle and
/// change what the pipeline observes next.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    inner: Arc<Mutex<Inner>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serve `tree` as the structured state of `target`.
    pub fn set_tree(&self, target: &Target, tree: Value) {
        self.lock()
            .states
            .insert(target.cache_key(), MockState::Tree(tree));
    }

    /// Serve only a text rendering for `target` (no structured form).
    pub fn set_text(&self, target: &Target, text: impl Into<String>) {
        self.lock()
            .states
            .insert(target.cache_key(), MockState::Text(text.into()));
    }

    /// Make every fetch of `target` fail.
    pub fn set_failing(&self, target: &Target) {
        self.lock()
            .states
            .insert(target.cache_key(), MockState::Failing);
    }

    /// Forget `target`; it reads as non-existent.
    pub fn remove(&self, target: &Target) {
        self.lock().states.remove(&target.cache_key());
    }

    pub fn set_typed(&self, target: &Target, path: KeyPath, value: Value) {
        self.lock()
            .typed
            .entry(target.cache_key())
            .or_default()
            .insert(path, value);
    }

    /// Targets returned by `list_targets`.
    pub fn list(&self, targets: impl IntoIterator<Item = Target>) {
        self.lock().listed = targets.into_iter().collect();
    }

    /// Number of fetches (tree or text) made for `target`.
    pub fn fetch_count(&self, target: &Target) -> usize {
        self.lock()
            .fetches
            .get(&target.cache_key())
            .copied()
            .unwrap_or(0)
    }

    fn state_of(&self, target: &Target) -> Option<MockState> {
        let mut inner = self.lock();
        *inner.fetches.entry(target.cache_key()).or_default() += 1;
        inner.states.get(&target.cache_key()).cloned()
    }
}

impl SnapshotProvider for MockProvider {
    fn fetch_text(&self, target: &Target) -> Result<String> {
        match self.state_of(target) {
            Some(MockState::Text(text)) => Ok(text),
            Some(MockState::Tree(_)) => Err(anyhow!("no text rendering for {target}")),
            Some(MockState::Failing) => Err(anyhow!("scripted failure for {target}")),
            None => Ok(String::new()),
        }
    }

    fn fetch_tree(&self, target: &Target) -> Result<Option<Value>> {
        match self.state_of(target) {
            Some(MockState::Tree(tree)) => Ok(Some(tree)),
            Some(MockState::Text(_)) => Ok(None),
            Some(MockState::Failing) => Err(anyhow!("scripted failure for {target}")),
            None => Ok(Some(Value::Absent)),
        }
    }

    fn list_targets(&self) -> Result<Vec<Target>> {
        Ok(self.lock().listed.clone())
    }

    fn extract_typed(&self, target: &Target, path: &KeyPath) -> Option<Value> {
        self.lock()
            .typed
            .get(&target.cache_key())
            .and_then(|m| m.get(path))
            .cloned()
    }
}
