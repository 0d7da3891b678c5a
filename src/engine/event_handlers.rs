// src/engine/event_handlers.rs

//! Event handling logic for the core pipeline.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::diff::{diff_snapshots, DiffEntry};
use crate::filter::ExclusionFilter;
use crate::output::Cycle;
use crate::provider::text::lower_to_tokens;
use crate::snapshot::Snapshot;
use crate::synth::synthesize_all;
use crate::txn::{Transaction, TransactionGrouper};
use crate::types::{SnapshotOrigin, TriggerSource};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Log the admitted commands of one cycle.
    Emit(Cycle),
    /// Write out a transaction that will never receive another command.
    Flush(Transaction),
}

/// Decision returned by the core after handling a single `PipelineEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub(crate) fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Handle a captured snapshot.
///
/// - Excluded domains are dropped before touching the cache.
/// - A capture older than the cached one is stale and dropped.
/// - The first startup capture of a target becomes its baseline silently; a
///   target first seen later is diffed against an empty state.
/// - Otherwise: diff, filter entries, synthesize, filter commands, cache the
///   new snapshot, and feed admitted commands to the grouper.
pub fn handle_captured(
    cache: &mut HashMap<String, Snapshot>,
    filter: &ExclusionFilter,
    grouper: &mut TransactionGrouper,
    snapshot: Snapshot,
    source: TriggerSource,
    context: Option<String>,
    now: DateTime<Local>,
) -> CoreStep {
    let target = snapshot.target().clone();
    let domain = target.name().to_string();

    if filter.is_excluded_domain(&domain) {
        debug!(domain = %domain, "excluded domain; dropping capture");
        return CoreStep::running(Vec::new());
    }

    let key = target.cache_key();
    let previous = cache.get(&key);

    if let Some(prev) = previous {
        if prev.seq() > snapshot.seq() {
            debug!(
                target = %target,
                cached = prev.seq(),
                captured = snapshot.seq(),
                "stale capture; dropping"
            );
            return CoreStep::running(Vec::new());
        }
    }

    let Some(prev) = previous else {
        if source == TriggerSource::Startup {
            debug!(target = %target, origin = ?snapshot.origin(), "baseline captured");
            cache.insert(key, snapshot);
            return CoreStep::running(Vec::new());
        }
        info!(target = %target, "new target observed; diffing against empty state");
        let empty = Snapshot::empty(target.clone());
        return diff_and_emit(cache, filter, grouper, &empty, snapshot, source, context, now);
    };

    let prev = prev.clone();
    diff_and_emit(cache, filter, grouper, &prev, snapshot, source, context, now)
}

/// Diff two captures of one target. When one side is a typed tree and the
/// other a raw-token rendering, the typed side is lowered to tokens and the
/// two are compared leaf by leaf. Values on the current side always come from
/// the current capture itself.
fn comparable_entries(prev: &Snapshot, curr: &Snapshot) -> Vec<DiffEntry> {
    let mixed = prev.origin() != SnapshotOrigin::Missing
        && curr.origin() != SnapshotOrigin::Missing
        && prev.origin().is_structured() != curr.origin().is_structured();
    if !mixed {
        return diff_snapshots(prev, curr);
    }

    debug!(
        target = %curr.target(),
        previous = ?prev.origin(),
        current = ?curr.origin(),
        "snapshot rendering changed; comparing raw tokens"
    );
    if prev.origin().is_structured() {
        return diff_snapshots(&as_tokens(prev), curr);
    }

    let mut entries = diff_snapshots(prev, &as_tokens(curr));
    for entry in &mut entries {
        if entry.new.is_some() {
            entry.new = curr.get(&entry.path).cloned();
        }
    }
    entries
}

fn as_tokens(snapshot: &Snapshot) -> Snapshot {
    Snapshot::from_text(
        snapshot.target().clone(),
        lower_to_tokens(snapshot.tree()),
        BTreeMap::new(),
    )
    .with_seq(snapshot.seq())
}

#[allow(clippy::too_many_arguments)]
fn diff_and_emit(
    cache: &mut HashMap<String, Snapshot>,
    filter: &ExclusionFilter,
    grouper: &mut TransactionGrouper,
    prev: &Snapshot,
    curr: Snapshot,
    source: TriggerSource,
    context: Option<String>,
    now: DateTime<Local>,
) -> CoreStep {
    let target = curr.target().clone();
    let domain = target.name().to_string();

    let entries = comparable_entries(prev, &curr);
    let found = entries.len();
    let entries = filter.filter_entries(&domain, entries);

    let mut admitted = synthesize_all(&target, &entries, &curr);
    admitted.retain(|command| filter.admit(command));

    debug!(
        target = %target,
        source = %source,
        entries = found,
        kept = entries.len(),
        commands = admitted.len(),
        "diffed capture"
    );

    cache.insert(target.cache_key(), curr);

    let mut commands = Vec::new();
    if admitted.is_empty() {
        // Nothing new to group; still close a window that has run out.
        if let Some(txn) = grouper.poll(now) {
            commands.push(CoreCommand::Flush(txn));
        }
        return CoreStep::running(commands);
    }

    commands.push(CoreCommand::Emit(Cycle {
        target,
        source,
        context: context.clone(),
        at: now,
        commands: admitted.clone(),
    }));
    for command in admitted {
        if let Some(txn) = grouper.accept(command, context.as_deref(), now) {
            commands.push(CoreCommand::Flush(txn));
        }
    }
    CoreStep::running(commands)
}

/// Handle a flush tick.
pub fn handle_tick(grouper: &mut TransactionGrouper, now: DateTime<Local>) -> CoreStep {
    let commands = grouper
        .poll(now)
        .map(CoreCommand::Flush)
        .into_iter()
        .collect();
    CoreStep::running(commands)
}

/// Handle shutdown: force-flush and stop.
pub fn handle_shutdown(grouper: &mut TransactionGrouper) -> CoreStep {
    CoreStep {
        commands: grouper
            .flush_all()
            .map(CoreCommand::Flush)
            .into_iter()
            .collect(),
        keep_running: false,
    }
}
