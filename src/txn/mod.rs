// src/txn/mod.rs

//! Transaction grouping.
//!
//! Commands arriving within a short window of each other are treated as one
//! administrative action and flushed together as a single deployable bundle.
//!
//! State machine:
//!
//! ```text
//! Empty --accept--> Open(start)
//! Open  --accept (now - start <= W)--> Open(start)      (append)
//! Open  --accept (now - start >  W)--> Open(now)        (flush previous)
//! Open  --poll   (now - start >  W)--> Empty            (flush)
//! Open  --flush_all--> Empty                            (flush)
//! ```
//!
//! Time is passed in by the caller, so the grouper itself is fully
//! deterministic.

pub mod bundle;

use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};
use indexmap::IndexSet;
use tracing::debug;

use crate::synth::SynthesizedCommand;

pub use bundle::{bundle_file_name, render_bundle, BundleWriter};

/// Default grouping window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3);

/// Context label used when no source offered anything more specific.
pub const GENERIC_CONTEXT: &str = "general";

/// A time-windowed batch of commands.
#[derive(Debug, Clone)]
pub struct Transaction {
    started_at: DateTime<Local>,
    commands: Vec<SynthesizedCommand>,
    domains: IndexSet<String>,
    context: String,
}

impl Transaction {
    fn open(started_at: DateTime<Local>, context: Option<&str>) -> Self {
        Self {
            started_at,
            commands: Vec::new(),
            domains: IndexSet::new(),
            context: normalize_context(context).to_string(),
        }
    }

    fn push(&mut self, command: SynthesizedCommand, context: Option<&str>) {
        self.domains.insert(command.target.to_string());
        self.commands.push(command);

        let hint = normalize_context(context);
        if self.context == GENERIC_CONTEXT && hint != GENERIC_CONTEXT {
            debug!(context = hint, "upgrading transaction context");
            self.context = hint.to_string();
        }
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Commands in arrival order.
    pub fn commands(&self) -> &[SynthesizedCommand] {
        &self.commands
    }

    /// Touched domains, deduplicated, in first-seen order.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands of one domain, in arrival order.
    pub fn commands_for<'a>(
        &'a self,
        domain: &'a str,
    ) -> impl Iterator<Item = &'a SynthesizedCommand> + 'a {
        self.commands
            .iter()
            .filter(move |c| c.target.to_string() == domain)
    }
}

fn normalize_context(context: Option<&str>) -> &str {
    match context.map(str::trim) {
        Some(c) if !c.is_empty() => c,
        _ => GENERIC_CONTEXT,
    }
}

/// Single-writer grouper; owned by the pipeline consumer.
#[derive(Debug)]
pub struct TransactionGrouper {
    window: TimeDelta,
    open: Option<Transaction>,
}

impl Default for TransactionGrouper {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl TransactionGrouper {
    pub fn new(window: Duration) -> Self {
        Self {
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::seconds(3)),
            open: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window.to_std().unwrap_or(DEFAULT_WINDOW)
    }

    /// The currently open transaction, if any.
    pub fn open_transaction(&self) -> Option<&Transaction> {
        self.open.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_none()
    }

    /// Add a command. Returns the previous transaction when `now` falls
    /// outside its window.
    pub fn accept(
        &mut self,
        command: SynthesizedCommand,
        context: Option<&str>,
        now: DateTime<Local>,
    ) -> Option<Transaction> {
        let flushed = self.poll(now);
        let txn = self
            .open
            .get_or_insert_with(|| Transaction::open(now, context));
        txn.push(command, context);
        flushed
    }

    /// Flush the open transaction if its window has elapsed at `now`.
    pub fn poll(&mut self, now: DateTime<Local>) -> Option<Transaction> {
        let expired = self
            .open
            .as_ref()
            .is_some_and(|txn| now - txn.started_at > self.window);
        if expired { self.take() } else { None }
    }

    /// Force-flush the open transaction (shutdown).
    pub fn flush_all(&mut self) -> Option<Transaction> {
        self.take()
    }

    fn take(&mut self) -> Option<Transaction> {
        self.open.take().filter(|txn| !txn.is_empty())
    }
}
