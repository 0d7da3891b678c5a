// src/engine/core.rs

//! Pure core pipeline state machine.
//!
//! This module contains a synchronous, deterministic "core" that consumes
//! [`PipelineEvent`]s and produces:
//! - an updated core state (snapshot cache, open transaction)
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - writing log lines and bundles
//! - the flush tick and shutdown
//!
//! Time is an argument of [`PipelineCore::step`], so the core can be tested
//! without any Tokio, channels, filesystem, or processes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::engine::event_handlers::{handle_captured, handle_shutdown, handle_tick, CoreStep};
use crate::engine::PipelineEvent;
use crate::filter::ExclusionFilter;
use crate::snapshot::{Snapshot, Target};
use crate::txn::{Transaction, TransactionGrouper};

/// Pure core pipeline state.
///
/// This owns:
/// - the last accepted snapshot per target
/// - the transaction grouper (and with it the single live transaction)
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct PipelineCore {
    cache: HashMap<String, Snapshot>,
    filter: Arc<ExclusionFilter>,
    grouper: TransactionGrouper,
}

impl PipelineCore {
    pub fn new(filter: Arc<ExclusionFilter>, grouper: TransactionGrouper) -> Self {
        Self {
            cache: HashMap::new(),
            filter,
            grouper,
        }
    }

    /// Last accepted snapshot of `target` (for tests).
    pub fn cached(&self, target: &Target) -> Option<&Snapshot> {
        self.cache.get(&target.cache_key())
    }

    /// Number of cached targets (for tests).
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn open_transaction(&self) -> Option<&Transaction> {
        self.grouper.open_transaction()
    }

    /// Handle a single pipeline event at time `now`, updating core state and
    /// returning the resulting commands for the IO shell.
    pub fn step(&mut self, event: PipelineEvent, now: DateTime<Local>) -> CoreStep {
        match event {
            PipelineEvent::Captured {
                snapshot,
                source,
                context,
            } => handle_captured(
                &mut self.cache,
                &self.filter,
                &mut self.grouper,
                snapshot,
                source,
                context,
                now,
            ),
            PipelineEvent::Tick => handle_tick(&mut self.grouper, now),
            PipelineEvent::ShutdownRequested => handle_shutdown(&mut self.grouper),
        }
    }
}
