// src/engine/mod.rs

//! Orchestration engine for prefwatch.
//!
//! This module ties together:
//! - the per-target snapshot cache (last accepted snapshot per target)
//! - diffing, synthesis and the two filter passes
//! - the transaction grouper
//! - the consumer loop that reacts to:
//!   - captured snapshots from the observation sources
//!   - flush ticks
//!   - shutdown signals
//! - the scheduler that starts, and on shutdown cancels, the sources
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]; the producers in [`scheduler`].

use crate::snapshot::Snapshot;
use crate::types::TriggerSource;

/// Events flowing into the single pipeline consumer.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A producer captured the current state of a target.
    Captured {
        snapshot: Snapshot,
        source: TriggerSource,
        /// Context label offered by the source (e.g. the app that changed it).
        context: Option<String>,
    },
    /// Periodic check for an expired transaction window.
    Tick,
    /// Graceful shutdown: flush everything and stop.
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod scheduler;

pub use core::PipelineCore;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
pub use scheduler::{Capturer, PollSpec, SchedulerOptions, WatchScheduler};
