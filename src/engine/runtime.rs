// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::output::CommandSink;

use super::core::PipelineCore;
use super::{CoreCommand, PipelineEvent};

/// The single pipeline consumer.
///
/// This is a pure IO shell around `PipelineCore`, which contains all the
/// pipeline semantics. This struct handles async IO: reading events from the
/// producers' channel, driving the flush tick, and handing output to a
/// `CommandSink`.
pub struct Runtime<S: CommandSink> {
    core: PipelineCore,
    event_rx: mpsc::Receiver<PipelineEvent>,
    sink: S,
    tick: Duration,
}

impl<S: CommandSink> fmt::Debug for Runtime<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl<S: CommandSink> Runtime<S> {
    pub fn new(
        core: PipelineCore,
        event_rx: mpsc::Receiver<PipelineEvent>,
        sink: S,
        tick: Duration,
    ) -> Self {
        Self {
            core,
            event_rx,
            sink,
            tick,
        }
    }

    /// Main event loop.
    ///
    /// - Consumes `PipelineEvent`s from `event_rx`.
    /// - Feeds them, and a periodic `Tick`, into the core.
    /// - Executes the commands returned by the core.
    ///
    /// Returns the sink once the core stops or every producer is gone. In
    /// both cases the open transaction has been flushed.
    pub async fn run(mut self) -> Result<S> {
        info!("prefwatch pipeline started");

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                maybe = self.event_rx.recv() => match maybe {
                    Some(e) => e,
                    None => {
                        info!("pipeline event channel closed; flushing and exiting");
                        PipelineEvent::ShutdownRequested
                    }
                },
                _ = ticker.tick() => PipelineEvent::Tick,
            };

            if !matches!(event, PipelineEvent::Tick) {
                debug!(?event, "pipeline received event");
            }

            let step = self.core.step(event, Local::now());

            for command in step.commands {
                self.execute_command(command);
            }

            if !step.keep_running {
                info!("core requested exit; stopping pipeline");
                break;
            }
        }

        info!("pipeline exiting");
        Ok(self.sink)
    }

    /// Execute a single command from the core. Output failures are logged;
    /// a transaction that failed to write is still gone afterwards.
    fn execute_command(&mut self, command: CoreCommand) {
        match command {
            CoreCommand::Emit(cycle) => {
                if let Err(err) = self.sink.emit(&cycle) {
                    warn!(target = %cycle.target, error = %err, "failed to write command log");
                }
            }
            CoreCommand::Flush(txn) => match self.sink.flush(&txn) {
                Ok(Some(path)) => debug!(path = %path.display(), "transaction flushed"),
                Ok(None) => debug!(commands = txn.len(), "transaction flushed without bundle"),
                Err(err) => warn!(
                    error = %err,
                    commands = txn.len(),
                    "failed to write transaction bundle; discarding transaction"
                ),
            },
        }
    }
}
