// src/engine/scheduler.rs

//! The watch scheduler: producers and their supervision.
//!
//! Producers never touch the snapshot cache. They capture the current state
//! of a target on the blocking pool, stamp it with a global sequence number,
//! and hand it to the single consumer ([`super::Runtime`]). The sequence
//! number is taken before the fetch starts, so when two captures of the same
//! target race, the consumer can tell which one is older.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::filter::ExclusionFilter;
use crate::fs::FileSystem;
use crate::output::CommandSink;
use crate::provider::{capture, SnapshotProvider};
use crate::snapshot::Target;
use crate::types::TriggerSource;
use crate::watch::{run_event_feed, run_fs_feed, run_poll_timer, EventFeedSpec, WatcherHandle};

use super::core::PipelineCore;
use super::runtime::Runtime;
use super::PipelineEvent;

/// Startup captures in flight at once.
const STARTUP_CONCURRENCY: usize = 8;

/// Capacity of the producer → consumer channel.
const PIPELINE_CHANNEL: usize = 256;

/// A periodically polled target.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSpec {
    pub target: Target,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Baseline every target the provider lists at startup.
    pub initial_scan: bool,
    /// Preference directories watched for file events (and scanned at
    /// startup for `*.plist` files).
    pub watch_dirs: Vec<PathBuf>,
    pub fs_feed: bool,
    pub polls: Vec<PollSpec>,
    pub events: Option<EventFeedSpec>,
    /// How often the consumer checks for an expired transaction window.
    pub flush_tick: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            initial_scan: true,
            watch_dirs: Vec::new(),
            fs_feed: true,
            polls: Vec::new(),
            events: None,
            flush_tick: Duration::from_millis(500),
        }
    }
}

/// Producer handle shared by every source.
#[derive(Debug, Clone)]
pub struct Capturer {
    provider: Arc<dyn SnapshotProvider>,
    filter: Arc<ExclusionFilter>,
    seq: Arc<AtomicU64>,
    tx: mpsc::Sender<PipelineEvent>,
}

impl Capturer {
    pub fn new(
        provider: Arc<dyn SnapshotProvider>,
        filter: Arc<ExclusionFilter>,
        tx: mpsc::Sender<PipelineEvent>,
    ) -> Self {
        Self {
            provider,
            filter,
            seq: Arc::new(AtomicU64::new(1)),
            tx,
        }
    }

    /// Capture `target` and send it to the consumer.
    ///
    /// Excluded domains are not even fetched. Returns `false` once the
    /// consumer is gone.
    pub async fn capture(
        &self,
        target: Target,
        source: TriggerSource,
        context: Option<String>,
    ) -> bool {
        if self.filter.is_excluded_domain(target.name()) {
            debug!(target = %target, "excluded domain; not capturing");
            return !self.tx.is_closed();
        }

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let provider = Arc::clone(&self.provider);
        let fetch_target = target.clone();
        let snapshot = match tokio::task::spawn_blocking(move || {
            capture(provider.as_ref(), &fetch_target)
        })
        .await
        {
            Ok(snapshot) => snapshot.with_seq(seq),
            Err(err) => {
                warn!(target = %target, error = %err, "capture task failed");
                return !self.tx.is_closed();
            }
        };

        self.tx
            .send(PipelineEvent::Captured {
                snapshot,
                source,
                context,
            })
            .await
            .is_ok()
    }
}

/// Supervisor of the observation sources.
#[derive(Debug)]
pub struct WatchScheduler {
    options: SchedulerOptions,
    provider: Arc<dyn SnapshotProvider>,
    filter: Arc<ExclusionFilter>,
    fs: Arc<dyn FileSystem>,
}

impl WatchScheduler {
    pub fn new(
        options: SchedulerOptions,
        provider: Arc<dyn SnapshotProvider>,
        filter: Arc<ExclusionFilter>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            options,
            provider,
            filter,
            fs,
        }
    }

    /// Run until `shutdown` resolves.
    ///
    /// 1. start the consumer;
    /// 2. baseline every known target (no output);
    /// 3. start the sources;
    /// 4. on shutdown: cancel the sources, wait for them, then let the
    ///    consumer flush and finish.
    ///
    /// Returns the sink after the final flush.
    pub async fn run<S, F>(self, core: PipelineCore, sink: S, shutdown: F) -> Result<S>
    where
        S: CommandSink + 'static,
        F: Future<Output = ()>,
    {
        let (tx, rx) = mpsc::channel::<PipelineEvent>(PIPELINE_CHANNEL);
        let consumer = tokio::spawn(Runtime::new(core, rx, sink, self.options.flush_tick).run());
        let capturer = Capturer::new(Arc::clone(&self.provider), Arc::clone(&self.filter), tx.clone());
        let (cancel_tx, cancel_rx) = watch::channel(false);

        tokio::pin!(shutdown);
        let cancelled_early = tokio::select! {
            _ = self.startup_pass(&capturer) => false,
            _ = &mut shutdown => true,
        };

        let mut sources = JoinSet::new();
        let mut watchers = Vec::new();
        if !cancelled_early {
            watchers = self.spawn_sources(&mut sources, &capturer, &cancel_rx)?;
            info!(sources = sources.len(), "observation sources running");
            shutdown.await;
        }

        info!("shutdown requested; cancelling sources");
        let _ = cancel_tx.send(true);
        while let Some(joined) = sources.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "source task ended abnormally");
            }
        }
        drop(watchers);
        drop(capturer);

        if tx.send(PipelineEvent::ShutdownRequested).await.is_err() {
            debug!("consumer already gone at shutdown");
        }
        drop(tx);

        let sink = consumer.await??;
        info!("prefwatch stopped");
        Ok(sink)
    }

    /// Baseline captures of every target known up front.
    async fn startup_pass(&self, capturer: &Capturer) {
        let targets = self.startup_targets().await;
        info!(targets = targets.len(), "capturing baselines");

        let mut in_flight = JoinSet::new();
        for target in targets {
            while in_flight.len() >= STARTUP_CONCURRENCY {
                in_flight.join_next().await;
            }
            let capturer = capturer.clone();
            in_flight.spawn(async move {
                capturer.capture(target, TriggerSource::Startup, None).await
            });
        }
        while in_flight.join_next().await.is_some() {}
        info!("baselines captured");
    }

    async fn startup_targets(&self) -> Vec<Target> {
        let mut targets = Vec::new();

        if self.options.initial_scan {
            let provider = Arc::clone(&self.provider);
            match tokio::task::spawn_blocking(move || provider.list_targets()).await {
                Ok(Ok(listed)) => targets.extend(listed),
                Ok(Err(err)) => warn!(error = %err, "could not list preference domains"),
                Err(err) => warn!(error = %err, "listing task failed"),
            }

            for dir in &self.options.watch_dirs {
                match self.fs.read_dir(dir) {
                    Ok(entries) => {
                        targets.extend(entries.iter().filter_map(|p| Target::from_plist_path(p)));
                        let byhost = dir.join("ByHost");
                        if self.fs.is_dir(&byhost) {
                            if let Ok(entries) = self.fs.read_dir(&byhost) {
                                targets.extend(
                                    entries.iter().filter_map(|p| Target::from_plist_path(p)),
                                );
                            }
                        }
                    }
                    Err(err) => debug!(dir = %dir.display(), error = %err, "cannot scan directory"),
                }
            }
        }

        targets.extend(self.options.polls.iter().map(|p| p.target.clone()));

        let mut seen = HashSet::new();
        targets.retain(|t| seen.insert(t.cache_key()));
        targets
    }

    fn spawn_sources(
        &self,
        sources: &mut JoinSet<()>,
        capturer: &Capturer,
        cancel_rx: &watch::Receiver<bool>,
    ) -> Result<Vec<WatcherHandle>> {
        let mut watchers = Vec::new();
        if self.options.fs_feed && !self.options.watch_dirs.is_empty() {
            let dirs: Vec<PathBuf> = self
                .options
                .watch_dirs
                .iter()
                .filter(|d| self.fs.is_dir(d))
                .cloned()
                .collect();
            if dirs.is_empty() {
                warn!("no watch directory exists; filesystem feed disabled");
            } else {
                let (handle, feed) = run_fs_feed(dirs, capturer.clone(), cancel_rx.clone())?;
                watchers.push(handle);
                sources.spawn(feed);
            }
        }

        if let Some(spec) = &self.options.events {
            sources.spawn(run_event_feed(spec.clone(), capturer.clone(), cancel_rx.clone()));
        }

        for poll in &self.options.polls {
            sources.spawn(run_poll_timer(poll.clone(), capturer.clone(), cancel_rx.clone()));
        }
        Ok(watchers)
    }
}
