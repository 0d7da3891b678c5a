// src/watch/watcher.rs

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::engine::Capturer;
use crate::snapshot::Target;
use crate::types::TriggerSource;

use super::{coalesce, COALESCE_WINDOW};

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Targets touched by a set of changed paths.
///
/// Lock files, dot files and atomic-write temporaries
/// (`com.foo.plist.XXXXXX`) map to nothing.
pub fn targets_for_paths<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Vec<Target> {
    paths
        .into_iter()
        .filter_map(Target::from_plist_path)
        .collect()
}

/// Start watching `dirs` recursively.
///
/// Returns the watcher handle (keep it alive) and the feed future, which
/// captures every target whose plist file changed, coalescing bursts of
/// events, until `cancel` flips.
pub fn run_fs_feed(
    dirs: Vec<PathBuf>,
    capturer: Capturer,
    mut cancel: watch::Receiver<bool>,
) -> Result<(WatcherHandle, impl Future<Output = ()> + Send + 'static)> {
    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Vec<(Target, ())>>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.kind.is_access() {
                    return;
                }
                let targets = targets_for_paths(event.paths.iter().map(PathBuf::as_path));
                if targets.is_empty() {
                    return;
                }
                if let Err(err) = event_tx.send(targets.into_iter().map(|t| (t, ())).collect()) {
                    // We can't log via tracing here easily, so fallback to stderr.
                    eprintln!("prefwatch: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("prefwatch: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    for dir in &dirs {
        watcher.watch(dir, RecursiveMode::Recursive)?;
        info!("file watcher started on {:?}", dir);
    }

    let feed = async move {
        loop {
            let first = tokio::select! {
                _ = cancel.changed() => break,
                batch = event_rx.recv() => match batch {
                    Some(batch) => batch,
                    None => break,
                },
            };

            let (pending, open) = coalesce(&mut event_rx, first, COALESCE_WINDOW).await;
            for (target, ()) in pending {
                debug!(target = %target, "preference file changed");
                if !capturer.capture(target, TriggerSource::FileWatch, None).await {
                    return;
                }
            }
            if !open || *cancel.borrow() {
                break;
            }
        }
        debug!("filesystem feed finished");
    };

    Ok((WatcherHandle { _inner: watcher }, feed))
}
