// src/watch/mod.rs

//! Change notification sources.
//!
//! Each source turns some external signal into captures of the affected
//! targets:
//! - [`watcher`]: filesystem events on preference files (`notify`);
//! - [`events`]: lines of a streaming subscription command, matched with a
//!   regex;
//! - [`timer`]: periodic polling of one target.
//!
//! Sources check the shared cancellation flag between captures only, never
//! in the middle of one.

pub mod events;
pub mod timer;
pub mod watcher;

use std::hash::Hash;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::mpsc;

pub use events::{parse_event_line, run_event_feed, EventFeedSpec};
pub use timer::run_poll_timer;
pub use watcher::{run_fs_feed, targets_for_paths, WatcherHandle};

/// How long a source keeps collecting related signals before capturing.
pub const COALESCE_WINDOW: Duration = Duration::from_millis(250);

/// Collect `first` plus everything arriving on `rx` within `window`,
/// deduplicated by key (last value wins, first-seen order kept).
///
/// The returned flag is `false` once the channel is closed.
pub(crate) async fn coalesce<K, V>(
    rx: &mut mpsc::UnboundedReceiver<Vec<(K, V)>>,
    first: Vec<(K, V)>,
    window: Duration,
) -> (IndexMap<K, V>, bool)
where
    K: Hash + Eq,
{
    let mut pending: IndexMap<K, V> = first.into_iter().collect();
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => return (pending, true),
            more = rx.recv() => match more {
                Some(items) => pending.extend(items),
                None => return (pending, false),
            },
        }
    }
}
