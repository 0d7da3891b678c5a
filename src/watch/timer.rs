// src/watch/timer.rs

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::engine::{Capturer, PollSpec};
use crate::types::TriggerSource;

/// Poll one target every `spec.interval` until `cancel` flips.
///
/// The first capture happens one interval after start; the baseline comes
/// from the startup pass.
pub async fn run_poll_timer(spec: PollSpec, capturer: Capturer, mut cancel: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(spec.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    debug!(target = %spec.target, interval = ?spec.interval, "poll timer started");
    loop {
        tokio::select! {
            _ = cancel.changed() => break,
            _ = ticker.tick() => {
                if !capturer.capture(spec.target.clone(), TriggerSource::Timer, None).await {
                    break;
                }
            }
        }
        if *cancel.borrow() {
            break;
        }
    }
    debug!(target = %spec.target, "poll timer finished");
}
