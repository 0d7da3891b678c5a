// src/watch/events.rs

//! Event-subscription feed.
//!
//! Runs a long-lived command (for example a `log stream` invocation filtered
//! on preference writes) and matches every stdout line against a regex with a
//! named `domain` group and an optional `context` group. Each match captures
//! that domain. If the command exits it is restarted after a pause.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::engine::Capturer;
use crate::snapshot::Target;
use crate::types::{Scope, TriggerSource};

use super::{coalesce, COALESCE_WINDOW};

const RESTART_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct EventFeedSpec {
    /// Shell command whose stdout is the event stream.
    pub command: String,
    /// Must contain a `domain` group; may contain a `context` group.
    pub pattern: Regex,
}

/// Extract `(target, context)` from one event line.
pub fn parse_event_line(pattern: &Regex, line: &str) -> Option<(Target, Option<String>)> {
    let caps = pattern.captures(line)?;
    let domain = caps.name("domain")?.as_str().trim();
    if domain.is_empty() {
        return None;
    }
    let context = caps
        .name("context")
        .map(|m| m.as_str().trim().to_string())
        .filter(|c| !c.is_empty());
    Some((Target::parse(domain, Scope::User), context))
}

/// Run the feed until `cancel` flips.
pub async fn run_event_feed(
    spec: EventFeedSpec,
    capturer: Capturer,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        if *cancel.borrow() {
            break;
        }
        match run_once(&spec, &capturer, &mut cancel).await {
            Ok(FeedEnd::Cancelled) => break,
            Ok(FeedEnd::Exited) => warn!(cmd = %spec.command, "event feed command exited"),
            Err(err) => warn!(cmd = %spec.command, error = %err, "event feed failed"),
        }

        tokio::select! {
            _ = cancel.changed() => break,
            _ = tokio::time::sleep(RESTART_DELAY) => info!("restarting event feed"),
        }
    }
    debug!("event feed finished");
}

enum FeedEnd {
    Cancelled,
    Exited,
}

async fn run_once(
    spec: &EventFeedSpec,
    capturer: &Capturer,
    cancel: &mut watch::Receiver<bool>,
) -> Result<FeedEnd> {
    info!(cmd = %spec.command, "starting event feed");

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&spec.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning event feed '{}'", spec.command))?;

    let stdout = child
        .stdout
        .take()
        .context("event feed has no stdout")?;

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("event feed stderr: {}", line);
            }
        });
    }

    // Line reader → channel, so bursts can be coalesced.
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<Vec<(Target, Option<String>)>>();
    let pattern = spec.pattern.clone();
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(hit) = parse_event_line(&pattern, &line) {
                if line_tx.send(vec![hit]).is_err() {
                    break;
                }
            }
        }
    });

    let end = 'feed: loop {
        let first = tokio::select! {
            _ = cancel.changed() => break FeedEnd::Cancelled,
            batch = line_rx.recv() => match batch {
                Some(batch) => batch,
                None => break FeedEnd::Exited,
            },
        };

        let (pending, open) = coalesce(&mut line_rx, first, COALESCE_WINDOW).await;
        for (target, context) in pending {
            debug!(target = %target, context = ?context, "event feed signalled change");
            if !capturer.capture(target, TriggerSource::EventFeed, context).await {
                break 'feed FeedEnd::Cancelled;
            }
        }
        if *cancel.borrow() {
            break FeedEnd::Cancelled;
        }
        if !open {
            break FeedEnd::Exited;
        }
    };

    reader.abort();
    if let Err(err) = child.kill().await {
        debug!(error = %err, "event feed process already gone");
    }
    Ok(end)
}
