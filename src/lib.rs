// src/lib.rs

pub mod cli;
pub mod config;
pub mod diff;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod fs;
pub mod logging;
pub mod output;
pub mod provider;
pub mod snapshot;
pub mod synth;
pub mod txn;
pub mod types;
pub mod value;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{default_config_path, load_effective, ConfigFile};
use crate::diff::diff_snapshots;
use crate::engine::{PipelineCore, WatchScheduler};
use crate::filter::ExclusionFilter;
use crate::fs::{FileSystem, RealFileSystem};
use crate::output::LogSink;
use crate::provider::{capture, DefaultsProvider, SnapshotProvider};
use crate::snapshot::{Snapshot, Target};
use crate::synth::{apply::apply_all, synthesize_all};
use crate::txn::TransactionGrouper;
use crate::types::{Scope, SnapshotOrigin};
use crate::value::{infer_token, infer_value, Value};

/// High-level entry point used by `main.rs`.
///
/// `watch` (the default) wires together:
/// - config loading + CLI overrides
/// - exclusion filter, transaction grouper and pipeline core
/// - the defaults provider and observation sources
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    match &args.command {
        Some(Command::Diff {
            old,
            new,
            domain,
            current_host,
            raw,
            verify,
        }) => {
            let scope = scope_of(*current_host);
            let filter = if *raw {
                None
            } else {
                Some(ExclusionFilter::new(&load_config(&args)?.exclusion_rules()))
            };
            run_diff(old, new, Target::parse(domain, scope), filter.as_ref(), *verify)
        }
        Some(Command::Snapshot {
            target,
            current_host,
        }) => {
            let target = Target::parse(target, scope_of(*current_host));
            run_snapshot(&DefaultsProvider::new(), target).await
        }
        Some(Command::Watch) | None => run_watch(&args).await,
    }
}

fn scope_of(current_host: bool) -> Scope {
    if current_host {
        Scope::CurrentHost
    } else {
        Scope::User
    }
}

fn load_config(args: &CliArgs) -> Result<ConfigFile> {
    let (path, required) = match &args.config {
        Some(path) => (path.clone(), true),
        None => (default_config_path(), false),
    };
    let cfg = load_effective(&RealFileSystem, &path, required, &args.overrides.to_overrides())
        .with_context(|| format!("loading config {}", path.display()))?;
    Ok(cfg)
}

async fn run_watch(args: &CliArgs) -> Result<()> {
    let cfg = load_config(args)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let filter = Arc::new(ExclusionFilter::new(&cfg.exclusion_rules()));
    let provider: Arc<dyn SnapshotProvider> = Arc::new(DefaultsProvider::new());

    let mut sink = LogSink::new(Arc::clone(&fs)).with_stdout(cfg.config.echo_stdout);
    if let Some(path) = cfg.log_file() {
        sink = sink.with_log_file(path);
    }
    if let Some(dir) = cfg.bundle_dir() {
        sink = sink.with_bundle_dir(dir);
    }

    let core = PipelineCore::new(Arc::clone(&filter), TransactionGrouper::new(cfg.window()));
    let scheduler = WatchScheduler::new(cfg.scheduler_options(), provider, filter, fs);

    info!(window = ?cfg.window(), "prefwatch starting");
    scheduler.run(core, sink, shutdown_signal()).await?;
    Ok(())
}

/// Resolves on Ctrl-C. If the signal handler cannot be installed, never
/// resolves and the process runs until killed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

fn read_json_tree(path: &Path) -> Result<Value> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {} as JSON", path.display()))?;
    Ok(Value::from(json))
}

/// Offline diff of two JSON renderings of the same domain.
fn run_diff(
    old: &Path,
    new: &Path,
    target: Target,
    filter: Option<&ExclusionFilter>,
    verify: bool,
) -> Result<()> {
    let prev = Snapshot::from_tree(target.clone(), read_json_tree(old)?);
    let curr = Snapshot::from_tree(target.clone(), read_json_tree(new)?);

    let entries = diff_snapshots(&prev, &curr);
    debug!(entries = entries.len(), "computed diff");

    let all = synthesize_all(&target, &entries, &curr);

    let shown = match filter {
        Some(filter) if filter.is_excluded_domain(target.name()) => Vec::new(),
        Some(filter) => {
            let kept = filter.filter_entries(target.name(), entries);
            synthesize_all(&target, &kept, &curr)
                .into_iter()
                .filter(|c| filter.admit(c))
                .collect()
        }
        None => all.clone(),
    };

    for command in &shown {
        for line in command.render_lines() {
            println!("{line}");
        }
    }

    if verify {
        let mut replayed = prev.tree().clone();
        let failed = apply_all(&all, &mut replayed);
        if failed > 0 || !replayed.equivalent(curr.tree()) {
            bail!(
                "verification failed: {failed} command(s) could not be applied or the result differs from {}",
                new.display()
            );
        }
        eprintln!("verified: {} command(s) reproduce {}", all.len(), new.display());
    }

    Ok(())
}

/// Capture one target and print each leaf with its inferred type.
async fn run_snapshot(provider: &DefaultsProvider, target: Target) -> Result<()> {
    let provider = provider.clone();
    let snapshot = tokio::task::spawn_blocking(move || capture(&provider, &target)).await?;

    if snapshot.origin() == SnapshotOrigin::Missing {
        bail!("could not read {}", snapshot.target());
    }

    println!("# {} ({:?})", snapshot.target(), snapshot.origin());
    for (path, value) in snapshot.leaves() {
        let inferred = match (snapshot.origin(), value) {
            (SnapshotOrigin::Text, Value::String(token)) => infer_token(token, &snapshot, &path),
            _ => infer_value(value),
        };
        println!("{path}\t{}\t{}", inferred.kind, inferred.literal);
    }
    Ok(())
}

/// Simple dry-run output: print the effective configuration.
fn print_dry_run(cfg: &ConfigFile) {
    println!("prefwatch dry-run");
    println!("  config.window_secs = {}", cfg.config.window_secs);
    println!("  config.flush_tick_ms = {}", cfg.config.flush_tick_ms);
    println!("  config.echo_stdout = {}", cfg.config.echo_stdout);
    println!("  config.initial_scan = {}", cfg.config.initial_scan);
    println!("  config.builtin_noise = {}", cfg.config.builtin_noise);
    if let Some(path) = cfg.log_file() {
        println!("  config.log_file = {}", path.display());
    }
    if let Some(dir) = cfg.bundle_dir() {
        println!("  config.bundle_dir = {}", dir.display());
    }
    println!();

    println!("exclude:");
    println!("  domains: {:?}", cfg.exclude.domains);
    println!("  commands: {:?}", cfg.exclude.commands);
    if !cfg.exclude.noisy_commands.is_empty() {
        println!("  noisy_commands: {:?}", cfg.exclude.noisy_commands);
    }
    for (domain, keys) in &cfg.noise {
        println!("  noise[{domain}]: {keys:?}");
    }
    println!();

    println!("sources:");
    if cfg.watch.enabled {
        for dir in &cfg.scheduler_options().watch_dirs {
            println!("  - fs: {}", dir.display());
        }
    }
    for poll in cfg.polls() {
        println!("  - poll: {} every {:?}", poll.target, poll.interval);
    }
    if let Some(events) = &cfg.events {
        println!("  - events: {}", events.command);
        println!("      domain_regex: {}", events.domain_regex);
    }

    debug!("dry-run complete (nothing watched)");
}
