mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use pretty_assertions::assert_eq;
use prefwatch::diff::diff_snapshots;
use prefwatch::engine::{PipelineCore, SchedulerOptions, WatchScheduler};
use prefwatch::filter::ExclusionFilter;
use prefwatch::fs::mock::MockFileSystem;
use prefwatch::fs::FileSystem;
use prefwatch::provider::{capture, MockProvider, SnapshotProvider};
use prefwatch::snapshot::{Snapshot, Target};
use prefwatch::synth::synthesize_all;
use prefwatch::txn::TransactionGrouper;
use prefwatch::types::SnapshotOrigin;
use prefwatch::value::{KeyPath, Value};

#[test]
fn structured_tree_is_preferred() {
    init_tracing();
    let provider = MockProvider::new();
    let target = Target::domain("com.example");
    provider.set_tree(&target, rec(&[("k", int(1))]));

    let snapshot = capture(&provider, &target);
    assert_eq!(snapshot.origin(), SnapshotOrigin::Tree);
    assert_eq!(snapshot.get(&KeyPath::key("k")), Some(&int(1)));
}

#[test]
fn text_rendering_is_the_fallback() {
    let provider = MockProvider::new();
    let target = Target::domain("com.apple.dock");
    provider.set_text(&target, "{\n    tilesize = 48;\n    orientation = left;\n}");

    let snapshot = capture(&provider, &target);
    assert_eq!(snapshot.origin(), SnapshotOrigin::Text);
    assert_eq!(snapshot.get(&KeyPath::key("tilesize")), Some(&s("48")));
    assert_eq!(provider.fetch_count(&target), 2);
}

#[test]
fn failing_fetch_yields_a_missing_snapshot() {
    let provider = MockProvider::new();
    let target = Target::domain("com.example.broken");
    provider.set_failing(&target);

    let snapshot = capture(&provider, &target);
    assert_eq!(snapshot.origin(), SnapshotOrigin::Missing);
    assert!(!snapshot.confirms_absent(&KeyPath::key("anything")));
}

#[test]
fn unknown_target_is_an_empty_domain_not_an_error() {
    let provider = MockProvider::new();
    let target = Target::domain("com.example.gone");
    provider.set_tree(&target, rec(&[("k", int(1))]));
    provider.remove(&target);

    let snapshot = capture(&provider, &target);
    assert_eq!(snapshot.origin(), SnapshotOrigin::Tree);
    assert!(snapshot.confirms_absent(&KeyPath::key("k")));
}

#[test]
fn typed_lookup_resolves_ambiguous_text_tokens() {
    let provider = MockProvider::new();
    let target = Target::domain("NSGlobalDomain");
    provider.set_text(&target, "{\n    AppleInterfaceStyle = Dark;\n}");
    provider.set_typed(&target, KeyPath::key("AppleInterfaceStyle"), s("Dark"));

    let previous = Snapshot::from_text(target.clone(), Value::empty_record(), Default::default());
    let current = capture(&provider, &target);
    let entries = diff_snapshots(&previous, &current);
    let commands = synthesize_all(&target, &entries, &current);

    assert_eq!(commands.len(), 1);
    assert!(!commands[0].placeholder, "{}", commands[0].primary);
    assert!(commands[0]
        .primary
        .starts_with("defaults write NSGlobalDomain AppleInterfaceStyle -string "));
}

#[test]
fn without_a_typed_value_the_token_stays_a_placeholder() {
    let provider = MockProvider::new();
    let target = Target::domain("NSGlobalDomain");
    provider.set_text(&target, "{\n    AppleInterfaceStyle = Dark;\n}");

    let previous = Snapshot::from_text(target.clone(), Value::empty_record(), Default::default());
    let current = capture(&provider, &target);
    let commands = synthesize_all(&target, &diff_snapshots(&previous, &current), &current);

    assert_eq!(commands.len(), 1);
    assert!(commands[0].placeholder);
    assert!(commands[0].primary.contains("<type> Dark"));
}

#[tokio::test]
async fn startup_scan_baselines_listed_and_on_disk_targets() -> TestResult {
    let provider = MockProvider::new();
    let listed = Target::domain("com.example.listed");
    let on_disk = Target::domain("com.example.disk");
    let by_host = Target::current_host("com.example.host");
    provider.list([listed.clone()]);

    let fs = MockFileSystem::new();
    fs.add_dir("/prefs/Library/Preferences");
    fs.add_file("/prefs/Library/Preferences/com.example.disk.plist", "");
    fs.add_file("/prefs/Library/Preferences/com.example.disk.plist.Xa81", "");
    fs.add_dir("/prefs/Library/Preferences/ByHost");
    fs.add_file(
        "/prefs/Library/Preferences/ByHost/com.example.host.0A1B2C3D-4E5F-6071-8293-A4B5C6D7E8F9.plist",
        "",
    );

    let options = SchedulerOptions {
        initial_scan: true,
        watch_dirs: vec!["/prefs/Library/Preferences".into()],
        fs_feed: false,
        polls: Vec::new(),
        events: None,
        flush_tick: Duration::from_millis(20),
    };
    let scheduler = WatchScheduler::new(
        options,
        Arc::new(provider.clone()) as Arc<dyn SnapshotProvider>,
        Arc::new(ExclusionFilter::default()),
        Arc::new(fs) as Arc<dyn FileSystem>,
    );

    let core = PipelineCore::new(
        Arc::new(ExclusionFilter::default()),
        TransactionGrouper::new(Duration::from_secs(3)),
    );
    let sink = with_timeout(scheduler.run(
        core,
        RecordingSink::new(),
        tokio::time::sleep(Duration::from_millis(200)),
    ))
    .await?;

    assert!(sink.cycles().is_empty());
    assert!(sink.transactions().is_empty());
    for target in [&listed, &on_disk, &by_host] {
        assert!(provider.fetch_count(target) >= 1, "{target} was not baselined");
    }
    Ok(())
}
