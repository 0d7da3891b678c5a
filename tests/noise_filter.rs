mod common;

use std::sync::Arc;

use common::*;
use pretty_assertions::assert_eq;
use prefwatch::diff::{diff, DiffKind};
use prefwatch::engine::{CoreCommand, PipelineCore, PipelineEvent};
use prefwatch::filter::{command_domain, split_patterns, ExclusionFilter, ExclusionRules};
use prefwatch::snapshot::{Snapshot, Target};
use prefwatch::synth::{synthesize_all, SynthesizedCommand};
use prefwatch::txn::TransactionGrouper;
use prefwatch::types::TriggerSource;
use prefwatch::value::{KeyPath, Value};

fn filter_with(domains: &[&str], commands: &[&str]) -> ExclusionFilter {
    let rules = ExclusionRules {
        domain_patterns: domains.iter().map(|s| s.to_string()).collect(),
        command_target_patterns: commands.iter().map(|s| s.to_string()).collect(),
        ..ExclusionRules::default()
    };
    ExclusionFilter::new(&rules)
}

#[test]
fn window_geometry_change_is_diffed_but_not_emitted() -> TestResult {
    init_tracing();
    let target = Target::domain("com.example.editor");
    let prev = rec(&[("Frame", s("100 200 300 400"))]);
    let curr = rec(&[("Frame", s("120 200 300 400"))]);

    let entries = diff(&prev, &curr);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, DiffKind::Modified);

    let filter = ExclusionFilter::default();
    let kept = filter.filter_entries(target.name(), entries);
    let snapshot = Snapshot::from_tree(target.clone(), curr);
    let commands = synthesize_all(&target, &kept, &snapshot);
    assert_eq!(commands.len(), 1);
    assert!(!filter.admit(&commands[0]), "{}", commands[0].primary);
    Ok(())
}

fn commands_for(target: &Target, prev: Value, curr: Value) -> Vec<SynthesizedCommand> {
    let snapshot = Snapshot::from_tree(target.clone(), curr.clone());
    synthesize_all(target, &diff(&prev, &curr), &snapshot)
}

#[test]
fn geometry_words_inside_values_are_not_noise() {
    let target = Target::domain("com.example.gallery");
    let filter = ExclusionFilter::default();

    let commands = commands_for(
        &target,
        rec(&[("Title", s("Landscape"))]),
        rec(&[("Title", s("Picture Frame x"))]),
    );
    assert_eq!(
        commands[0].primary,
        "defaults write com.example.gallery Title -string 'Picture Frame x'"
    );
    assert!(filter.admit(&commands[0]));

    let commands = commands_for(
        &target,
        rec(&[("Caption", s("a"))]),
        rec(&[("Caption", s("NSWindow Frame Main"))]),
    );
    assert!(filter.admit(&commands[0]), "{}", commands[0].primary);
}

#[test]
fn geometry_keys_are_noise_at_every_depth() {
    let target = Target::domain("com.example.editor");
    let filter = ExclusionFilter::default();

    let commands = commands_for(
        &target,
        rec(&[("Layout", rec(&[("SidebarFrame", s("0 0 10 10"))]))]),
        rec(&[("Layout", rec(&[("SidebarFrame", s("0 0 20 10"))]))]),
    );
    assert!(commands[0].primary.contains("-dict-add SidebarFrame"), "{}", commands[0].primary);
    assert!(!filter.admit(&commands[0]));

    let commands = commands_for(
        &target,
        rec(&[("State", rec(&[("Main", rec(&[("NSWindow Frame Main", s("1"))]))]))]),
        rec(&[("State", rec(&[("Main", rec(&[("NSWindow Frame Main", s("2"))]))]))]),
    );
    assert!(commands[0].primary.starts_with("/usr/libexec/PlistBuddy"), "{}", commands[0].primary);
    assert!(!filter.admit(&commands[0]));
}

#[test]
fn excluded_domain_produces_nothing_even_at_startup() -> TestResult {
    let filter = Arc::new(filter_with(&["com.vendor.*"], &[]));
    let mut core = PipelineCore::new(Arc::clone(&filter), TransactionGrouper::default());
    let target = Target::domain("com.vendor.blocked");

    for (seq, (source, value)) in [
        (TriggerSource::Startup, 1),
        (TriggerSource::FileWatch, 2),
        (TriggerSource::Timer, 3),
    ]
    .into_iter()
    .enumerate()
    {
        let step = core.step(
            PipelineEvent::Captured {
                snapshot: tree_snapshot(target.name(), rec(&[("k", int(value))]), seq as u64 + 1),
                source,
                context: None,
            },
            after(t0(), seq as f64),
        );
        assert!(step.commands.is_empty());
    }

    assert!(core.cached(&target).is_none());
    assert_eq!(core.cached_len(), 0);
    assert!(core.open_transaction().is_none());
    let shutdown = core.step(PipelineEvent::ShutdownRequested, after(t0(), 10.0));
    assert!(shutdown.commands.iter().all(|c| !matches!(c, CoreCommand::Emit(_))));
    assert!(shutdown.commands.is_empty());
    Ok(())
}

#[test]
fn exclusion_is_monotonic() {
    let narrow = filter_with(&["com.vendor.blocked"], &[]);
    let wide = filter_with(&["com.vendor.blocked", "com.apple.*"], &[]);
    for domain in ["com.vendor.blocked", "com.apple.dock", "org.example"] {
        if narrow.is_excluded_domain(domain) {
            assert!(wide.is_excluded_domain(domain), "{domain}");
        }
    }
    assert!(wide.is_excluded_domain("com.apple.dock"));
    assert!(!wide.is_excluded_domain("org.example"));
}

#[test]
fn malformed_patterns_never_match_and_never_fail() {
    let filter = filter_with(&["com.[broken", "org.ok"], &["*[", "*secret*"]);
    assert!(!filter.is_excluded_domain("com.[broken"));
    assert!(filter.is_excluded_domain("org.ok"));
    assert!(filter.is_noisy_command("defaults write a secret-key -int 1"));
    assert!(!filter.is_noisy_command("defaults write a key -int 1"));

    let rules = ExclusionRules {
        noisy_command_patterns: vec!["(unclosed".to_string()],
        ..ExclusionRules::default()
    };
    let filter = ExclusionFilter::new(&rules);
    assert!(!filter.is_noisy_command("defaults write a (unclosed -int 1"));
}

#[test]
fn builtin_noisy_keys_are_per_domain() {
    let filter = ExclusionFilter::default();
    assert!(filter.is_noisy_key("com.apple.dock", &KeyPath::key("mod-count")));
    assert!(filter.is_noisy_key("com.any.app", &KeyPath::key("SULastCheckTimestamp")));
    assert!(!filter.is_noisy_key("com.any.app", &KeyPath::key("region")));
    assert!(filter.is_noisy_key("com.apple.dock", &KeyPath::key("region")));
}

#[test]
fn user_noise_table_merges_with_builtins() {
    let mut rules = ExclusionRules::default();
    rules
        .noisy_keys
        .insert("org.example.*".to_string(), vec!["cursor.*".to_string()]);
    let filter = ExclusionFilter::new(&rules);

    let path = KeyPath::key("cursor").child_key("line");
    assert!(filter.is_noisy_key("org.example.editor", &path));
    assert!(!filter.is_noisy_key("org.other", &path));
    assert!(filter.is_noisy_key("org.example.editor", &KeyPath::key("LastUsedDate")));
}

#[test]
fn entries_inside_reported_elements_are_dropped() {
    let filter = ExclusionFilter::default();
    let element = KeyPath::key("items").child_index(2);
    let entries = vec![
        prefwatch::diff::DiffEntry::added(element.clone(), rec(&[("id", int(3))])).as_element(),
        prefwatch::diff::DiffEntry::added(element.child_key("id"), int(3)),
        prefwatch::diff::DiffEntry::added(KeyPath::key("other"), int(1)),
    ];

    let kept: Vec<String> = filter
        .filter_entries("com.example", entries)
        .into_iter()
        .map(|e| e.path.to_string())
        .collect();
    assert_eq!(kept, vec!["items[2]", "other"]);
}

#[test]
fn command_domain_is_recognised_in_both_syntaxes() {
    assert_eq!(
        command_domain("defaults -currentHost write com.apple.screensaver idleTime -int 1"),
        Some("com.apple.screensaver".to_string())
    );
    assert_eq!(
        command_domain(r#"/usr/libexec/PlistBuddy -c "Delete :a:0" "$HOME/Library/Preferences/com.apple.dock.plist""#),
        Some("com.apple.dock".to_string())
    );
    assert_eq!(command_domain("echo hello"), None);
}

#[test]
fn domain_named_inside_a_command_is_checked() {
    let filter = filter_with(&["com.vendor.blocked"], &[]);
    assert!(filter.is_noisy_command("defaults write com.vendor.blocked k -int 1"));
    assert!(!filter.is_noisy_command("defaults write com.vendor.fine k -int 1"));
}

#[test]
fn comma_lists_split_and_trim() {
    assert_eq!(
        split_patterns(" com.a.* , ,com.b "),
        vec!["com.a.*".to_string(), "com.b".to_string()]
    );
    let rules = ExclusionRules::from_comma_lists("com.vendor.*", "*MRU*");
    let filter = ExclusionFilter::new(&rules);
    assert!(filter.is_excluded_domain("com.vendor.x"));
    assert!(filter.is_noisy_command("defaults write com.a MRUList -array"));
}
