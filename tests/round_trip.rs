mod common;

use common::*;
use proptest::prelude::*;
use prefwatch::diff::diff_snapshots;
use prefwatch::snapshot::{Snapshot, Target};
use prefwatch::synth::apply::apply_all;
use prefwatch::synth::{synthesize_all, Operation};
use prefwatch::value::Value;

fn replay(target: &Target, a: &Value, b: &Value) -> (Value, usize) {
    let prev = Snapshot::from_tree(target.clone(), a.clone());
    let curr = Snapshot::from_tree(target.clone(), b.clone());
    let commands = synthesize_all(target, &diff_snapshots(&prev, &curr), &curr);
    let mut replayed = a.clone();
    let failed = apply_all(&commands, &mut replayed);
    (replayed, failed)
}

#[test]
fn commands_turn_old_tree_into_new_tree() -> TestResult {
    init_tracing();
    let target = Target::domain("com.apple.dock");
    let a = rec(&[
        ("autohide", Value::Bool(false)),
        ("tilesize", int(48)),
        (
            "persistent-apps",
            arr(vec![
                rec(&[("label", s("Mail")), ("pos", int(0))]),
                rec(&[("label", s("Safari")), ("pos", int(1))]),
            ]),
        ),
        ("obsolete", s("x")),
    ]);
    let b = rec(&[
        ("autohide", Value::Bool(true)),
        ("tilesize", int(48)),
        (
            "persistent-apps",
            arr(vec![
                rec(&[("label", s("Safari")), ("pos", int(1))]),
                rec(&[("label", s("Notes")), ("pos", int(2))]),
            ]),
        ),
        ("orientation", s("left")),
    ]);

    let (replayed, failed) = replay(&target, &a, &b);
    assert_eq!(failed, 0);
    assert!(replayed.equivalent(&b), "replayed: {replayed}");
    Ok(())
}

#[test]
fn deletions_are_not_emitted_from_a_failed_read() {
    let target = Target::domain("com.example.app");
    let prev = Snapshot::from_tree(target.clone(), rec(&[("k", int(1))]));
    let curr = Snapshot::missing(target.clone());

    let commands = synthesize_all(&target, &diff_snapshots(&prev, &curr), &curr);
    assert!(commands.iter().all(|c| c.operation != Operation::Delete));
}

#[test]
fn current_host_targets_use_the_host_qualifier() {
    let target = Target::current_host("com.apple.screensaver");
    let prev = Snapshot::from_tree(target.clone(), rec(&[("idleTime", int(300))]));
    let curr = Snapshot::from_tree(target.clone(), rec(&[("idleTime", int(600))]));

    let commands = synthesize_all(&target, &diff_snapshots(&prev, &curr), &curr);
    assert_eq!(commands.len(), 1);
    assert_eq!(
        commands[0].primary,
        "defaults -currentHost write com.apple.screensaver idleTime -int 600"
    );
    assert!(commands[0].alternate[0].contains("ByHost/com.apple.screensaver.$HOST_UUID.plist"));
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        (-50i64..50).prop_map(Value::Integer),
        "[a-z ]{0,5}".prop_map(Value::String),
    ]
}

fn node() -> impl Strategy<Value = Value> {
    prop_oneof![
        scalar(),
        proptest::collection::vec(scalar(), 0..4).prop_map(Value::Array),
        proptest::collection::vec(
            proptest::collection::btree_map("[xy]", scalar(), 1..3)
                .prop_map(|m| Value::Record(m.into_iter().collect())),
            0..3
        )
        .prop_map(Value::Array),
        proptest::collection::btree_map("[a-c]", scalar(), 0..3)
            .prop_map(|m| Value::Record(m.into_iter().collect())),
    ]
}

fn tree() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map("[a-f]", node(), 0..5)
        .prop_map(|m| Value::Record(m.into_iter().collect()))
}

proptest! {
    #[test]
    fn replaying_commands_reproduces_the_new_tree(a in tree(), b in tree()) {
        let target = Target::domain("com.example.prop");
        let (replayed, failed) = replay(&target, &a, &b);
        prop_assert_eq!(failed, 0);
        prop_assert!(replayed.equivalent(&b), "replayed {} expected {}", replayed, b);
    }
}
