mod common;

use common::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use prefwatch::diff::{diff, diff_with, DiffKind, DiffOptions};
use prefwatch::snapshot::{Snapshot, Target};
use prefwatch::synth::{synthesize_all, Operation};
use prefwatch::value::{KeyPath, Value};

#[test]
fn scenario_modified_integer_leaf() -> TestResult {
    init_tracing();
    let prev = rec(&[("Volume", int(5))]);
    let curr = rec(&[("Volume", int(7))]);

    let entries = diff(&prev, &curr);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, DiffKind::Modified);
    assert_eq!(entries[0].path, KeyPath::key("Volume"));

    let target = Target::domain("com.example.audio");
    let snapshot = Snapshot::from_tree(target.clone(), curr);
    let commands = synthesize_all(&target, &entries, &snapshot);
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].operation, Operation::Set);
    assert_eq!(
        commands[0].primary,
        "defaults write com.example.audio Volume -int 7"
    );
    assert_eq!(commands[0].payload, Some(int(7)));
    assert!(commands[0].warnings.is_empty());
    Ok(())
}

#[test]
fn scenario_appended_record_element() -> TestResult {
    let first = rec(&[("id", int(1)), ("name", s("a"))]);
    let second = rec(&[("id", int(2)), ("name", s("b"))]);
    let prev = rec(&[("items", arr(vec![first.clone()]))]);
    let curr = rec(&[("items", arr(vec![first, second.clone()]))]);

    let entries = diff(&prev, &curr);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, DiffKind::Added);
    assert!(entries[0].element);
    assert_eq!(entries[0].path, KeyPath::key("items").child_index(1));

    let target = Target::domain("com.example.app");
    let snapshot = Snapshot::from_tree(target.clone(), curr);
    let commands = synthesize_all(&target, &entries, &snapshot);
    assert_eq!(commands.len(), 1);
    let cmd = &commands[0];
    assert_eq!(cmd.operation, Operation::AppendRecord);
    assert_eq!(cmd.payload, Some(second));
    assert!(cmd.primary.starts_with("defaults write com.example.app items -array-add "));
    assert!(cmd.primary.contains("<key>id</key><integer>2</integer>"));
    assert!(cmd.primary.contains("<key>name</key><string>b</string>"));
    assert_eq!(cmd.alternate.len(), 1);
    assert!(cmd.alternate[0].contains(r#"-c "Add :items:1:id integer 2""#));
    Ok(())
}

#[test]
fn entries_follow_current_order_with_removals_last() {
    let prev = rec(&[("gone", int(1)), ("b", int(1)), ("a", int(1))]);
    let curr = rec(&[("a", int(2)), ("new", s("x")), ("b", int(1))]);

    let paths: Vec<(String, DiffKind)> = diff(&prev, &curr)
        .into_iter()
        .map(|e| (e.path.to_string(), e.kind))
        .collect();

    assert_eq!(
        paths,
        vec![
            ("a".to_string(), DiffKind::Modified),
            ("new".to_string(), DiffKind::Added),
            ("gone".to_string(), DiffKind::Removed),
        ]
    );
}

#[test]
fn nested_records_report_leaves() {
    let prev = rec(&[("outer", rec(&[("inner", rec(&[("x", int(1))]))]))]);
    let curr = rec(&[("outer", rec(&[("inner", rec(&[("x", int(2))]))]))]);

    let entries = diff(&prev, &curr);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path.to_string(), "outer.inner.x");
}

#[test]
fn removed_elements_are_addressed_highest_index_first() {
    let prev = rec(&[("list", arr(vec![s("a"), s("b"), s("c"), s("d")]))]);
    let curr = rec(&[("list", arr(vec![s("c")]))]);

    let paths: Vec<String> = diff(&prev, &curr)
        .into_iter()
        .map(|e| e.path.to_string())
        .collect();
    assert_eq!(paths, vec!["list[3]", "list[1]", "list[0]"]);

    let target = Target::domain("com.example.app");
    let snapshot = Snapshot::from_tree(target.clone(), curr.clone());
    let commands = synthesize_all(&target, &diff(&prev, &curr), &snapshot);
    assert_eq!(commands.len(), 3);
    assert!(commands.iter().all(|c| c.has_warnings()));
}

#[test]
fn leaf_only_mode_diffs_arrays_by_position() {
    let prev = rec(&[("list", arr(vec![s("a"), s("b")]))]);
    let curr = rec(&[("list", arr(vec![s("b"), s("a")]))]);

    assert!(diff(&prev, &curr).is_empty());
    let positional = diff_with(&prev, &curr, DiffOptions { leaf_only: true });
    assert_eq!(positional.len(), 2);
    assert!(positional.iter().all(|e| e.kind == DiffKind::Modified && !e.element));
}

#[test]
fn plistbuddy_entries_escape_spaces_in_keys() {
    let target = Target::domain("com.apple.Terminal");
    let prev = rec(&[("Window Settings", rec(&[("Basic", rec(&[("FontWidth", int(1))]))]))]);
    let curr = rec(&[("Window Settings", rec(&[("Basic", rec(&[("FontWidth", int(2))]))]))]);

    let snapshot = Snapshot::from_tree(target.clone(), curr.clone());
    let commands = synthesize_all(&target, &diff(&prev, &curr), &snapshot);
    assert_eq!(commands.len(), 1);
    assert_eq!(
        commands[0].primary,
        r#"/usr/libexec/PlistBuddy -c "Set :Window\\ Settings:Basic:FontWidth 2" "$HOME/Library/Preferences/com.apple.Terminal.plist""#
    );
}

#[test]
fn plistbuddy_entries_escape_colons_in_keys() {
    let target = Target::domain("com.example.app");
    let prev = rec(&[("Recent:Last", int(1))]);
    let curr = Value::empty_record();

    let snapshot = Snapshot::from_tree(target.clone(), curr.clone());
    let commands = synthesize_all(&target, &diff(&prev, &curr), &snapshot);
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].operation, Operation::Delete);
    assert_eq!(
        commands[0].alternate,
        vec![r#"/usr/libexec/PlistBuddy -c "Delete :Recent\\:Last" "$HOME/Library/Preferences/com.example.app.plist""#.to_string()]
    );
}

#[test]
fn nan_reals_do_not_count_as_changes() {
    let tree = rec(&[
        ("ratio", Value::Float(f64::NAN)),
        ("list", arr(vec![Value::Float(f64::NAN), int(1)])),
    ]);
    assert!(diff(&tree, &tree.clone()).is_empty());
    assert!(diff_with(&tree, &tree, DiffOptions { leaf_only: true }).is_empty());

    let changed = rec(&[
        ("ratio", Value::Float(0.5)),
        ("list", arr(vec![Value::Float(f64::NAN), int(1)])),
    ]);
    let entries = diff(&tree, &changed);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, KeyPath::key("ratio"));
}

#[test]
fn absent_tree_diffs_as_empty_record() {
    let curr = rec(&[("k", s("v"))]);
    let entries = diff(&Value::Absent, &curr);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, DiffKind::Added);
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(Value::Integer),
        "[a-z]{0,6}".prop_map(Value::String),
    ]
}

fn element() -> impl Strategy<Value = Value> {
    prop_oneof![
        scalar(),
        proptest::collection::btree_map("[a-c]", scalar(), 1..3).prop_map(|m| {
            Value::Record(m.into_iter().collect())
        }),
    ]
}

fn tree() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map(
        "[a-e]",
        prop_oneof![
            scalar(),
            proptest::collection::vec(element(), 0..5).prop_map(Value::Array),
            proptest::collection::btree_map("[a-c]", scalar(), 0..3)
                .prop_map(|m| Value::Record(m.into_iter().collect())),
        ],
        0..5,
    )
    .prop_map(|m| Value::Record(m.into_iter().collect()))
}

fn reversed_arrays(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().rev().map(reversed_arrays).collect()),
        Value::Record(fields) => Value::Record(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), reversed_arrays(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

proptest! {
    #[test]
    fn diff_of_identical_snapshots_is_empty(t in tree()) {
        prop_assert!(diff(&t, &t).is_empty());
    }

    #[test]
    fn reordering_arrays_is_not_a_change(t in tree()) {
        let shuffled = reversed_arrays(&t);
        prop_assert!(diff(&t, &shuffled).is_empty());
    }

    #[test]
    fn diff_is_deterministic(a in tree(), b in tree()) {
        prop_assert_eq!(diff(&a, &b), diff(&a, &b));
    }
}
