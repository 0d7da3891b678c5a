mod common;

use common::*;
use pretty_assertions::assert_eq;
use prefwatch::diff::{diff_snapshots, DiffKind};
use prefwatch::provider::text::parse_text;
use prefwatch::snapshot::{Snapshot, Target};
use prefwatch::synth::synthesize_all;
use prefwatch::value::Value;

const DOCK: &str = r#"{
    autohide = 1;
    largesize = "64.5";
    orientation = left;
    "persistent-apps" =     (
                {
            "tile-type" = "file-tile";
        },
                {
            "tile-type" = "url-tile";
        }
    );
    "show-recents" = 0;
    tilesize = 48;
    empty =     {
    };
    nothing = ();
}"#;

#[test]
fn parses_a_dock_rendering() {
    init_tracing();
    let parsed = parse_text(DOCK);
    assert_eq!(parsed.skipped, 0);

    let expected = rec(&[
        ("autohide", s("1")),
        ("largesize", s("\"64.5\"")),
        ("orientation", s("left")),
        (
            "persistent-apps",
            arr(vec![
                rec(&[("tile-type", s("\"file-tile\""))]),
                rec(&[("tile-type", s("\"url-tile\""))]),
            ]),
        ),
        ("show-recents", s("0")),
        ("tilesize", s("48")),
        ("empty", Value::empty_record()),
        ("nothing", arr(vec![])),
    ]);
    assert_eq!(parsed.tree, expected);
}

#[test]
fn malformed_lines_are_skipped_individually() {
    let parsed = parse_text("{\n    good = 1;\n    this is not valid\n    also = 2;\n}");
    assert_eq!(parsed.skipped, 1);
    assert_eq!(parsed.tree, rec(&[("good", s("1")), ("also", s("2"))]));
}

#[test]
fn empty_rendering_is_an_empty_domain() {
    let parsed = parse_text("");
    assert_eq!(parsed.tree, Value::empty_record());
    assert_eq!(parsed.skipped, 0);
}

#[test]
fn text_snapshots_diff_leaf_by_leaf_and_infer_types() {
    let target = Target::domain("com.apple.dock");
    let prev = Snapshot::from_text(target.clone(), parse_text("{\n    tilesize = 48;\n}").tree, Default::default());
    let curr = Snapshot::from_text(
        target.clone(),
        parse_text("{\n    tilesize = 64;\n    title = \"My Dock\";\n}").tree,
        Default::default(),
    );

    let entries = diff_snapshots(&prev, &curr);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind, DiffKind::Modified);

    let commands = synthesize_all(&target, &entries, &curr);
    let primaries: Vec<&str> = commands.iter().map(|c| c.primary.as_str()).collect();
    assert_eq!(
        primaries,
        vec![
            "defaults write com.apple.dock tilesize -int 64",
            "defaults write com.apple.dock title -string 'My Dock'",
        ]
    );
}
