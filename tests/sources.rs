mod common;

use std::path::Path;

use common::*;
use pretty_assertions::assert_eq;
use prefwatch::snapshot::Target;
use prefwatch::types::Scope;
use prefwatch::watch::{parse_event_line, targets_for_paths};
use regex::Regex;

#[test]
fn preference_files_map_to_their_domains() {
    init_tracing();
    let paths = [
        Path::new("/Users/me/Library/Preferences/com.apple.dock.plist"),
        Path::new(
            "/Users/me/Library/Preferences/ByHost/com.apple.screensaver.0A1B2C3D-4E5F-6071-8293-A4B5C6D7E8F9.plist",
        ),
        Path::new("/Users/me/Library/Preferences/ByHost/com.apple.old.001122aabbcc.plist"),
        Path::new("/Library/Preferences/com.apple.loginwindow.plist"),
    ];

    let targets = targets_for_paths(paths);
    assert_eq!(
        targets,
        vec![
            Target::domain("com.apple.dock"),
            Target::current_host("com.apple.screensaver"),
            Target::current_host("com.apple.old"),
            Target::file("/Library/Preferences/com.apple.loginwindow.plist"),
        ]
    );
    assert_eq!(targets[1].cache_key(), "com.apple.screensaver@currentHost");
    assert_eq!(targets[3].name(), "com.apple.loginwindow");
    assert_eq!(
        targets[3].defaults_arg(),
        "/Library/Preferences/com.apple.loginwindow"
    );
}

#[test]
fn temporaries_locks_and_dot_files_are_ignored() {
    let paths = [
        Path::new("/Users/me/Library/Preferences/com.foo.plist.Xa81"),
        Path::new("/Users/me/Library/Preferences/com.foo.plist.lockfile"),
        Path::new("/Users/me/Library/Preferences/.GlobalPreferences.plist"),
        Path::new("/Users/me/Library/Preferences/.plist"),
        Path::new("/Users/me/Library/Preferences/ByHost"),
    ];
    assert!(targets_for_paths(paths).is_empty());
}

#[test]
fn targets_parse_as_domains_or_paths() {
    assert_eq!(Target::parse("com.apple.dock", Scope::User), Target::domain("com.apple.dock"));
    assert_eq!(
        Target::parse(" com.apple.screensaver ", Scope::CurrentHost),
        Target::current_host("com.apple.screensaver")
    );
    assert_eq!(
        Target::parse("/Users/me/Library/Preferences/com.apple.finder.plist", Scope::CurrentHost),
        Target::domain("com.apple.finder")
    );
    let file = Target::parse("/opt/app/settings.plist", Scope::User);
    assert_eq!(file.file_path(), Some(Path::new("/opt/app/settings.plist")));
    assert_eq!(file.name(), "settings");
}

#[test]
fn event_lines_yield_domain_and_optional_context() {
    let pattern = Regex::new(
        r"write domain: (?P<domain>[\w.-]+)(?: from (?P<context>[\w ]+))?",
    )
    .expect("pattern");

    assert_eq!(
        parse_event_line(&pattern, "12:00:01 cfprefsd write domain: com.apple.dock from System Settings"),
        Some((Target::domain("com.apple.dock"), Some("System Settings".to_string())))
    );
    assert_eq!(
        parse_event_line(&pattern, "12:00:02 cfprefsd write domain: com.apple.finder"),
        Some((Target::domain("com.apple.finder"), None))
    );
    assert_eq!(parse_event_line(&pattern, "12:00:03 cfprefsd read domain: com.apple.finder"), None);
}

#[test]
fn event_line_with_blank_domain_is_ignored() {
    let pattern = Regex::new(r"domain=(?P<domain>\S*)").expect("pattern");
    assert_eq!(parse_event_line(&pattern, "domain="), None);
}
