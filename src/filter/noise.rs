// src/filter/noise.rs

//! Built-in tables of preference churn that carries no administrative intent.

/// Per-domain volatile keys: `(domain glob, key globs)`. Key globs match the
/// top-level key or the full dotted path.
pub const NOISY_KEYS: &[(&str, &[&str])] = &[
    (
        "*",
        &[
            "NSStatusItem Preferred Position *",
            "NSStatusItem VisibleCC *",
            "*LastUsed*",
            "*LastUpdate*",
            "*Timestamp*",
            "*timestamp*",
            "*LaunchCount*",
            "*mod-count*",
            "NSRecentDocuments*",
            "NSNavRecentPlaces",
            "NSNavLastRootDirectory",
            "NSNavLastCurrentDirectory",
        ],
    ),
    (
        "com.apple.dock",
        &["mod-count", "lastShowIndicatorTime", "trash-full", "region"],
    ),
    (
        "com.apple.finder",
        &[
            "FXRecentFolders",
            "GoToField",
            "GoToFieldHistory",
            "FXDesktopVolumePositions",
            "LastTrashState",
            "FXConnectToLastURL",
            "FXSidebarUpgradedToTenTen",
            "TB Default Item Identifiers",
        ],
    ),
    (
        "com.apple.systempreferences",
        &["NSWindow Frame *", "ThirdPartyCount", "LastPreferencePaneIdentifier"],
    ),
    ("com.apple.systemsettings*", &["NSWindow Frame *", "*LastSelected*"]),
    ("com.apple.HIToolbox", &["AppleSavedCurrentInputSource"]),
    ("com.apple.spaces", &["SpacesDisplayConfiguration"]),
    ("com.apple.screencapture", &["last-analytics-stamp"]),
    ("com.apple.LaunchServices*", &["LSHandlers"]),
    ("com.apple.CallHistory*", &["*"]),
    ("com.apple.xpc.activity2", &["*"]),
];

/// Generic patterns (regular expressions) matched against the rendered
/// primary command: window geometry and high-precision floating point values
/// that drift with every interaction.
///
/// Geometry patterns only look at key positions: the key of `defaults
/// write/delete`, the sub-key of `-dict-add`, and the segments of a
/// PlistBuddy entry (where spaces arrive shell-escaped as `\\ `). Values are
/// never inspected.
pub const NOISY_COMMAND_PATTERNS: &[&str] = &[
    r"(?i)^defaults(?:\s+-currentHost)?\s+(?:write|delete)\s+(?:'(?:[^']|'\\'')*'|\S+)\s+'?(?:NSWindow Frame|NSSplitView Subview Frames|NSTableView|NSToolbar Configuration|NSOutlineView Items)\b",
    r"(?i)^defaults(?:\s+-currentHost)?\s+(?:write|delete)\s+(?:'(?:[^']|'\\'')*'|\S+)\s+'?\w*(?:Frame|Frames|WindowBounds|WindowOrigin|WindowPosition|ScrollPosition)(?:'|\s|$)",
    r"(?i)^defaults(?:\s+-currentHost)?\s+write\s+(?:'(?:[^']|'\\'')*'|\S+)\s+(?:'(?:[^']|'\\'')*'|\S+)\s+-dict-add\s+'?\w*(?:Frame|Frames|WindowBounds|WindowOrigin|WindowPosition|ScrollPosition)(?:'|\s)",
    r#"(?i)-c "(?:Set|Add|Delete) (?::(?:[^\s:"\\]|\\\\.)*)*:(?:NSWindow\\\\ Frame|NSSplitView\\\\ Subview\\\\ Frames|NSTableView|NSToolbar\\\\ Configuration|NSOutlineView\\\\ Items)"#,
    r#"(?i)-c "(?:Set|Add|Delete) (?::(?:[^\s:"\\]|\\\\.)*)*:\w*(?:Frame|Frames|WindowBounds|WindowOrigin|WindowPosition|ScrollPosition)[\s:"]"#,
    r"-float -?[0-9]+\.[0-9]{5,}\b",
    r"<real>-?[0-9]+\.[0-9]{5,}</real>",
];
