// src/types.rs

//! Small enums shared across the pipeline.

use std::fmt;

/// Which preference store variant a target lives in.
///
/// - `User`: the regular per-user domain (`~/Library/Preferences/<domain>.plist`).
/// - `CurrentHost`: the per-host variant stored under `ByHost/` with the
///   hardware UUID baked into the file name. Commands address it through the
///   same logical domain plus a `-currentHost` qualifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    #[default]
    User,
    CurrentHost,
}

/// Where the state of a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Structured tree from the provider; values carry real types.
    Tree,
    /// Parsed from the provider's canonical text rendering; scalar leaves are
    /// raw tokens and arrays are diffed leaf-by-leaf.
    Text,
    /// The fetch failed. Treated as an empty snapshot that can never confirm
    /// that a key was deleted.
    Missing,
}

impl SnapshotOrigin {
    pub fn is_structured(self) -> bool {
        matches!(self, SnapshotOrigin::Tree)
    }
}

/// Why a target was (re-)captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Initial baseline pass at startup; never produces output.
    Startup,
    /// Filesystem event on a preference file.
    FileWatch,
    /// Event-subscription feed line.
    EventFeed,
    /// Periodic poll timer.
    Timer,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerSource::Startup => "startup",
            TriggerSource::FileWatch => "fs",
            TriggerSource::EventFeed => "event",
            TriggerSource::Timer => "timer",
        };
        f.write_str(s)
    }
}
