mod common;

use std::fs;
use std::time::Duration;

use common::*;
use pretty_assertions::assert_eq;
use prefwatch::cli::{parse_poll_arg, LogLevel};
use prefwatch::config::{load_effective, ConfigFile, ConfigOverrides, PollConfig, RawConfigFile};
use prefwatch::errors::PrefwatchError;
use prefwatch::fs::mock::MockFileSystem;
use prefwatch::fs::RealFileSystem;
use prefwatch::logging::build_filter;
use prefwatch::snapshot::Target;
use tracing::level_filters::LevelFilter;

const FULL: &str = r#"
[config]
window_secs = 1.5
flush_tick_ms = 100
bundle_dir = "/tmp/bundles"
echo_stdout = false

[exclude]
domains = ["com.vendor.*"]
commands = ["*MRU*"]

[noise]
"org.example.*" = ["cursor.*"]

[watch]
enabled = false

[[poll]]
target = "com.apple.dock"
interval_secs = 2

[[poll]]
target = "com.apple.screensaver"
current_host = true

[events]
command = "log stream --style compact"
domain_regex = 'domain: (?P<domain>[\w.-]+)'
"#;

fn raw(toml_text: &str) -> RawConfigFile {
    toml::from_str(toml_text).expect("valid TOML")
}

fn config_error(result: Result<ConfigFile, PrefwatchError>) -> String {
    match result {
        Err(PrefwatchError::ConfigError(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn full_config_file_is_loaded() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Prefwatch.toml");
    fs::write(&path, FULL)?;

    let cfg = load_effective(&RealFileSystem, &path, true, &ConfigOverrides::default())?;
    assert_eq!(cfg.window(), Duration::from_millis(1500));
    assert_eq!(cfg.flush_tick(), Duration::from_millis(100));
    assert_eq!(cfg.bundle_dir().as_deref(), Some(std::path::Path::new("/tmp/bundles")));
    assert!(!cfg.config.echo_stdout);

    let options = cfg.scheduler_options();
    assert!(!options.fs_feed);
    assert!(options.initial_scan);
    assert_eq!(options.polls.len(), 2);
    assert_eq!(options.polls[0].target, Target::domain("com.apple.dock"));
    assert_eq!(options.polls[0].interval, Duration::from_secs(2));
    assert_eq!(options.polls[1].target, Target::current_host("com.apple.screensaver"));
    assert_eq!(options.polls[1].interval, Duration::from_secs(5));

    let feed = options.events.expect("event feed");
    assert_eq!(feed.command, "log stream --style compact");

    let rules = cfg.exclusion_rules();
    assert_eq!(rules.domain_patterns, vec!["com.vendor.*".to_string()]);
    assert_eq!(rules.command_target_patterns, vec!["*MRU*".to_string()]);
    assert_eq!(rules.noisy_keys.get("org.example.*").map(Vec::len), Some(1));
    assert!(rules.builtin_noise);
    Ok(())
}

#[test]
fn missing_default_file_means_defaults() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Prefwatch.toml");

    let cfg = load_effective(&RealFileSystem, &path, false, &ConfigOverrides::default())?;
    assert_eq!(cfg.window(), Duration::from_secs(3));
    assert!(cfg.watch.enabled);
    assert!(cfg.poll.is_empty());
    assert!(cfg.event_feed().is_none());
    assert!(cfg.log_file().is_none());
    Ok(())
}

#[test]
fn missing_explicit_file_is_an_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nope.toml");
    let err = load_effective(&RealFileSystem, &path, true, &ConfigOverrides::default());
    assert!(matches!(err, Err(PrefwatchError::IoError(_))));
    Ok(())
}

#[test]
fn config_is_read_through_the_filesystem_trait() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/etc/prefwatch/Prefwatch.toml", FULL);

    let cfg = load_effective(&fs, "/etc/prefwatch/Prefwatch.toml", false, &ConfigOverrides::default())?;
    assert_eq!(cfg.window(), Duration::from_millis(1500));
    assert_eq!(cfg.poll.len(), 2);

    let cfg = load_effective(&fs, "/etc/prefwatch/other.toml", false, &ConfigOverrides::default())?;
    assert_eq!(cfg.window(), Duration::from_secs(3));

    let err = load_effective(&fs, "/etc/prefwatch/other.toml", true, &ConfigOverrides::default());
    assert!(matches!(err, Err(PrefwatchError::Other(_))), "{err:?}");
    Ok(())
}

#[test]
fn invalid_toml_is_reported() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Prefwatch.toml");
    fs::write(&path, "[config\nwindow_secs = 3")?;
    let err = load_effective(&RealFileSystem, &path, true, &ConfigOverrides::default());
    assert!(matches!(err, Err(PrefwatchError::TomlError(_))));
    Ok(())
}

#[test]
fn validation_rejects_bad_values() {
    let msg = config_error(ConfigFile::try_from(raw("[config]\nwindow_secs = 0")));
    assert!(msg.contains("window_secs"), "{msg}");

    let msg = config_error(ConfigFile::try_from(raw("[config]\nflush_tick_ms = 0")));
    assert!(msg.contains("flush_tick_ms"), "{msg}");

    let msg = config_error(ConfigFile::try_from(raw("[[poll]]\ntarget = \"  \"")));
    assert_eq!(msg, "[[poll]] entry 1 has an empty target");

    let msg = config_error(ConfigFile::try_from(raw(
        "[[poll]]\ntarget = \"com.a\"\ninterval_secs = -1",
    )));
    assert!(msg.contains("interval_secs > 0"), "{msg}");

    let msg = config_error(ConfigFile::try_from(raw(
        "[events]\ncommand = \"\"\ndomain_regex = '(?P<domain>.+)'",
    )));
    assert!(msg.contains("[events].command"), "{msg}");

    let msg = config_error(ConfigFile::try_from(raw(
        "[events]\ncommand = \"tail -f x\"\ndomain_regex = '(unclosed'",
    )));
    assert!(msg.starts_with("[events].domain_regex is invalid"), "{msg}");

    let msg = config_error(ConfigFile::try_from(raw(
        "[events]\ncommand = \"tail -f x\"\ndomain_regex = 'name: (\\S+)'",
    )));
    assert!(msg.contains("named group `domain`"), "{msg}");
}

#[test]
fn overrides_append_lists_and_replace_scalars() -> TestResult {
    let mut raw = raw(FULL);
    raw.apply(&ConfigOverrides {
        exclude_domains: vec!["com.other".to_string()],
        window_secs: Some(0.5),
        log_file: Some("/tmp/prefwatch.log".to_string()),
        polls: vec![parse_poll_arg("org.example@1")],
        quiet: true,
        ..ConfigOverrides::default()
    });
    let cfg = ConfigFile::try_from(raw)?;

    assert_eq!(
        cfg.exclude.domains,
        vec!["com.vendor.*".to_string(), "com.other".to_string()]
    );
    assert_eq!(cfg.window(), Duration::from_millis(500));
    assert_eq!(cfg.bundle_dir().as_deref(), Some(std::path::Path::new("/tmp/bundles")));
    assert_eq!(cfg.log_file().as_deref(), Some(std::path::Path::new("/tmp/prefwatch.log")));
    assert_eq!(cfg.poll.len(), 3);
    assert!(!cfg.config.echo_stdout);
    Ok(())
}

#[test]
fn override_can_break_a_valid_file() {
    let mut raw = raw(FULL);
    raw.apply(&ConfigOverrides {
        window_secs: Some(-2.0),
        ..ConfigOverrides::default()
    });
    config_error(ConfigFile::try_from(raw));
}

#[test]
fn builder_produces_validated_config() {
    let cfg = ConfigFileBuilder::new()
        .window_secs(2.0)
        .exclude_domain("com.vendor.*")
        .build();
    assert_eq!(cfg.window(), Duration::from_secs(2));
    assert_eq!(cfg.exclusion_rules().domain_patterns, vec!["com.vendor.*".to_string()]);
}

fn poll(target: &str, secs: f64, current_host: bool) -> (String, f64, bool) {
    (target.to_string(), secs, current_host)
}

fn parts(p: PollConfig) -> (String, f64, bool) {
    (p.target, p.interval_secs, p.current_host)
}

#[test]
fn poll_arguments_parse_target_interval_and_scope() {
    assert_eq!(parts(parse_poll_arg("com.apple.dock")), poll("com.apple.dock", 5.0, false));
    assert_eq!(parts(parse_poll_arg("com.apple.dock@2.5")), poll("com.apple.dock", 2.5, false));
    assert_eq!(
        parts(parse_poll_arg("host:com.apple.screensaver@10")),
        poll("com.apple.screensaver", 10.0, true)
    );
    assert_eq!(
        parts(parse_poll_arg("/Users/me@work/com.x.plist")),
        poll("/Users/me@work/com.x.plist", 5.0, false)
    );
}

#[test]
fn log_filter_prefers_flag_then_env_then_info() {
    let filter = build_filter(Some(LogLevel::Warn), Some("trace"));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));

    let filter = build_filter(None, Some("DEBUG"));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

    let filter = build_filter(None, Some("prefwatch=trace,notify=warn"));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));

    let filter = build_filter(None, Some("   "));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));

    let filter = build_filter(None, None);
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
}
