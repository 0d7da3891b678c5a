// crates/test-utils/src/lib.rs

//! Shared fixtures for the prefwatch integration tests.

pub mod builders;
pub mod sink;

pub use sink::RecordingSink;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use prefwatch::logging::{build_filter, LOG_ENV};
use tracing_subscriber::fmt;

static INIT: Once = Once::new();

/// Upper bound for any single async test step.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a test subscriber once per test binary.
///
/// Output goes through `with_test_writer()`, so it only shows up for failing
/// tests (or with `--nocapture`). The filter follows the same rules as the
/// binary: `PREFWATCH_LOG=debug cargo test` turns on pipeline tracing.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = build_filter(None, std::env::var(LOG_ENV).ok().as_deref());
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await `f`, failing the test if it takes longer than [`TEST_TIMEOUT`].
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("pipeline did not finish within {TEST_TIMEOUT:?}"),
    }
}
