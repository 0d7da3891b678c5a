#![allow(dead_code)]

use std::error::Error;

pub use prefwatch_test_utils::builders::*;
pub use prefwatch_test_utils::{init_tracing, with_timeout, RecordingSink};

pub type TestResult = Result<(), Box<dyn Error>>;
