// tests/common/mod.rs

#![allow(dead_code, unused_imports)]

pub use opd_supervisor_test_utils::builders;
pub use opd_supervisor_test_utils::capture::{SharedBuffer, capture_writer};
pub use opd_supervisor_test_utils::{init_tracing, with_timeout};
