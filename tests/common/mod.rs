//! Common test utilities for llmgateway-core
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::common::fixtures::{TestUpstreams, openai_completion};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let upstreams = TestUpstreams::start().await;
//!     let core = upstreams.core();
//!     // ...
//! }
//! ```

pub mod fixtures;

pub use fixtures::{TestUpstreams, openai_completion, test_catalog, test_config};

/// Assert that a result is Ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a result is Err and return the error
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}
