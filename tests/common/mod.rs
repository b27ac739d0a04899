//! Common test infrastructure
//!
//! Stand-ins for the hosted AI and weather endpoints, plus helpers to build a
//! receiver backed by temporary databases.

#![allow(dead_code)]

mod mock_services;
mod receiver;

pub use mock_services::{gemini_body, MockService, RecordedRequest, Reply};
pub use receiver::{
    fields, wait_for_state, FlakyStore, TestReceiver, TestReceiverOptions, TEST_APP_ID,
};

/// How long tests wait for asynchronous state changes.
pub const STATE_TIMEOUT_MS: u64 = 5_000;
