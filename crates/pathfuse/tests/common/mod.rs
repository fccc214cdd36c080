//! Common test utilities for dispatcher integration tests.

pub mod harness;
pub mod recording;

pub use harness::*;
#[allow(unused_imports)]
pub use recording::RecordingStorage;
