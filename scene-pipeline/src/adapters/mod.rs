//! Uniform façades over external providers and the local encoder.
//!
//! Provider adapters share one contract: a synchronous request that yields a
//! task id, then cooperative polling with bounded attempts. Every failure
//! mode (missing API key, non-200, non-JSON body, unrecognized state, poll
//! exhaustion) collapses to `None`; handlers choose a fallback per phase.

pub mod download;
pub mod encoder;
pub mod image;
pub mod video;

use std::time::Duration;

/// One poll observation of a provider task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Keep polling
    Pending,
    /// Provider gave up; the adapter returns `None`
    Failed,
    /// Result URL is available
    Ready(String),
}

/// Bounded polling schedule shared by the provider adapters
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    /// 60 attempts x 10 s = 10 minute ceiling
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(10),
        }
    }
}
