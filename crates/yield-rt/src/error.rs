// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Recoverable errors.
//!
//! Handoff protocol violations are not represented here: they are bugs in
//! the handoff itself. They panic with a `ProtocolViolation` payload, which
//! aborts the process on the producer side and which `try_next` never
//! converts.

use std::fmt;
use std::panic;

use log::error;
use thiserror::Error;

/// Errors surfaced to callers of the generator and transceiver APIs.
#[derive(Debug, Error)]
pub enum YieldError {
    /// The producer body panicked. Carries the panic message.
    #[error("producer panicked: {0}")]
    ProducerPanicked(String),

    /// The executor could not start a thread for the producer.
    #[error("failed to spawn producer thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    /// A configuration value could not be parsed.
    #[error("invalid value `{value}` for `{key}`")]
    InvalidConfig { key: &'static str, value: String },
}

/// Panic payload for a broken handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProtocolViolation(pub &'static str);

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol violation: {}", self.0)
    }
}

/// Abandon the current step. On the consumer thread this unwinds like any
/// panic; on the producer thread the worker turns it into a process abort.
#[track_caller]
pub(crate) fn protocol_violation(what: &'static str) -> ! {
    let violation = ProtocolViolation(what);
    error!("{}", violation);
    panic::panic_any(violation)
}

/// Render a panic payload the way `std` prints it.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(v) = payload.downcast_ref::<ProtocolViolation>() {
        v.to_string()
    } else {
        "unknown panic".to_string()
    }
}
