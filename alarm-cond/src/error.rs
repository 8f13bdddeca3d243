/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the alarm engine.
//!
//! Two error enums model the two failure layers:
//!
//! * [`ProtocolViolation`]: why a single producer request was refused
//!   (carries the offending type / number so the rejection can be reported
//!   verbatim).
//! * [`EngineError`]: top-level failure returned from the engine API and
//!   from the Dispatcher / Worker internals.
//!
//! Only [`EngineError::ProtocolViolation`] is recoverable.  Every other
//! variant means shared state can no longer be trusted; the thread that
//! observes it logs the error and terminates the process.

use thiserror::Error;

use crate::request::{MessageNumber, MessageType};

// ── Request rejection ─────────────────────────────────────────────────────────

/// Detailed reason why a producer request was rejected.
///
/// Carried inside [`EngineError::ProtocolViolation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A numeric field that must be strictly positive was zero.
    NonPositiveField { field: &'static str },

    /// The alarm message is longer than the configured maximum.
    MessageTooLong { len: usize, max: usize },

    /// CreateWorker for a type that has no Schedule entry.
    NoScheduleOfType { message_type: MessageType },

    /// A CreateWorker for this type is already pending or active.
    DuplicateCreateWorker { message_type: MessageType },

    /// Cancel for a number that has no Schedule entry.
    NoScheduleOfNumber { message_number: MessageNumber },

    /// Another Cancel already targets this number.
    DuplicateCancel { message_number: MessageNumber },

    /// The registry already holds a live worker for this type.
    WorkerAlreadyRegistered { message_type: MessageType },

    /// The engine is shutting down and no longer accepts requests.
    EngineStopped,
}

impl std::fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolViolation::NonPositiveField { field } => {
                write!(f, "field '{}' must be greater than zero", field)
            }

            ProtocolViolation::MessageTooLong { len, max } => write!(
                f,
                "message is {} characters long, at most {} are allowed",
                len, max
            ),

            ProtocolViolation::NoScheduleOfType { message_type } => write!(
                f,
                "no alarm request with message type ({})",
                message_type
            ),

            ProtocolViolation::DuplicateCreateWorker { message_type } => write!(
                f,
                "more than one create-worker request with message type ({})",
                message_type
            ),

            ProtocolViolation::NoScheduleOfNumber { message_number } => write!(
                f,
                "no alarm request with message number ({}) to cancel",
                message_number
            ),

            ProtocolViolation::DuplicateCancel { message_number } => write!(
                f,
                "more than one request to cancel alarm request with message number ({})",
                message_number
            ),

            ProtocolViolation::WorkerAlreadyRegistered { message_type } => write!(
                f,
                "a display worker for message type ({}) is already registered",
                message_type
            ),

            ProtocolViolation::EngineStopped => write!(f, "engine is shutting down"),
        }
    }
}

// ── Top-level engine errors ───────────────────────────────────────────────────

/// Top-level error type of the alarm engine.
///
/// | Variant | Fatal |
/// |---|---|
/// | `ProtocolViolation` | no, request dropped and caller informed |
/// | `ResourceExhaustion` | yes |
/// | `SynchronizationFailure` | yes |
/// | `Corrupted` | yes |
#[derive(Debug, Error)]
pub enum EngineError {
    /// An invalid or duplicate request reached the engine.
    #[error("request rejected: {0}")]
    ProtocolViolation(ProtocolViolation),

    /// The OS refused to create an engine thread.
    #[error("cannot create thread '{thread}'")]
    ResourceExhaustion {
        thread: String,
        #[source]
        source: std::io::Error,
    },

    /// A lock or condition variable became unusable (poisoned by a panic
    /// in another thread).
    #[error("synchronization failure: {0}")]
    SynchronizationFailure(&'static str),

    /// The alarm list no longer satisfies its ordering / uniqueness
    /// invariants.
    #[error("alarm list corrupted: {0}")]
    Corrupted(String),
}

impl EngineError {
    /// `true` for every category that must terminate the process.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::ProtocolViolation(_))
    }
}

impl From<ProtocolViolation> for EngineError {
    fn from(v: ProtocolViolation) -> Self {
        EngineError::ProtocolViolation(v)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
