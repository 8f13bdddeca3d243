/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Alarm request data structures.
//!
//! Two layers model the two sides of the engine boundary:
//!
//! ```text
//! producer ──(ScheduleRequest / CreateWorkerRequest / CancelRequest)──►  AlarmRequest  ──► AlarmList
//!              ↑ validated input                                          ↑ stored entry, mutated by
//!                                                                           Dispatcher (is_new) and
//!                                                                           Worker (due_at, ack)
//! ```
//!
//! # Ownership model
//! An `AlarmRequest` is **owned** by the [`AlarmList`](crate::store::AlarmList)
//! from insertion until Cancel processing removes it.  Threads never keep a
//! reference to an entry across a lock release; they remember the entry's
//! message number and re-locate it after every wait.

use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::error::ProtocolViolation;

/// Message type: selects which display worker owns a Schedule entry.
pub type MessageType = u32;

/// Message number: the unique key of a Schedule entry.
pub type MessageNumber = u32;

/// Longest accepted alarm message, in characters.
pub const MAX_MESSAGE_LEN: usize = 127;

// ── Request kind ──────────────────────────────────────────────────────────────

/// What a stored [`AlarmRequest`] asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Timed alarm, displayed periodically once due.
    Schedule,
    /// Spawn a display worker for one message type.
    CreateWorker,
    /// Remove one Schedule entry by message number.
    Cancel,
}

impl RequestKind {
    /// Position of this kind among entries sharing a sort number.
    ///
    /// A Cancel sorts right after the Schedule it targets.
    fn rank(self) -> u8 {
        match self {
            RequestKind::CreateWorker => 0,
            RequestKind::Schedule => 1,
            RequestKind::Cancel => 2,
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestKind::Schedule => "schedule",
            RequestKind::CreateWorker => "create-worker",
            RequestKind::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

// ── Stored entry ──────────────────────────────────────────────────────────────

/// One entry of the shared alarm list.
#[derive(Debug, Clone)]
pub struct AlarmRequest {
    pub kind: RequestKind,

    /// For a Cancel this is the type of the targeted Schedule at submission
    /// time (informational; the Dispatcher uses the type it actually removes).
    pub message_type: MessageType,

    /// `None` for CreateWorker entries.
    pub message_number: Option<MessageNumber>,

    /// Display period.  `Some` only for Schedule entries.
    pub period: Option<Duration>,

    pub message: String,

    /// Next time this entry should be displayed.
    pub due_at: Instant,

    /// Set on insertion, cleared by the Dispatcher once processed.
    pub is_new: bool,

    /// Type of the Schedule entry this one replaced, if any.
    pub previous_type: Option<MessageType>,

    /// Set once the type-changed event for a replacement has been emitted.
    pub change_acknowledged: bool,
}

impl AlarmRequest {
    /// Build a Schedule entry first due `seconds` after `now`.
    pub fn schedule(req: &ScheduleRequest, now: Instant) -> Self {
        let period = Duration::from_secs(u64::from(req.seconds));
        Self {
            kind: RequestKind::Schedule,
            message_type: req.message_type,
            message_number: Some(req.message_number),
            period: Some(period),
            message: req.message.clone(),
            due_at: now + period,
            is_new: true,
            previous_type: None,
            change_acknowledged: false,
        }
    }

    pub fn create_worker(message_type: MessageType, now: Instant) -> Self {
        Self {
            kind: RequestKind::CreateWorker,
            message_type,
            message_number: None,
            period: None,
            message: String::new(),
            due_at: now,
            is_new: true,
            previous_type: None,
            change_acknowledged: false,
        }
    }

    pub fn cancel(message_number: MessageNumber, message_type: MessageType, now: Instant) -> Self {
        Self {
            kind: RequestKind::Cancel,
            message_type,
            message_number: Some(message_number),
            period: None,
            message: String::new(),
            due_at: now,
            is_new: true,
            previous_type: None,
            change_acknowledged: false,
        }
    }

    /// Key that orders the alarm list: message number (CreateWorker entries
    /// count as 0), then kind, then message type.
    pub fn sort_key(&self) -> (MessageNumber, u8, MessageType) {
        (
            self.message_number.unwrap_or(0),
            self.kind.rank(),
            self.message_type,
        )
    }

    pub fn is_schedule(&self) -> bool {
        self.kind == RequestKind::Schedule
    }

    /// `true` if this entry replaced a Schedule of a different type.
    pub fn type_changed(&self) -> bool {
        self.previous_type
            .is_some_and(|prev| prev != self.message_type)
    }
}

// ── Producer-facing requests ──────────────────────────────────────────────────

/// A timed alarm submitted by the producer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduleRequest {
    /// Delay before the first display and period between displays.
    pub seconds: u32,
    pub message_type: MessageType,
    pub message_number: MessageNumber,
    #[serde(default)]
    pub message: String,
}

impl ScheduleRequest {
    /// Check field ranges.  `max_message_len` is counted in characters.
    pub fn validate(&self, max_message_len: usize) -> Result<(), ProtocolViolation> {
        positive("seconds", self.seconds)?;
        positive("message_type", self.message_type)?;
        positive("message_number", self.message_number)?;
        let len = self.message.chars().count();
        if len > max_message_len {
            return Err(ProtocolViolation::MessageTooLong {
                len,
                max: max_message_len,
            });
        }
        Ok(())
    }
}

/// Request to start a display worker for `message_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CreateWorkerRequest {
    pub message_type: MessageType,
}

impl CreateWorkerRequest {
    pub fn validate(&self) -> Result<(), ProtocolViolation> {
        positive("message_type", self.message_type)
    }
}

/// Request to remove the Schedule entry numbered `message_number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CancelRequest {
    pub message_number: MessageNumber,
}

impl CancelRequest {
    pub fn validate(&self) -> Result<(), ProtocolViolation> {
        positive("message_number", self.message_number)
    }
}

fn positive(field: &'static str, value: u32) -> Result<(), ProtocolViolation> {
    if value == 0 {
        Err(ProtocolViolation::NonPositiveField { field })
    } else {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sched(seconds: u32, message_type: u32, message_number: u32, message: &str) -> ScheduleRequest {
        ScheduleRequest {
            seconds,
            message_type,
            message_number,
            message: message.to_string(),
        }
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn valid_schedule_passes() {
        assert!(sched(5, 2, 9, "hi").validate(MAX_MESSAGE_LEN).is_ok());
    }

    #[test]
    fn zero_fields_are_rejected_by_name() {
        let err = sched(0, 2, 9, "hi").validate(MAX_MESSAGE_LEN).unwrap_err();
        assert_eq!(err, ProtocolViolation::NonPositiveField { field: "seconds" });

        let err = sched(5, 0, 9, "hi").validate(MAX_MESSAGE_LEN).unwrap_err();
        assert_eq!(
            err,
            ProtocolViolation::NonPositiveField {
                field: "message_type"
            }
        );

        let err = CancelRequest { message_number: 0 }.validate().unwrap_err();
        assert_eq!(
            err,
            ProtocolViolation::NonPositiveField {
                field: "message_number"
            }
        );

        assert!(CreateWorkerRequest { message_type: 0 }.validate().is_err());
    }

    #[test]
    fn message_length_counts_characters() {
        let exact = "é".repeat(MAX_MESSAGE_LEN);
        assert!(sched(1, 1, 1, &exact).validate(MAX_MESSAGE_LEN).is_ok());

        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert_eq!(
            sched(1, 1, 1, &long).validate(MAX_MESSAGE_LEN).unwrap_err(),
            ProtocolViolation::MessageTooLong {
                len: 128,
                max: MAX_MESSAGE_LEN
            }
        );
    }

    // ── AlarmRequest ──────────────────────────────────────────────────────────

    #[test]
    fn schedule_entry_is_due_after_its_period() {
        let now = Instant::now();
        let entry = AlarmRequest::schedule(&sched(5, 2, 9, "hi"), now);
        assert_eq!(entry.due_at - now, Duration::from_secs(5));
        assert_eq!(entry.period, Some(Duration::from_secs(5)));
        assert!(entry.is_new);
        assert_eq!(entry.previous_type, None);
        assert!(!entry.change_acknowledged);
        assert!(!entry.type_changed());
    }

    #[test]
    fn sort_key_places_create_worker_first_and_cancel_after_schedule() {
        let now = Instant::now();
        let create = AlarmRequest::create_worker(7, now);
        let schedule = AlarmRequest::schedule(&sched(1, 7, 3, ""), now);
        let cancel = AlarmRequest::cancel(3, 7, now);
        assert!(create.sort_key() < schedule.sort_key());
        assert!(schedule.sort_key() < cancel.sort_key());
    }

    #[test]
    fn type_changed_only_for_different_previous_type() {
        let mut entry = AlarmRequest::schedule(&sched(1, 9, 7, ""), Instant::now());
        entry.previous_type = Some(9);
        assert!(!entry.type_changed());
        entry.previous_type = Some(5);
        assert!(entry.type_changed());
    }
}
