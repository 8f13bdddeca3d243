/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Observable events emitted by the engine.
//!
//! Events are emitted while the monitor lock is held, so an [`EventSink`]
//! must never call back into the engine.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::request::{MessageNumber, MessageType, RequestKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmEvent {
    /// A request was accepted into the alarm list.
    AlarmReceived {
        kind: RequestKind,
        message_type: MessageType,
        message_number: Option<MessageNumber>,
        at: DateTime<Utc>,
    },
    /// A Schedule replaced an existing Schedule with the same number.
    AlarmReplaced {
        message_number: MessageNumber,
        message_type: MessageType,
        previous_type: MessageType,
        at: DateTime<Utc>,
    },
    WorkerCreated {
        message_type: MessageType,
        at: DateTime<Utc>,
    },
    AlarmDisplayed {
        message_type: MessageType,
        message_number: MessageNumber,
        message: String,
        at: DateTime<Utc>,
    },
    /// First sighting of a replaced entry whose type differs from before.
    TypeChanged {
        message_type: MessageType,
        previous_type: MessageType,
        message_number: MessageNumber,
        at: DateTime<Utc>,
    },
    /// A Cancel removed its target Schedule entry.
    AlarmCancelled {
        message_number: MessageNumber,
        message_type: MessageType,
        at: DateTime<Utc>,
    },
    WorkerTerminated {
        message_type: MessageType,
        at: DateTime<Utc>,
    },
}

impl AlarmEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            AlarmEvent::AlarmReceived { at, .. }
            | AlarmEvent::AlarmReplaced { at, .. }
            | AlarmEvent::WorkerCreated { at, .. }
            | AlarmEvent::AlarmDisplayed { at, .. }
            | AlarmEvent::TypeChanged { at, .. }
            | AlarmEvent::AlarmCancelled { at, .. }
            | AlarmEvent::WorkerTerminated { at, .. } => *at,
        }
    }
}

impl std::fmt::Display for AlarmEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlarmEvent::AlarmReceived {
                kind,
                message_type,
                message_number,
                at,
            } => match message_number {
                Some(n) => write!(
                    f,
                    "{} Alarm Request With Message Type ({}) and Message Number ({}) Received at <{}>",
                    kind,
                    message_type,
                    n,
                    at.timestamp()
                ),
                None => write!(
                    f,
                    "{} Alarm Request With Message Type ({}) Inserted Into Alarm List at <{}>",
                    kind,
                    message_type,
                    at.timestamp()
                ),
            },

            AlarmEvent::AlarmReplaced {
                message_number,
                message_type,
                previous_type,
                at,
            } => write!(
                f,
                "Replacement Alarm Request With Message Number ({}) Received at <{}>: type ({}) -> ({})",
                message_number,
                at.timestamp(),
                previous_type,
                message_type
            ),

            AlarmEvent::WorkerCreated { message_type, at } => write!(
                f,
                "New Periodic Display Thread With Message Type ({}) Created at <{}>",
                message_type,
                at.timestamp()
            ),

            AlarmEvent::AlarmDisplayed {
                message_type,
                message_number,
                message,
                at,
            } => write!(
                f,
                "Alarm With Message Type ({}) and Message Number ({}) Displayed at <{}>: \"{}\"",
                message_type,
                message_number,
                at.timestamp(),
                message
            ),

            AlarmEvent::TypeChanged {
                message_type,
                previous_type,
                message_number,
                at,
            } => write!(
                f,
                "Alarm With Message Number ({}) Changed Type ({}) -> ({}) at <{}>",
                message_number,
                previous_type,
                message_type,
                at.timestamp()
            ),

            AlarmEvent::AlarmCancelled {
                message_number,
                message_type,
                at,
            } => write!(
                f,
                "Alarm Request With Message Number ({}) and Message Type ({}) Removed at <{}>",
                message_number,
                message_type,
                at.timestamp()
            ),

            AlarmEvent::WorkerTerminated { message_type, at } => write!(
                f,
                "No More Alarm Requests With Message Type ({}): Periodic Display Thread Terminated at <{}>",
                message_type,
                at.timestamp()
            ),
        }
    }
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

/// Receiver of engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AlarmEvent);
}

/// Renders every event as one `info!` line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: AlarmEvent) {
        info!(target: "alarm_cond::event", "{}", event);
    }
}

/// Records events in memory and lets callers block until one shows up.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<AlarmEvent>>,
    arrived: Condvar,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far.  Empty if the log is poisoned.
    pub fn events(&self) -> Vec<AlarmEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Block until an event matching `pred` has been recorded or `timeout`
    /// elapses.  Returns the first matching event.
    pub fn wait_for<P>(&self, timeout: Duration, pred: P) -> Option<AlarmEvent>
    where
        P: Fn(&AlarmEvent) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut events = self.events.lock().ok()?;
        loop {
            if let Some(found) = events.iter().find(|e| pred(e)) {
                return Some(found.clone());
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            events = self.arrived.wait_timeout(events, remaining).ok()?.0;
        }
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: AlarmEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
            self.arrived.notify_all();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
