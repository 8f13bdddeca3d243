/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Registry of live display workers, at most one per message type.
//!
//! Like the alarm list, the registry has no lock of its own and is only
//! touched while the engine's monitor lock is held.  Records are kept sorted
//! by message type.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::ProtocolViolation;
use crate::request::MessageType;

// ── StopFlag ──────────────────────────────────────────────────────────────────

/// Cooperative cancellation flag shared between the registry and one worker.
///
/// The worker only looks at it between cycles, while it holds no lock.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ── WorkerRecord ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct WorkerRecord {
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
    handle: JoinHandle<()>,
    stop: StopFlag,
}

impl WorkerRecord {
    pub fn new(message_type: MessageType, handle: JoinHandle<()>, stop: StopFlag) -> Self {
        Self {
            message_type,
            created_at: Utc::now(),
            handle,
            stop,
        }
    }

    /// Ask the worker to exit at its next safe point.  The caller must wake
    /// it (notify the condition variable) afterwards.
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Wait for the worker thread to finish.  Must be called without the
    /// monitor lock held.
    pub fn join(self) {
        let message_type = self.message_type;
        match self.handle.join() {
            Ok(()) => debug!(message_type, "display worker joined"),
            Err(_) => warn!(message_type, "display worker panicked before exit"),
        }
    }
}

// ── WorkerRegistry ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct WorkerRegistry {
    records: Vec<WorkerRecord>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, message_type: MessageType) -> bool {
        self.records.iter().any(|r| r.message_type == message_type)
    }

    /// Registered message types, ascending.
    pub fn types(&self) -> Vec<MessageType> {
        self.records.iter().map(|r| r.message_type).collect()
    }

    /// Add `record` at its sorted position.
    ///
    /// # Errors
    /// Hands the record back if a worker of the same type is already
    /// registered, so the caller can stop and join the surplus thread.
    pub fn register(
        &mut self,
        record: WorkerRecord,
    ) -> Result<(), (ProtocolViolation, WorkerRecord)> {
        let message_type = record.message_type;
        if self.contains(message_type) {
            return Err((
                ProtocolViolation::WorkerAlreadyRegistered { message_type },
                record,
            ));
        }
        let idx = self
            .records
            .iter()
            .position(|r| r.message_type > message_type)
            .unwrap_or(self.records.len());
        self.records.insert(idx, record);
        Ok(())
    }

    /// Remove and return the record for `message_type`, with its stop flag
    /// already raised.  `None` if no worker of that type is registered.
    pub fn retire(&mut self, message_type: MessageType) -> Option<WorkerRecord> {
        let idx = self
            .records
            .iter()
            .position(|r| r.message_type == message_type)?;
        let record = self.records.remove(idx);
        record.request_stop();
        Some(record)
    }

    /// Retire every worker, e.g. at shutdown.
    pub fn retire_all(&mut self) -> Vec<WorkerRecord> {
        let records = std::mem::take(&mut self.records);
        for record in &records {
            record.request_stop();
        }
        records
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
