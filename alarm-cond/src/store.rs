/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The ordered alarm list shared by the producer, Dispatcher and Workers.
//!
//! [`AlarmList`] is a plain container with no locking of its own; the engine
//! keeps it inside its monitor `Mutex` and every method here must be called
//! with that lock held.  Entries live in a `Vec` kept sorted by
//! [`AlarmRequest::sort_key`], so positions are only meaningful until the lock
//! is released.  Callers that wait re-locate entries by message number.
//!
//! # Invariants
//! * iteration order is ascending by sort key, so Schedule entries are
//!   strictly ascending by message number;
//! * at most one Schedule entry per message number;
//! * at most one CreateWorker entry per message type and at most one Cancel
//!   entry per message number.
//!
//! Any violation observed here is reported as [`EngineError::Corrupted`] and
//! treated as fatal by the engine.

use std::time::Instant;

use tracing::trace;

use crate::error::EngineError;
use crate::request::{AlarmRequest, MessageNumber, MessageType, RequestKind};

/// Result of [`AlarmList::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Type of the Schedule entry that was replaced in place, if any.
    pub replaced_type: Option<MessageType>,

    /// `true` if the list was empty or the new entry is due before the
    /// previously tracked earliest deadline.  Waiters must re-evaluate.
    pub preempts: bool,
}

#[derive(Debug, Default)]
pub struct AlarmList {
    entries: Vec<AlarmRequest>,
    /// Earliest `due_at` among Schedule entries.
    earliest_due: Option<Instant>,
}

impl AlarmList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlarmRequest> {
        self.entries.iter()
    }

    /// Earliest deadline among Schedule entries, as currently tracked.
    pub fn earliest_due(&self) -> Option<Instant> {
        self.earliest_due
    }

    // ── Insertion ─────────────────────────────────────────────────────────────

    /// Insert `request` at its sorted position.
    ///
    /// A Schedule whose number is already present replaces the existing
    /// Schedule in place and records the old entry's type in
    /// `previous_type`.
    ///
    /// # Errors
    /// [`EngineError::Corrupted`] if a CreateWorker or Cancel with the same
    /// key is already stored (the producer must have rejected it).
    pub fn insert(&mut self, mut request: AlarmRequest) -> Result<InsertOutcome, EngineError> {
        let was_empty = self.entries.is_empty();
        let preempts = request.is_schedule()
            && self.earliest_due.map_or(true, |e| request.due_at < e);

        let mut replaced_type = None;
        match request.kind {
            RequestKind::Schedule => {
                let number = request.message_number.unwrap_or(0);
                let idx = self.lower_bound(number, &request);
                let existing = self
                    .entries
                    .get_mut(idx)
                    .filter(|e| e.is_schedule() && e.message_number == Some(number));
                match existing {
                    Some(existing) => {
                        request.previous_type = Some(existing.message_type);
                        replaced_type = Some(existing.message_type);
                        *existing = request;
                    }
                    None => self.entries.insert(idx, request),
                }
            }
            RequestKind::CreateWorker | RequestKind::Cancel => {
                let key = match request.kind {
                    RequestKind::CreateWorker => request.message_type,
                    _ => request.message_number.unwrap_or(0),
                };
                if self.exists_duplicate(key, request.kind) {
                    return Err(EngineError::Corrupted(format!(
                        "second {} entry for key {}",
                        request.kind, key
                    )));
                }
                let sort_key = request.sort_key();
                let idx = self.entries.partition_point(|e| e.sort_key() < sort_key);
                self.entries.insert(idx, request);
            }
        }

        self.refresh_earliest();
        trace!(len = self.entries.len(), ?replaced_type, preempts, "alarm list insert");
        Ok(InsertOutcome {
            replaced_type,
            preempts: preempts || was_empty,
        })
    }

    /// First index whose `(number, kind)` is not below that of `request`.
    fn lower_bound(&self, number: MessageNumber, request: &AlarmRequest) -> usize {
        let (_, rank, _) = request.sort_key();
        self.entries.partition_point(|e| {
            let (n, r, _) = e.sort_key();
            (n, r) < (number, rank)
        })
    }

    // ── Read-only scans ───────────────────────────────────────────────────────

    pub fn exists_schedule_of_type(&self, message_type: MessageType) -> bool {
        self.entries
            .iter()
            .any(|e| e.is_schedule() && e.message_type == message_type)
    }

    pub fn exists_schedule_of_number(&self, message_number: MessageNumber) -> bool {
        self.get_schedule(message_number).is_some()
    }

    /// `true` if an entry of `kind` with `key` exists.  The key is the
    /// message type for CreateWorker and the message number otherwise.
    pub fn exists_duplicate(&self, key: u32, kind: RequestKind) -> bool {
        self.entries.iter().any(|e| matches_key(e, key, kind))
    }

    pub fn get_schedule(&self, message_number: MessageNumber) -> Option<&AlarmRequest> {
        self.entries
            .iter()
            .find(|e| e.is_schedule() && e.message_number == Some(message_number))
    }

    fn get_schedule_mut(&mut self, message_number: MessageNumber) -> Option<&mut AlarmRequest> {
        self.entries
            .iter_mut()
            .find(|e| e.is_schedule() && e.message_number == Some(message_number))
    }

    /// Pick the Schedule entry of `message_type` a worker should service
    /// next: the one due first, ties broken circularly by message number
    /// starting after `after` (wrapping to the head of the list).
    pub fn next_due_of_type(
        &self,
        message_type: MessageType,
        after: Option<MessageNumber>,
    ) -> Option<MessageNumber> {
        self.entries
            .iter()
            .filter(|e| e.is_schedule() && e.message_type == message_type)
            .filter_map(|e| e.message_number.map(|n| (e.due_at, n)))
            .min_by_key(|&(due, n)| {
                let wrapped = after.is_some_and(|a| n <= a);
                (due, wrapped, n)
            })
            .map(|(_, n)| n)
    }

    pub fn has_new(&self) -> bool {
        self.entries.iter().any(|e| e.is_new)
    }

    // ── Mutation ──────────────────────────────────────────────────────────────

    /// Clear `is_new` on the first unprocessed entry and return a copy of it.
    pub fn take_next_new(&mut self) -> Option<AlarmRequest> {
        let entry = self.entries.iter_mut().find(|e| e.is_new)?;
        entry.is_new = false;
        Some(entry.clone())
    }

    /// Unlink the Schedule entry numbered `message_number`, returning its
    /// type.  `None` when no such entry exists.
    pub fn remove(&mut self, message_number: MessageNumber) -> Option<MessageType> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.is_schedule() && e.message_number == Some(message_number))?;
        let removed = self.entries.remove(idx);
        self.refresh_earliest();
        Some(removed.message_type)
    }

    /// Unlink every entry of `kind` matching `key` (type for CreateWorker,
    /// number otherwise).  Returns how many were removed.
    pub fn remove_all_of_kind(&mut self, key: u32, kind: RequestKind) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !matches_key(e, key, kind));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.refresh_earliest();
        }
        removed
    }

    /// Move the deadline of a Schedule entry.  Returns `false` if the entry
    /// is gone.
    pub fn reschedule(&mut self, message_number: MessageNumber, due_at: Instant) -> bool {
        let Some(entry) = self.get_schedule_mut(message_number) else {
            return false;
        };
        entry.due_at = due_at;
        self.refresh_earliest();
        true
    }

    /// Mark the type change of a replaced Schedule entry as reported.
    pub fn acknowledge_change(&mut self, message_number: MessageNumber) -> bool {
        match self.get_schedule_mut(message_number) {
            Some(entry) => {
                entry.change_acknowledged = true;
                true
            }
            None => false,
        }
    }

    fn refresh_earliest(&mut self) {
        self.earliest_due = self
            .entries
            .iter()
            .filter(|e| e.is_schedule())
            .map(|e| e.due_at)
            .min();
    }

    // ── Integrity ─────────────────────────────────────────────────────────────

    /// Check every list invariant.
    pub fn verify(&self) -> Result<(), EngineError> {
        for pair in self.entries.windows(2) {
            let [a, b] = pair else { continue };
            if a.sort_key() >= b.sort_key() {
                return Err(EngineError::Corrupted(format!(
                    "entries out of order: {:?} before {:?}",
                    a.sort_key(),
                    b.sort_key()
                )));
            }
            let same_number = a.message_number.is_some() && a.message_number == b.message_number;
            if same_number && a.kind == b.kind {
                return Err(EngineError::Corrupted(format!(
                    "two {} entries share message number {:?}",
                    a.kind, a.message_number
                )));
            }
        }
        for entry in &self.entries {
            let numbered = entry.message_number.is_some();
            let valid = match entry.kind {
                RequestKind::Schedule => numbered && entry.period.is_some(),
                RequestKind::Cancel => numbered,
                RequestKind::CreateWorker => !numbered,
            };
            if !valid {
                return Err(EngineError::Corrupted(format!(
                    "malformed {} entry {:?}",
                    entry.kind,
                    entry.sort_key()
                )));
            }
        }
        Ok(())
    }
}

fn matches_key(entry: &AlarmRequest, key: u32, kind: RequestKind) -> bool {
    if entry.kind != kind {
        return false;
    }
    match kind {
        RequestKind::CreateWorker => entry.message_type == key,
        RequestKind::Schedule | RequestKind::Cancel => entry.message_number == Some(key),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
