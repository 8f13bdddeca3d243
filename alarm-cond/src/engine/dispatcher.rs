/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The single control thread that applies the side effects of newly
//! inserted requests.
//!
//! ```text
//! IDLE ──(some entry is new)──► SCANNING ──(no new entries left)──► IDLE
//!   └──(shutdown)──► exit
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{fatal, worker, Shared, State};
use crate::error::{EngineError, ProtocolViolation};
use crate::event::AlarmEvent;
use crate::registry::WorkerRecord;
use crate::request::{AlarmRequest, MessageType, RequestKind};

pub(crate) struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Thread body.  Fatal errors end the process.
    pub(crate) fn run(self) {
        debug!("dispatcher started");
        if let Err(e) = self.serve() {
            fatal("dispatcher", e);
        }
        debug!("dispatcher exiting");
    }

    fn serve(&self) -> Result<(), EngineError> {
        loop {
            let mut state = self.shared.lock()?;
            while !state.shutting_down && !state.alarms.has_new() {
                state = self.shared.wait(state)?;
            }
            if state.shutting_down {
                return Ok(());
            }

            let retired = self.scan(&mut state)?;
            state.alarms.verify()?;
            self.shared.notify_all();
            drop(state);

            // Retired workers need the lock to reach their safe point, so
            // they are joined only after it has been released.
            for record in retired {
                record.join();
            }
        }
    }

    /// Process every new entry once, in list order.  Returns the workers
    /// that were retired and still have to be joined.
    fn scan(&self, state: &mut State) -> Result<Vec<WorkerRecord>, EngineError> {
        let mut retired = Vec::new();
        while let Some(entry) = state.alarms.take_next_new() {
            match entry.kind {
                RequestKind::Schedule => self.on_schedule(state, &mut retired),
                RequestKind::CreateWorker => self.on_create_worker(state, &entry, &mut retired)?,
                RequestKind::Cancel => self.on_cancel(state, &entry, &mut retired),
            }
        }
        Ok(retired)
    }

    /// A Schedule may have replaced the last entry of some other type;
    /// retire every worker whose type has no Schedule left.
    fn on_schedule(&self, state: &mut State, retired: &mut Vec<WorkerRecord>) {
        let orphaned: Vec<MessageType> = state
            .workers
            .types()
            .into_iter()
            .filter(|&t| !state.alarms.exists_schedule_of_type(t))
            .collect();
        for message_type in orphaned {
            self.retire(state, message_type, retired);
        }
    }

    fn on_create_worker(
        &self,
        state: &mut State,
        entry: &AlarmRequest,
        retired: &mut Vec<WorkerRecord>,
    ) -> Result<(), EngineError> {
        let message_type = entry.message_type;
        let record = worker::spawn(Arc::clone(&self.shared), message_type)?;

        match state.workers.register(record) {
            Ok(()) => {
                info!(message_type, "display worker created");
                self.shared.emit(AlarmEvent::WorkerCreated {
                    message_type,
                    at: Utc::now(),
                });
            }
            Err((reason, surplus)) => {
                warn!(message_type, reason = %reason, "dropping surplus display worker");
                surplus.request_stop();
                retired.push(surplus);
            }
        }
        Ok(())
    }

    fn on_cancel(&self, state: &mut State, entry: &AlarmRequest, retired: &mut Vec<WorkerRecord>) {
        let Some(message_number) = entry.message_number else {
            return;
        };

        let removed = state.alarms.remove(message_number);
        state
            .alarms
            .remove_all_of_kind(message_number, RequestKind::Cancel);

        let Some(message_type) = removed else {
            let reason = ProtocolViolation::NoScheduleOfNumber { message_number };
            warn!(reason = %reason, "cancel found nothing to remove");
            return;
        };

        info!(message_number, message_type, "alarm cancelled");
        self.shared.emit(AlarmEvent::AlarmCancelled {
            message_number,
            message_type,
            at: Utc::now(),
        });

        if !state.alarms.exists_schedule_of_type(message_type) {
            self.retire(state, message_type, retired);
        }
    }

    /// Deregister and stop the worker for `message_type` and drop its
    /// CreateWorker entry.  A type without a worker is left alone.
    fn retire(&self, state: &mut State, message_type: MessageType, retired: &mut Vec<WorkerRecord>) {
        state
            .alarms
            .remove_all_of_kind(message_type, RequestKind::CreateWorker);

        if let Some(record) = state.workers.retire(message_type) {
            info!(message_type, created_at = %record.created_at, "display worker terminated");
            self.shared.emit(AlarmEvent::WorkerTerminated {
                message_type,
                at: Utc::now(),
            });
            retired.push(record);
        }
    }
}
