/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The alarm engine: one monitor guarding the alarm list and the worker
//! registry, one Dispatcher thread, and one display Worker per active
//! message type.
//!
//! # Synchronisation protocol
//!
//! | Shared item | Guarded by |
//! |---|---|
//! | [`AlarmList`] (entries + tracked earliest deadline) | monitor `Mutex` |
//! | [`WorkerRegistry`] | monitor `Mutex` |
//! | shutdown flag | monitor `Mutex` |
//! | per-worker stop flag | atomic, read only at the worker's safe point |
//!
//! A single `Condvar` layered on the mutex serves every waiter:
//!
//! * the Dispatcher waits until some entry is new (or shutdown begins);
//! * a Worker waits while the list holds nothing for it, or until the
//!   `due_at` of the entry it is tracking (absolute deadline).
//!
//! Every insertion, removal and worker retirement broadcasts with
//! `notify_all`.  Each waiter re-validates its condition after waking and
//! re-locates entries by message number, so spurious wakeups and deadline
//! changes are handled the same way.
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use alarm_cond::config::EngineConfig;
//! use alarm_cond::engine::AlarmEngine;
//! use alarm_cond::event::TracingSink;
//! use alarm_cond::request::{CreateWorkerRequest, ScheduleRequest};
//!
//! # fn main() -> Result<(), alarm_cond::error::EngineError> {
//! let engine = AlarmEngine::start(EngineConfig::default(), Arc::new(TracingSink))?;
//! let producer = engine.handle();
//! producer.schedule(ScheduleRequest {
//!     seconds: 5,
//!     message_type: 2,
//!     message_number: 9,
//!     message: "hi".into(),
//! })?;
//! producer.create_worker(CreateWorkerRequest { message_type: 2 })?;
//! engine.shutdown()
//! # }
//! ```

mod dispatcher;
mod worker;

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, ProtocolViolation};
use crate::event::{AlarmEvent, EventSink};
use crate::registry::WorkerRegistry;
use crate::request::{
    AlarmRequest, CancelRequest, CreateWorkerRequest, MessageType, RequestKind, ScheduleRequest,
};
use crate::store::{AlarmList, InsertOutcome};

use dispatcher::Dispatcher;

// ── Shared monitor ────────────────────────────────────────────────────────────

/// Everything protected by the monitor lock.
#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) alarms: AlarmList,
    pub(crate) workers: WorkerRegistry,
    pub(crate) shutting_down: bool,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    cond: Condvar,
    sink: Arc<dyn EventSink>,
    pub(crate) config: EngineConfig,
}

impl Shared {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, State>, EngineError> {
        self.state
            .lock()
            .map_err(|_| EngineError::SynchronizationFailure("alarm store lock poisoned"))
    }

    /// Release the lock until notified.
    pub(crate) fn wait<'a>(
        &self,
        guard: MutexGuard<'a, State>,
    ) -> Result<MutexGuard<'a, State>, EngineError> {
        self.cond
            .wait(guard)
            .map_err(|_| EngineError::SynchronizationFailure("alarm store lock poisoned"))
    }

    /// Release the lock until notified or until `deadline`.  The flag is
    /// `true` when the deadline passed.
    pub(crate) fn wait_until<'a>(
        &self,
        guard: MutexGuard<'a, State>,
        deadline: Instant,
    ) -> Result<(MutexGuard<'a, State>, bool), EngineError> {
        let timeout = deadline.saturating_duration_since(Instant::now());
        let (guard, result) = self
            .cond
            .wait_timeout(guard, timeout)
            .map_err(|_| EngineError::SynchronizationFailure("alarm store lock poisoned"))?;
        Ok((guard, result.timed_out()))
    }

    pub(crate) fn notify_all(&self) {
        self.cond.notify_all();
    }

    pub(crate) fn emit(&self, event: AlarmEvent) {
        self.sink.emit(event);
    }
}

/// Log a fatal failure seen by an engine thread and terminate the process.
///
/// Shared state may be inconsistent at this point, so no attempt is made to
/// unwind the other threads.
pub(crate) fn fatal(role: &str, err: EngineError) -> ! {
    error!(role, error = %err, "fatal engine failure, terminating process");
    std::process::exit(1)
}

// ── AlarmEngine ───────────────────────────────────────────────────────────────

/// Owner of the engine threads.
///
/// [`shutdown`](Self::shutdown) (or drop) stops the Dispatcher and every
/// Worker and joins them.
pub struct AlarmEngine {
    shared: Arc<Shared>,
    dispatcher: Option<JoinHandle<()>>,
}

impl AlarmEngine {
    /// Construct the store and registry and start the Dispatcher thread.
    ///
    /// # Errors
    /// [`EngineError::ResourceExhaustion`] if the Dispatcher thread cannot
    /// be created.
    pub fn start(config: EngineConfig, sink: Arc<dyn EventSink>) -> Result<Self, EngineError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            cond: Condvar::new(),
            sink,
            config,
        });

        let dispatcher = Dispatcher::new(Arc::clone(&shared));
        let handle = thread::Builder::new()
            .name("dispatcher".to_string())
            .spawn(move || dispatcher.run())
            .map_err(|source| EngineError::ResourceExhaustion {
                thread: "dispatcher".to_string(),
                source,
            })?;

        info!(
            max_message_len = shared.config.max_message_len,
            "alarm engine started"
        );

        Ok(Self {
            shared,
            dispatcher: Some(handle),
        })
    }

    /// A producer handle; cheap to clone and safe to use from any thread.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop accepting requests, then stop and join the Dispatcher and all
    /// Workers.
    pub fn shutdown(mut self) -> Result<(), EngineError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        let Some(dispatcher) = self.dispatcher.take() else {
            return Ok(());
        };

        {
            let mut state = self.shared.lock()?;
            state.shutting_down = true;
            self.shared.notify_all();
        }

        if dispatcher.join().is_err() {
            warn!("dispatcher panicked before exit");
        }

        // The Dispatcher is gone, so nothing registers workers any more.
        let workers = {
            let mut state = self.shared.lock()?;
            let workers = state.workers.retire_all();
            self.shared.notify_all();
            workers
        };

        let count = workers.len();
        for record in workers {
            record.join();
        }

        info!(workers = count, "alarm engine stopped");
        Ok(())
    }
}

impl Drop for AlarmEngine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "alarm engine shutdown failed");
        }
    }
}

// ── EngineHandle ──────────────────────────────────────────────────────────────

/// Producer side of the engine.
///
/// Each request is validated and inserted under the monitor lock in one
/// critical section, so the existence / duplicate checks cannot race with
/// the Dispatcher.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Shared>,
}

impl EngineHandle {
    /// Submit a timed alarm, replacing any Schedule with the same number.
    pub fn schedule(&self, req: ScheduleRequest) -> Result<InsertOutcome, EngineError> {
        req.validate(self.shared.config.max_message_len)
            .map_err(reject)?;

        let mut state = self.shared.lock()?;
        accepting(&state)?;

        let entry = AlarmRequest::schedule(&req, Instant::now());
        let outcome = state.alarms.insert(entry)?;

        let at = Utc::now();
        self.shared.emit(AlarmEvent::AlarmReceived {
            kind: RequestKind::Schedule,
            message_type: req.message_type,
            message_number: Some(req.message_number),
            at,
        });
        if let Some(previous_type) = outcome.replaced_type {
            self.shared.emit(AlarmEvent::AlarmReplaced {
                message_number: req.message_number,
                message_type: req.message_type,
                previous_type,
                at,
            });
        }

        debug!(
            message_type = req.message_type,
            message_number = req.message_number,
            preempts = outcome.preempts,
            "schedule inserted"
        );
        self.shared.notify_all();
        Ok(outcome)
    }

    /// Ask for a display worker for `req.message_type`.
    ///
    /// Accepted only if a Schedule of that type exists and no CreateWorker
    /// for the type is pending or active.
    pub fn create_worker(&self, req: CreateWorkerRequest) -> Result<(), EngineError> {
        req.validate().map_err(reject)?;
        let message_type = req.message_type;

        let mut state = self.shared.lock()?;
        accepting(&state)?;

        if !state.alarms.exists_schedule_of_type(message_type) {
            return Err(reject(ProtocolViolation::NoScheduleOfType { message_type }));
        }
        if state
            .alarms
            .exists_duplicate(message_type, RequestKind::CreateWorker)
            || state.workers.contains(message_type)
        {
            return Err(reject(ProtocolViolation::DuplicateCreateWorker {
                message_type,
            }));
        }

        state
            .alarms
            .insert(AlarmRequest::create_worker(message_type, Instant::now()))?;
        self.shared.emit(AlarmEvent::AlarmReceived {
            kind: RequestKind::CreateWorker,
            message_type,
            message_number: None,
            at: Utc::now(),
        });
        self.shared.notify_all();
        Ok(())
    }

    /// Ask for the Schedule numbered `req.message_number` to be removed.
    ///
    /// Accepted only if that Schedule exists and no other Cancel targets it.
    pub fn cancel(&self, req: CancelRequest) -> Result<(), EngineError> {
        req.validate().map_err(reject)?;
        let message_number = req.message_number;

        let mut state = self.shared.lock()?;
        accepting(&state)?;

        let Some(message_type) = state
            .alarms
            .get_schedule(message_number)
            .map(|e| e.message_type)
        else {
            return Err(reject(ProtocolViolation::NoScheduleOfNumber {
                message_number,
            }));
        };
        if state
            .alarms
            .exists_duplicate(message_number, RequestKind::Cancel)
        {
            return Err(reject(ProtocolViolation::DuplicateCancel { message_number }));
        }

        state.alarms.insert(AlarmRequest::cancel(
            message_number,
            message_type,
            Instant::now(),
        ))?;
        self.shared.emit(AlarmEvent::AlarmReceived {
            kind: RequestKind::Cancel,
            message_type,
            message_number: Some(message_number),
            at: Utc::now(),
        });
        self.shared.notify_all();
        Ok(())
    }

    /// Copy of the alarm list, in list order.
    pub fn snapshot(&self) -> Result<Vec<AlarmRequest>, EngineError> {
        let state = self.shared.lock()?;
        Ok(state.alarms.iter().cloned().collect())
    }

    /// Message types that currently have a registered display worker.
    pub fn worker_types(&self) -> Result<Vec<MessageType>, EngineError> {
        let state = self.shared.lock()?;
        Ok(state.workers.types())
    }

    /// Check the alarm list invariants under the lock.
    pub fn verify(&self) -> Result<(), EngineError> {
        self.shared.lock()?.alarms.verify()
    }
}

fn accepting(state: &State) -> Result<(), EngineError> {
    if state.shutting_down {
        Err(reject(ProtocolViolation::EngineStopped))
    } else {
        Ok(())
    }
}

fn reject(violation: ProtocolViolation) -> EngineError {
    warn!(reason = %violation, "request rejected");
    EngineError::ProtocolViolation(violation)
}
