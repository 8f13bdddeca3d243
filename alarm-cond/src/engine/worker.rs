/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Periodic display worker: one thread per active message type.
//!
//! Each cycle takes the lock, picks the Schedule entry of the bound type
//! that is due first (ties broken circularly after the last one shown),
//! waits for its deadline, displays it and pushes its deadline one period
//! ahead.  Entries are never removed here; only Cancel processing does that.
//!
//! The stop flag is checked between cycles, with no lock held, so a worker
//! never exits while owning the monitor.  It is checked again right after
//! the lock is taken, because retirement raises it under that lock and a
//! broadcast sent before the worker waits is lost.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, trace};

use super::{fatal, Shared, State};
use crate::error::EngineError;
use crate::event::AlarmEvent;
use crate::registry::{StopFlag, WorkerRecord};
use crate::request::{MessageNumber, MessageType};

/// Start a worker thread bound to `message_type`.
///
/// # Errors
/// [`EngineError::ResourceExhaustion`] if the thread cannot be created.
pub(crate) fn spawn(shared: Arc<Shared>, message_type: MessageType) -> Result<WorkerRecord, EngineError> {
    let name = format!("{}-{}", shared.config.thread_name_prefix, message_type);
    let stop = StopFlag::new();
    let worker = Worker {
        shared,
        message_type,
        stop: stop.clone(),
        last_shown: None,
    };

    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || worker.run())
        .map_err(|source| EngineError::ResourceExhaustion {
            thread: name,
            source,
        })?;

    Ok(WorkerRecord::new(message_type, handle, stop))
}

struct Worker {
    shared: Arc<Shared>,
    message_type: MessageType,
    stop: StopFlag,
    /// Number of the entry displayed last; the circular scan resumes after it.
    last_shown: Option<MessageNumber>,
}

impl Worker {
    fn run(mut self) {
        debug!(message_type = self.message_type, "display worker started");
        loop {
            // Safe point: the lock is not held here.
            if self.stop.is_stop_requested() {
                debug!(message_type = self.message_type, "display worker stopping");
                return;
            }
            if let Err(e) = self.cycle() {
                fatal("display worker", e);
            }
        }
    }

    /// One pass: at most one display.  Returns after every wakeup so the
    /// stop flag is looked at before the lock is taken again.
    fn cycle(&mut self) -> Result<(), EngineError> {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.lock()?;
        if self.stop.is_stop_requested() {
            return Ok(());
        }

        let Some(number) = state
            .alarms
            .next_due_of_type(self.message_type, self.last_shown)
        else {
            // Empty list, or nothing of our type yet.
            let _state = shared.wait(state)?;
            return Ok(());
        };

        self.report_type_change(&mut state, number);

        let Some(due_at) = state.alarms.get_schedule(number).map(|e| e.due_at) else {
            return Ok(());
        };
        if due_at > Instant::now() {
            trace!(message_type = self.message_type, message_number = number, "waiting for deadline");
            let (guard, timed_out) = shared.wait_until(state, due_at)?;
            state = guard;
            if !timed_out {
                // Someone changed the list; start over.
                return Ok(());
            }
        }

        self.display_if_due(&mut state, number)
    }

    /// Emit the one-time notice for an entry that replaced a Schedule of a
    /// different type.
    fn report_type_change(&self, state: &mut State, number: MessageNumber) {
        let Some(entry) = state.alarms.get_schedule(number) else {
            return;
        };
        if !entry.type_changed() || entry.change_acknowledged {
            return;
        }
        if let Some(previous_type) = entry.previous_type {
            self.shared.emit(AlarmEvent::TypeChanged {
                message_type: entry.message_type,
                previous_type,
                message_number: number,
                at: Utc::now(),
            });
            state.alarms.acknowledge_change(number);
        }
    }

    /// Re-locate `number` after the wait and display it if it is still ours
    /// and due.
    fn display_if_due(&mut self, state: &mut State, number: MessageNumber) -> Result<(), EngineError> {
        let now = Instant::now();
        let Some(entry) = state.alarms.get_schedule(number) else {
            return Ok(());
        };
        if entry.message_type != self.message_type || entry.due_at > now {
            return Ok(());
        }
        let period = entry.period.ok_or_else(|| {
            EngineError::Corrupted(format!("schedule entry {} has no period", number))
        })?;

        self.shared.emit(AlarmEvent::AlarmDisplayed {
            message_type: self.message_type,
            message_number: number,
            message: entry.message.clone(),
            at: Utc::now(),
        });

        state.alarms.reschedule(number, now + period);
        self.last_shown = Some(number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Condvar, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::config::EngineConfig;
    use crate::event::EventLog;
    use crate::request::{AlarmRequest, ScheduleRequest};

    fn shared_with(state: State) -> Arc<Shared> {
        Arc::new(Shared {
            state: Mutex::new(state),
            cond: Condvar::new(),
            sink: Arc::new(EventLog::new()),
            config: EngineConfig::default(),
        })
    }

    fn far_alarm(message_type: MessageType) -> State {
        let mut state = State::default();
        let req = ScheduleRequest {
            seconds: 60,
            message_type,
            message_number: 1,
            message: "far away".into(),
        };
        state
            .alarms
            .insert(AlarmRequest::schedule(&req, Instant::now()))
            .unwrap();
        state
    }

    /// Raise the stop flag while the worker is blocked on the lock, i.e.
    /// after its unlocked check, and time how long it takes to exit.
    fn stop_while_blocked_on_lock(shared: Arc<Shared>, message_type: MessageType) -> Duration {
        let guard = shared.lock().unwrap();
        let record = spawn(Arc::clone(&shared), message_type).unwrap();
        thread::sleep(Duration::from_millis(50));

        record.request_stop();
        shared.notify_all();
        drop(guard);

        let started = Instant::now();
        record.join();
        started.elapsed()
    }

    #[test]
    fn stop_between_cycles_skips_deadline_wait() {
        let elapsed = stop_while_blocked_on_lock(shared_with(far_alarm(3)), 3);
        assert!(elapsed < Duration::from_secs(5), "worker exited after {elapsed:?}");
    }

    #[test]
    fn stop_between_cycles_skips_idle_wait() {
        let elapsed = stop_while_blocked_on_lock(shared_with(State::default()), 3);
        assert!(elapsed < Duration::from_secs(5), "worker exited after {elapsed:?}");
    }

    #[test]
    fn displays_due_entry_and_pushes_deadline() {
        let mut state = State::default();
        let req = ScheduleRequest {
            seconds: 1,
            message_type: 4,
            message_number: 2,
            message: "soon".into(),
        };
        let past = Instant::now() - Duration::from_secs(1);
        state.alarms.insert(AlarmRequest::schedule(&req, past)).unwrap();

        let log = Arc::new(EventLog::new());
        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            cond: Condvar::new(),
            sink: log.clone(),
            config: EngineConfig::default(),
        });
        let record = spawn(Arc::clone(&shared), 4).unwrap();

        let shown = log.wait_for(Duration::from_secs(5), |e| {
            matches!(e, AlarmEvent::AlarmDisplayed { message_number: 2, .. })
        });
        assert!(shown.is_some());

        {
            let _guard = shared.lock().unwrap();
            record.request_stop();
            shared.notify_all();
        }
        record.join();

        let state = shared.lock().unwrap();
        let entry = state.alarms.get_schedule(2).unwrap();
        assert!(entry.due_at > Instant::now());
    }
}
