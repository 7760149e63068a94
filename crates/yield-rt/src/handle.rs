// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Shared coroutine state.
//!
//! One `CoroutineHandle` is shared by the consumer-facing object and the
//! producer task. It owns the gate, the transport slot and the `done` flag.
//! No locking beyond the slot's own mutex is needed: the gate lets exactly
//! one side touch the rest at a time.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::process;
use std::sync::Arc;

use log::{debug, error, trace, warn};

use crate::error::{panic_message, ProtocolViolation, YieldError};
use crate::executor::Executor;
use crate::gate::RendezvousGate;
use crate::slot::Slot;

pub(crate) type PanicPayload = Box<dyn Any + Send + 'static>;

/// Coroutine lifecycle.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
    /// Scheduled, body not started yet. Waits for the first step.
    Parked = 0,
    /// The producer has control.
    Running = 1,
    /// Parked inside a yield with a value published.
    Suspended = 2,
    /// Body returned or panicked. Terminal.
    Finished = 3,
}

impl CoroutineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Parked,
            1 => Self::Running,
            2 => Self::Suspended,
            3 => Self::Finished,
            _ => Self::Finished,
        }
    }
}

pub(crate) struct CoroutineHandle<T> {
    gate: RendezvousGate,
    slot: Slot<T>,
    /// Set once, by the worker, after the body returns.
    done: AtomicBool,
    state: AtomicU8,
    /// Producer panic waiting to be reported to the driver.
    panic: Slot<PanicPayload>,
}

impl<T: Send + 'static> CoroutineHandle<T> {
    fn new() -> Self {
        Self {
            gate: RendezvousGate::new(),
            slot: Slot::new(),
            done: AtomicBool::new(false),
            state: AtomicU8::new(CoroutineState::Parked as u8),
            panic: Slot::new(),
        }
    }

    /// Submit `body` to `executor`. The body does not start until the first
    /// `step`.
    pub fn spawn<E, F>(executor: &E, body: F) -> Result<Arc<Self>, YieldError>
    where
        E: Executor + ?Sized,
        F: FnOnce(&Self) + Send + 'static,
    {
        let handle = Arc::new(Self::new());
        let worker = handle.clone();
        executor.execute(Box::new(move || worker.run(body)))?;
        debug!("producer scheduled ({:p})", Arc::as_ptr(&handle));
        Ok(handle)
    }

    /// Worker task body.
    ///
    /// A producer panic is kept for the driver. A protocol violation aborts
    /// the process: the driver is parked on the gate and cannot be trusted
    /// to see a consistent handoff again.
    fn run<F>(self: Arc<Self>, body: F)
    where
        F: FnOnce(&Self),
    {
        self.gate.worker_wait();
        trace!("producer started ({:p})", Arc::as_ptr(&self));

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| body(&*self))) {
            if let Some(violation) = payload.downcast_ref::<ProtocolViolation>() {
                error!("{} on producer ({:p}); aborting", violation, Arc::as_ptr(&self));
                eprintln!("fatal: {}", violation);
                process::abort();
            }
            warn!(
                "producer panicked ({:p}): {}",
                Arc::as_ptr(&self),
                panic_message(payload.as_ref())
            );
            self.panic.put(payload);
        }

        self.done.store(true, Ordering::Release);
        self.set_state(CoroutineState::Finished);
        debug!("producer finished ({:p})", Arc::as_ptr(&self));
        self.gate.worker_signal();
    }

    /// Worker side of a yield: publish `value`, hand control back and park
    /// until the next step.
    pub fn suspend(&self, value: T) {
        self.slot.put(value);
        self.set_state(CoroutineState::Suspended);
        self.gate.worker_signal();
        self.gate.worker_wait();
    }

    /// Worker side: read-and-clear whatever the driver left in the slot.
    pub fn take(&self) -> Option<T> {
        self.slot.take()
    }

    /// Worker side: hand control back without publishing anything.
    #[cfg(test)]
    pub fn suspend_empty(&self) {
        self.set_state(CoroutineState::Suspended);
        self.gate.worker_signal();
        self.gate.worker_wait();
    }

    /// Driver side: run the producer for one step.
    ///
    /// `input` is written to the slot before the worker is released. Once
    /// finished this returns `Ok(None)` without touching the gate, dropping
    /// `input`. Returns the slot contents after the step, or the producer's
    /// panic if it panicked during this step.
    pub fn step(&self, input: Option<T>) -> Result<Option<T>, PanicPayload> {
        if self.is_done() {
            return Ok(None);
        }
        if let Some(value) = input {
            self.slot.put(value);
        }

        trace!("step ({:p})", self as *const Self);
        self.set_state(CoroutineState::Running);
        self.gate.driver_signal();
        self.gate.driver_wait();

        if let Some(payload) = self.panic.take() {
            // Anything left behind belongs to the aborted step.
            drop(self.slot.take());
            return Err(payload);
        }
        Ok(self.slot.take())
    }
}

impl<T> CoroutineHandle<T> {
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn state(&self) -> CoroutineState {
        CoroutineState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: CoroutineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Called when the consumer-side object goes away.
    pub fn release(&self) {
        match self.state() {
            CoroutineState::Finished => {}
            state => warn!(
                "coroutine dropped while {:?} ({:p}); its producer stays parked and keeps a worker",
                state, self as *const Self
            ),
        }
    }
}

/// Turn a step's panic into the public error type.
pub(crate) fn panicked(payload: PanicPayload) -> YieldError {
    YieldError::ProducerPanicked(panic_message(payload.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ThreadPerTask;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn body_waits_for_first_step() {
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let handle = CoroutineHandle::<u32>::spawn(&ThreadPerTask::new(), move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(handle.state(), CoroutineState::Parked);

        assert!(matches!(handle.step(None), Ok(None)));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(handle.is_done());
        assert_eq!(handle.state(), CoroutineState::Finished);
    }

    #[test]
    fn suspend_publishes_value() {
        let handle = CoroutineHandle::<i32>::spawn(&ThreadPerTask::new(), |h| {
            h.suspend(7);
            h.suspend(8);
        })
        .unwrap();

        assert_eq!(handle.step(None).ok().flatten(), Some(7));
        assert_eq!(handle.state(), CoroutineState::Suspended);
        assert_eq!(handle.step(None).ok().flatten(), Some(8));
        assert_eq!(handle.step(None).ok().flatten(), None);
        assert!(handle.is_done());
    }

    #[test]
    fn input_reaches_worker() {
        let handle = CoroutineHandle::<i32>::spawn(&ThreadPerTask::new(), |h| {
            let got = h.take().unwrap();
            h.suspend(got * 2);
        })
        .unwrap();

        assert_eq!(handle.step(Some(21)).ok().flatten(), Some(42));
        // The body returns without consuming it, so it comes back untouched.
        assert_eq!(handle.step(Some(5)).ok().flatten(), Some(5));
        assert!(handle.is_done());
        assert!(matches!(handle.step(Some(9)), Ok(None)));
    }

    #[test]
    fn panic_is_reported_once() {
        let handle = CoroutineHandle::<u8>::spawn(&ThreadPerTask::new(), |_| panic!("boom"))
            .unwrap();

        let payload = handle.step(None).unwrap_err();
        assert_eq!(panicked(payload).to_string(), "producer panicked: boom");
        assert!(handle.is_done());
        assert!(matches!(handle.step(None), Ok(None)));
    }

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            CoroutineState::Parked,
            CoroutineState::Running,
            CoroutineState::Suspended,
            CoroutineState::Finished,
        ] {
            assert_eq!(CoroutineState::from_u8(state as u8), state);
        }
        assert_eq!(CoroutineState::from_u8(3), CoroutineState::Finished);
        assert_eq!(CoroutineState::from_u8(u8::MAX), CoroutineState::Finished);
    }
}
