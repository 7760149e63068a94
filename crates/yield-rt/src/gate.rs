// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Rendezvous gate: two binary permits that pass control back and forth
//! between a driver (the consumer thread) and a worker (the producer task).
//!
//! Each side only ever waits on its own permit and only ever releases the
//! other side's, so at most one of them is runnable at a time.

use std::sync::{Condvar, Mutex, PoisonError};

/// One binary permit. Starts unsignaled.
///
/// Releasing an already-released permit is a no-op, which is what makes it
/// binary rather than counting.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    state: (Mutex<bool>, Condvar),
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release the permit. Never blocks.
    pub fn notify(&self) {
        let (lock, cvar) = &self.state;
        let mut ready = lock.lock().unwrap_or_else(PoisonError::into_inner);
        *ready = true;
        cvar.notify_one();
    }

    /// Block until the permit is released, then consume it.
    pub fn wait(&self) {
        let (lock, cvar) = &self.state;
        let mut ready = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !*ready {
            ready = cvar.wait(ready).unwrap_or_else(PoisonError::into_inner);
        }
        *ready = false;
    }

    /// Whether the permit is currently released and not yet consumed.
    #[cfg(test)]
    pub fn is_set(&self) -> bool {
        *self.state.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Strict ping-pong control transfer.
///
/// `driver_signal` wakes the worker for one step; `worker_signal` hands
/// control back. Waits are unbounded: there is no timeout and no
/// cancellation.
#[derive(Debug, Default)]
pub(crate) struct RendezvousGate {
    /// Released by the driver, consumed by the worker.
    driver_ready: Signal,
    /// Released by the worker, consumed by the driver.
    worker_ready: Signal,
}

impl RendezvousGate {
    pub fn new() -> Self {
        Self {
            driver_ready: Signal::new(),
            worker_ready: Signal::new(),
        }
    }

    /// Driver side: let the worker run one step.
    pub fn driver_signal(&self) {
        self.driver_ready.notify();
    }

    /// Driver side: block until the worker hands control back.
    pub fn driver_wait(&self) {
        self.worker_ready.wait();
    }

    /// Worker side: hand control back to the driver.
    pub fn worker_signal(&self) {
        self.worker_ready.notify();
    }

    /// Worker side: block until the driver asks for the next step.
    pub fn worker_wait(&self) {
        self.driver_ready.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn signal_is_binary() {
        let s = Signal::new();
        assert!(!s.is_set());
        s.notify();
        s.notify();
        assert!(s.is_set());
        s.wait();
        assert!(!s.is_set());
    }

    #[test]
    fn wait_blocks_until_notified() {
        let s = Arc::new(Signal::new());
        let s2 = s.clone();
        let waiter = std::thread::spawn(move || {
            s2.wait();
            42
        });
        std::thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        s.notify();
        assert_eq!(waiter.join().unwrap(), 42);
    }

    #[test]
    fn ping_pong() {
        let gate = Arc::new(RendezvousGate::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let worker = {
            let gate = gate.clone();
            let log = log.clone();
            std::thread::spawn(move || {
                for i in 0..3 {
                    gate.worker_wait();
                    log.lock().unwrap().push(format!("worker {}", i));
                    gate.worker_signal();
                }
            })
        };

        for i in 0..3 {
            log.lock().unwrap().push(format!("driver {}", i));
            gate.driver_signal();
            gate.driver_wait();
        }
        worker.join().unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["driver 0", "worker 0", "driver 1", "worker 1", "driver 2", "worker 2"]
        );
    }
}
