// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! One-directional generator.
//!
//! The producer body runs on an executor thread and hands values out one at
//! a time through `Yielder::yield_`. Consumption goes through `Iterator`.

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::panic;
use std::sync::Arc;

use crate::error::{protocol_violation, YieldError};
use crate::executor::{default_executor, Executor};
use crate::handle::{panicked, CoroutineHandle, CoroutineState, PanicPayload};

/// Producer-side capability to publish a value.
///
/// Only valid inside the body it was handed to, and only on the producer's
/// own thread.
pub struct Yielder<'a, E> {
    handle: &'a CoroutineHandle<E>,
    _worker_only: PhantomData<*const ()>,
}

impl<'a, E: Send + 'static> Yielder<'a, E> {
    fn new(handle: &'a CoroutineHandle<E>) -> Self {
        Self {
            handle,
            _worker_only: PhantomData,
        }
    }

    /// Hand `value` to the consumer and park until it asks for the next one.
    pub fn yield_(&self, value: E) {
        self.handle.suspend(value);
    }
}

/// Pull-based generator backed by a parked producer task.
///
/// Dropping a generator before it is exhausted leaves its producer parked
/// forever, holding one executor thread. Drain it (or use an executor that
/// can afford the thread) if that matters.
pub struct Generator<E> {
    handle: Arc<CoroutineHandle<E>>,
}

impl<E: Send + 'static> Generator<E> {
    /// Schedule `body` on the default executor.
    ///
    /// # Panics
    ///
    /// If the default executor cannot start the producer. This only happens
    /// when the worker pool could not be built and spawning a fallback
    /// thread fails too.
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce(&Yielder<'_, E>) + Send + 'static,
    {
        Self::spawn_on(default_executor(), body)
            .unwrap_or_else(|e| panic!("failed to schedule producer: {}", e))
    }

    /// Schedule `body` on `executor`. The body does not run until the first
    /// call to `next`.
    pub fn spawn_on<X, F>(executor: &X, body: F) -> Result<Self, YieldError>
    where
        X: Executor + ?Sized,
        F: FnOnce(&Yielder<'_, E>) + Send + 'static,
    {
        let handle = CoroutineHandle::spawn(executor, move |handle| {
            body(&Yielder::new(handle));
        })?;
        Ok(Self { handle })
    }

    /// Like `next`, but reports a producer panic as an error instead of
    /// resuming it on this thread.
    pub fn try_next(&mut self) -> Result<Option<E>, YieldError> {
        self.resume().map_err(panicked)
    }

    /// `true` once the producer body has returned.
    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    pub fn state(&self) -> CoroutineState {
        self.handle.state()
    }

    fn resume(&mut self) -> Result<Option<E>, PanicPayload> {
        let value = self.handle.step(None)?;
        if value.is_none() && !self.handle.is_done() {
            protocol_violation("producer returned control without a value");
        }
        Ok(value)
    }
}

impl<E: Send + 'static> Iterator for Generator<E> {
    type Item = E;

    /// Run the producer up to its next yield.
    ///
    /// Returns `None` once the body has returned, on this call and every
    /// later one. A panic in the producer is resumed on the calling thread.
    fn next(&mut self) -> Option<E> {
        match self.resume() {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

impl<E: Send + 'static> FusedIterator for Generator<E> {}

impl<E> Drop for Generator<E> {
    fn drop(&mut self) {
        self.handle.release();
    }
}

impl<E> fmt::Debug for Generator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("state", &self.handle.state())
            .finish()
    }
}
