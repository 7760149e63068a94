// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Bidirectional generator.
//!
//! Each `next(argument)` call writes the argument into the slot and runs the
//! producer for one step. The producer picks the argument up at its next
//! `yield_`, which publishes the output and, once resumed, returns that
//! argument. So the argument of step *k* comes back from the yield that
//! produced step *k*'s output, and work done before the first yield never
//! sees consumer input.

use std::fmt;
use std::marker::PhantomData;
use std::panic;
use std::sync::Arc;

use crate::error::{protocol_violation, YieldError};
use crate::executor::{default_executor, Executor};
use crate::handle::{panicked, CoroutineHandle, CoroutineState, PanicPayload};

/// What crosses the handoff. Exactly one direction is valid at a time.
pub(crate) enum Transport<A, E> {
    /// Written by the consumer, read by the producer.
    Input(A),
    /// Written by the producer, read by the consumer.
    Output(E),
}

/// Producer-side capability: publish a value, get the consumer's argument.
pub struct Exchange<'a, A, E> {
    handle: &'a CoroutineHandle<Transport<A, E>>,
    _worker_only: PhantomData<*const ()>,
}

impl<'a, A, E> Exchange<'a, A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    fn new(handle: &'a CoroutineHandle<Transport<A, E>>) -> Self {
        Self {
            handle,
            _worker_only: PhantomData,
        }
    }

    /// Publish `value` and park until the next step. Returns the argument
    /// of the step that received `value`.
    pub fn yield_(&self, value: E) -> A {
        let argument = match self.handle.take() {
            Some(Transport::Input(argument)) => argument,
            Some(Transport::Output(_)) => {
                protocol_violation("producer read back its own output")
            }
            None => protocol_violation("no argument waiting for the producer"),
        };
        self.handle.suspend(Transport::Output(value));
        argument
    }
}

/// Generator that takes an argument on every step.
///
/// Same lifetime rules as `Generator`: an undrained transceiver keeps its
/// producer parked forever.
pub struct Transceiver<A, E> {
    handle: Arc<CoroutineHandle<Transport<A, E>>>,
}

impl<A, E> Transceiver<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    /// Schedule `body` on the default executor.
    ///
    /// # Panics
    ///
    /// If the default executor cannot start the producer.
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce(&Exchange<'_, A, E>) + Send + 'static,
    {
        Self::spawn_on(default_executor(), body)
            .unwrap_or_else(|e| panic!("failed to schedule producer: {}", e))
    }

    /// Schedule `body` on `executor`. The body does not run until the first
    /// call to `next`.
    pub fn spawn_on<X, F>(executor: &X, body: F) -> Result<Self, YieldError>
    where
        X: Executor + ?Sized,
        F: FnOnce(&Exchange<'_, A, E>) + Send + 'static,
    {
        let handle = CoroutineHandle::spawn(executor, move |handle| {
            body(&Exchange::new(handle));
        })?;
        Ok(Self { handle })
    }

    /// Deliver `argument` and run the producer up to its next yield.
    ///
    /// Returns `None` once the body has returned; the argument of that call
    /// is dropped. A panic in the producer is resumed on the calling thread.
    pub fn next(&mut self, argument: A) -> Option<E> {
        match self.resume(argument) {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Like `next`, but reports a producer panic as an error.
    pub fn try_next(&mut self, argument: A) -> Result<Option<E>, YieldError> {
        self.resume(argument).map_err(panicked)
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    pub fn state(&self) -> CoroutineState {
        self.handle.state()
    }

    fn resume(&mut self, argument: A) -> Result<Option<E>, PanicPayload> {
        match self.handle.step(Some(Transport::Input(argument)))? {
            Some(Transport::Output(value)) => Ok(Some(value)),
            // Finished without picking up this step's argument.
            Some(Transport::Input(_)) | None if self.handle.is_done() => Ok(None),
            Some(Transport::Input(_)) => {
                protocol_violation("producer returned control without consuming input")
            }
            None => protocol_violation("producer returned control without a value"),
        }
    }
}

impl<A, E> Drop for Transceiver<A, E> {
    fn drop(&mut self) {
        self.handle.release();
    }
}

impl<A, E> fmt::Debug for Transceiver<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transceiver")
            .field("state", &self.handle.state())
            .finish()
    }
}
