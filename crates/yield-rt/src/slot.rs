// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Single-value transport slot.
//!
//! Written by one side per handoff, read-then-cleared by the other before
//! the next write. The gate guarantees the two sides never touch it at the
//! same time; the mutex only exists to make that sharing sound.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::protocol_violation;

pub(crate) struct Slot<T> {
    value: Mutex<Option<T>>,
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    /// Store a value. The slot must be empty.
    pub fn put(&self, value: T) {
        let mut guard = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            drop(guard);
            protocol_violation("transport slot written twice without a read");
        }
        *guard = Some(value);
    }

    /// Remove and return the value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_empty(&self) -> bool {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("occupied", &!self.is_empty())
            .finish()
    }
}
