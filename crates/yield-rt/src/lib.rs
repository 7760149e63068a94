// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Generator-style iteration on plain OS threads.
//!
//! A producer body runs as a task on an executor and yields values to a
//! consumer that drives it one step at a time. Control alternates strictly
//! between the two, so only one of them runs user code at any moment.
//!
//! Components:
//! - gate: two binary permits giving ping-pong control transfer
//! - slot: single-value transport across each handoff
//! - handle: shared state plus the driver and worker halves of a step
//! - generator: producer yields, consumer pulls (`Iterator`)
//! - transceiver: producer yields and gets the consumer's argument back
//! - executor: where producer tasks run (rayon pool or thread per task)
//!
//! ```
//! use yield_rt::{Generator, Transceiver};
//!
//! let squares = Generator::new(|y| {
//!     for i in 1..=4u32 {
//!         y.yield_(i * i);
//!     }
//! });
//! assert_eq!(squares.collect::<Vec<_>>(), vec![1, 4, 9, 16]);
//!
//! let mut acc = Transceiver::<u32, u32>::new(|x| {
//!     let mut total = x.yield_(0);
//!     while total < 10 {
//!         total += x.yield_(total);
//!     }
//! });
//! assert_eq!(acc.next(3), Some(0));
//! assert_eq!(acc.next(4), Some(3));
//! assert_eq!(acc.next(5), Some(7));
//! assert_eq!(acc.next(0), None);
//! ```
//!
//! There is no cancellation. A generator dropped before it is exhausted
//! leaves its producer parked for good, holding an executor thread.

pub mod config;
pub mod error;
pub mod executor;
mod gate;
pub mod generator;
mod handle;
mod slot;
pub mod transceiver;

pub use config::PoolConfig;
pub use error::YieldError;
pub use executor::{default_executor, Executor, Task, ThreadPerTask, WorkerPool};
pub use generator::{Generator, Yielder};
pub use handle::CoroutineState;
pub use transceiver::{Exchange, Transceiver};
