// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Task execution facility for producer bodies.
//!
//! A producer is submitted as one task and keeps its thread for as long as
//! it is alive, parked at every yield. Nothing here orders tasks relative to
//! each other; the handoff protocol supplies all the ordering it needs.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use log::{debug, error};

use crate::config::PoolConfig;
use crate::error::{panic_message, YieldError};

/// A unit of work handed to an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs an arbitrary closure asynchronously on some worker.
pub trait Executor: Send + Sync {
    /// Submit `task`. Returns once the task is queued, not when it runs.
    fn execute(&self, task: Task) -> Result<(), YieldError>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, task: Task) -> Result<(), YieldError> {
        (**self).execute(task)
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, task: Task) -> Result<(), YieldError> {
        (**self).execute(task)
    }
}

/// Fixed-size rayon thread pool.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(config: &PoolConfig) -> Result<Self, YieldError> {
        let prefix = config.thread_name.clone();
        let mut builder = rayon::ThreadPoolBuilder::new()
            .num_threads(config.resolved_workers())
            .thread_name(move |i| format!("{}-{}", prefix, i))
            .panic_handler(|payload| {
                error!("worker task panicked: {}", panic_message(payload.as_ref()));
            });
        if let Some(bytes) = config.stack_size {
            builder = builder.stack_size(bytes);
        }

        let pool = builder.build()?;
        debug!(
            "worker pool `{}` started with {} threads",
            config.thread_name,
            pool.current_num_threads()
        );
        Ok(Self { pool })
    }

    /// Pool configured from `YIELD_*` environment variables.
    pub fn from_env() -> Result<Self, YieldError> {
        Self::new(&PoolConfig::from_env()?)
    }

    pub fn num_workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Executor for WorkerPool {
    fn execute(&self, task: Task) -> Result<(), YieldError> {
        self.pool.spawn(task);
        Ok(())
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_workers", &self.num_workers())
            .finish()
    }
}

/// One detached OS thread per task. Never runs out of slots, at the cost
/// of a thread spawn per producer.
#[derive(Debug)]
pub struct ThreadPerTask {
    name: String,
    stack_size: Option<usize>,
    spawned: AtomicUsize,
}

impl ThreadPerTask {
    pub fn new() -> Self {
        Self::with_config(&PoolConfig::default())
    }

    /// Uses the thread name and stack size from `config`; the worker count
    /// does not apply.
    pub fn with_config(config: &PoolConfig) -> Self {
        Self {
            name: config.thread_name.clone(),
            stack_size: config.stack_size,
            spawned: AtomicUsize::new(0),
        }
    }

    /// Threads started so far.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Acquire)
    }
}

impl Default for ThreadPerTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ThreadPerTask {
    fn execute(&self, task: Task) -> Result<(), YieldError> {
        let id = self.spawned.fetch_add(1, Ordering::AcqRel);
        let mut builder = thread::Builder::new().name(format!("{}-{}", self.name, id));
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        // Detached: the JoinHandle is dropped and the thread runs on its own.
        let _ = builder.spawn(task)?;
        Ok(())
    }
}

static DEFAULT_EXECUTOR: OnceLock<Box<dyn Executor>> = OnceLock::new();

/// Process-wide executor used by `Generator::new` and `Transceiver::new`.
///
/// Built on first use from the environment. Bad configuration falls back to
/// defaults; a pool that cannot be built falls back to `ThreadPerTask`.
pub fn default_executor() -> &'static dyn Executor {
    DEFAULT_EXECUTOR.get_or_init(build_default).as_ref()
}

fn build_default() -> Box<dyn Executor> {
    let config = PoolConfig::from_env().unwrap_or_else(|e| {
        error!("{}; using default worker pool settings", e);
        PoolConfig::default()
    });
    match WorkerPool::new(&config) {
        Ok(pool) => Box::new(pool),
        Err(e) => {
            error!("{}; falling back to one thread per producer", e);
            Box::new(ThreadPerTask::with_config(&config))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn current_thread_name() -> String {
        thread::current().name().unwrap_or("").to_string()
    }

    #[test]
    fn pool_runs_tasks_on_named_threads() {
        let pool = WorkerPool::new(&PoolConfig::default().with_workers(2).with_thread_name("t-pool"))
            .unwrap();
        assert_eq!(pool.num_workers(), 2);

        let (tx, rx) = mpsc::channel();
        pool.execute(Box::new(move || tx.send(current_thread_name()).unwrap()))
            .unwrap();
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(name.starts_with("t-pool-"), "got {}", name);
    }

    #[test]
    fn thread_per_task_counts_spawns() {
        let exec = ThreadPerTask::with_config(&PoolConfig::default().with_thread_name("t-solo"));
        let (tx, rx) = mpsc::channel();
        for _ in 0..3 {
            let tx = tx.clone();
            exec.execute(Box::new(move || tx.send(current_thread_name()).unwrap()))
                .unwrap();
        }
        let mut names: Vec<String> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["t-solo-0", "t-solo-1", "t-solo-2"]);
        assert_eq!(exec.spawned(), 3);
    }

    fn submit(exec: impl Executor, tx: mpsc::Sender<i32>, v: i32) {
        exec.execute(Box::new(move || tx.send(v).unwrap())).unwrap();
    }

    #[test]
    fn executor_through_arc_and_ref() {
        let exec = Arc::new(ThreadPerTask::new());
        let (tx, rx) = mpsc::channel();
        submit(exec.clone(), tx.clone(), 1);
        submit(&*exec, tx, 2);
        let mut got = vec![rx.recv().unwrap(), rx.recv().unwrap()];
        got.sort();
        assert_eq!(got, vec![1, 2]);
        assert_eq!(exec.spawned(), 2);
    }

    #[test]
    fn default_executor_is_shared() {
        let a = default_executor() as *const dyn Executor as *const ();
        let b = default_executor() as *const dyn Executor as *const ();
        assert_eq!(a, b);

        let (tx, rx) = mpsc::channel();
        default_executor()
            .execute(Box::new(move || tx.send(()).unwrap()))
            .unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
}
