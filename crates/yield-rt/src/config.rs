// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Worker pool configuration.
//!
//! Defaults can be overridden from the environment:
//! - `YIELD_WORKERS`: number of pool threads (`0` = available parallelism)
//! - `YIELD_THREAD_NAME`: thread name prefix
//! - `YIELD_STACK_SIZE`: stack size in bytes for each worker

use std::env;
use std::thread;

use crate::error::YieldError;

pub const ENV_WORKERS: &str = "YIELD_WORKERS";
pub const ENV_THREAD_NAME: &str = "YIELD_THREAD_NAME";
pub const ENV_STACK_SIZE: &str = "YIELD_STACK_SIZE";

/// Every undrained producer parks a pool thread, so the pool is sized for
/// concurrent instances, not for CPU work.
pub const DEFAULT_WORKERS: usize = 64;

pub const DEFAULT_THREAD_NAME: &str = "yield-worker";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Pool threads. `0` means one per available core.
    pub num_workers: usize,
    /// Threads are named `<thread_name>-<index>`.
    pub thread_name: String,
    /// `None` keeps the platform default.
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_WORKERS,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
        }
    }
}

impl PoolConfig {
    /// Defaults overlaid with whatever `YIELD_*` variables are set.
    pub fn from_env() -> Result<Self, YieldError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, YieldError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_WORKERS) {
            config.num_workers = parse_usize(ENV_WORKERS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_THREAD_NAME) {
            let name = raw.trim();
            if name.is_empty() {
                return Err(YieldError::InvalidConfig {
                    key: ENV_THREAD_NAME,
                    value: raw,
                });
            }
            config.thread_name = name.to_string();
        }
        if let Some(raw) = lookup(ENV_STACK_SIZE) {
            config.stack_size = Some(parse_usize(ENV_STACK_SIZE, &raw)?);
        }

        Ok(config)
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Worker count with `0` resolved to the core count.
    pub fn resolved_workers(&self) -> usize {
        if self.num_workers == 0 {
            thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        } else {
            self.num_workers
        }
    }
}

fn parse_usize(key: &'static str, raw: &str) -> Result<usize, YieldError> {
    raw.trim()
        .parse()
        .map_err(|_| YieldError::InvalidConfig {
            key,
            value: raw.to_string(),
        })
}
