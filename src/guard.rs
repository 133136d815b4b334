// CLASSIFICATION: COMMUNITY
// Filename: guard.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Single-flight guard serializing fault handling across tasks.
//!
//! A counting semaphore created once with a fixed number of permits. The
//! blackbox uses one permit so that at most one capture cycle touches
//! storage at a time.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use crate::error::{BlackboxError, Result};

/// How long [`SingleFlightGuard::acquire`] may block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "u64")]
pub enum WaitTimeout {
    /// Block until a permit is granted. Only for paths that cannot deadlock.
    Forever,
    After(Duration),
}

impl WaitTimeout {
    pub fn from_millis(ms: u64) -> Self {
        WaitTimeout::from(ms)
    }
}

/// Milliseconds, with `0` meaning wait forever.
impl From<u64> for WaitTimeout {
    fn from(ms: u64) -> Self {
        if ms == 0 {
            WaitTimeout::Forever
        } else {
            WaitTimeout::After(Duration::from_millis(ms))
        }
    }
}

/// Counting semaphore with a bounded wait.
#[derive(Debug)]
pub struct SingleFlightGuard {
    available: Mutex<usize>,
    released: Condvar,
    permits: usize,
}

/// Proof of a held permit. Dropping the token releases the permit.
#[must_use = "the permit is released as soon as the token is dropped"]
#[derive(Debug)]
pub struct GuardToken<'a> {
    guard: &'a SingleFlightGuard,
}

impl SingleFlightGuard {
    /// Create a guard holding `permits` permits.
    pub fn new(permits: usize) -> Result<Self> {
        if permits == 0 {
            return Err(BlackboxError::InvalidArgument("guard needs at least one permit"));
        }
        Ok(Self {
            available: Mutex::new(permits),
            released: Condvar::new(),
            permits,
        })
    }

    /// A binary guard: one holder at a time.
    pub fn binary() -> Self {
        Self {
            available: Mutex::new(1),
            released: Condvar::new(),
            permits: 1,
        }
    }

    pub fn permits(&self) -> usize {
        self.permits
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        *self.available.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a permit is free or `timeout` elapses.
    pub fn acquire(&self, timeout: WaitTimeout) -> Result<GuardToken<'_>> {
        let count = self
            .available
            .lock()
            .map_err(|_| BlackboxError::LockPoisoned)?;
        let mut count = match timeout {
            WaitTimeout::Forever => self
                .released
                .wait_while(count, |n| *n == 0)
                .map_err(|_| BlackboxError::LockPoisoned)?,
            WaitTimeout::After(limit) => {
                let (count, res) = self
                    .released
                    .wait_timeout_while(count, limit, |n| *n == 0)
                    .map_err(|_| BlackboxError::LockPoisoned)?;
                if res.timed_out() && *count == 0 {
                    warn!("bbox: guard wait timed out after {limit:?}");
                    return Err(BlackboxError::GuardTimeout);
                }
                count
            }
        };
        *count -= 1;
        debug!("bbox: guard acquired, {} left", *count);
        Ok(GuardToken { guard: self })
    }

    /// Take a permit only if one is free right now.
    pub fn try_acquire(&self) -> Option<GuardToken<'_>> {
        let mut count = self.available.lock().ok()?;
        if *count == 0 {
            return None;
        }
        *count -= 1;
        Some(GuardToken { guard: self })
    }

    /// Return a permit. Always succeeds.
    pub fn release(token: GuardToken<'_>) {
        drop(token);
    }

    fn post(&self) {
        // the count stays consistent under poisoning: it is only ever +/- 1
        let mut count = self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *count = (*count + 1).min(self.permits);
        drop(count);
        self.released.notify_one();
    }
}

impl GuardToken<'_> {
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.post();
        debug!("bbox: guard released");
    }
}
