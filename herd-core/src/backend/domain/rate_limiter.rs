//! Fixed look-back window rate limiter for the assistant API quota.
//!
//! A call is admitted when fewer than `max_calls` admissions happened within
//! the last `window`. Timestamps older than one window are pruned before every
//! check, so the queue never holds more than `max_calls` entries.
//!
//! The limiter is a cheap cloneable handle; clones share the same quota.

use log::{debug, info};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded, next call allowed in {reset_in_ms} ms")]
    Exceeded { reset_in_ms: u64 },
    #[error("Gave up waiting for rate limit admission after {waited_ms} ms")]
    WaitTimeout { waited_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining_calls: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStats {
    pub used: usize,
    pub remaining: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Arc<Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    /// `max_calls` below 1 is raised to 1
    pub fn new(max_calls: usize, window_ms: u64) -> Self {
        Self {
            max_calls: max_calls.max(1),
            window: Duration::from_millis(window_ms.max(1)),
            calls: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_calls, config.window_ms)
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn prune(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = calls.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }

    /// Milliseconds until the oldest retained call leaves the window, at least 1
    fn reset_in_ms(&self, calls: &VecDeque<Instant>, now: Instant) -> u64 {
        let remaining = match calls.front() {
            Some(&oldest) => self.window.saturating_sub(now.saturating_duration_since(oldest)),
            None => self.window,
        };
        let millis = remaining.as_micros().div_ceil(1000);
        u64::try_from(millis).unwrap_or(u64::MAX).max(1)
    }

    /// Report whether a call would be admitted now, without recording one
    pub fn check(&self) -> RateLimitStatus {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut calls, Instant::now());
        let remaining_calls = self.max_calls.saturating_sub(calls.len());
        RateLimitStatus {
            allowed: remaining_calls > 0,
            remaining_calls,
        }
    }

    /// Record a call if the window has room, else return the ms until it will
    fn try_admit(&self) -> Result<(), u64> {
        let now = Instant::now();
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut calls, now);

        if calls.len() < self.max_calls {
            calls.push_back(now);
            debug!("Rate limiter admitted call ({}/{})", calls.len(), self.max_calls);
            Ok(())
        } else {
            let reset_in_ms = self.reset_in_ms(&calls, now);
            debug!("Rate limiter rejected call, reset in {} ms", reset_in_ms);
            Err(reset_in_ms)
        }
    }

    /// Record a call if the window has room; otherwise fail without recording
    pub fn acquire(&self) -> Result<(), RateLimitError> {
        self.try_admit()
            .map_err(|reset_in_ms| RateLimitError::Exceeded { reset_in_ms })
    }

    /// Suspend until a call is admitted.
    ///
    /// Sleeps on the tokio timer between attempts; never gives up.
    pub async fn wait_and_acquire(&self) {
        while let Err(reset_in_ms) = self.try_admit() {
            tokio::time::sleep(Duration::from_millis(reset_in_ms)).await;
        }
    }

    /// Like [`wait_and_acquire`](Self::wait_and_acquire), but fails once
    /// admission cannot happen within `max_wait`.
    ///
    /// A `max_wait` too large to represent as a deadline means no deadline.
    pub async fn wait_and_acquire_timeout(&self, max_wait: Duration) -> Result<(), RateLimitError> {
        let started = Instant::now();
        let deadline = started.checked_add(max_wait);
        while let Err(reset_in_ms) = self.try_admit() {
            let pause = Duration::from_millis(reset_in_ms);
            if let Some(deadline) = deadline {
                let in_time = Instant::now()
                    .checked_add(pause)
                    .is_some_and(|wake_at| wake_at <= deadline);
                if !in_time {
                    let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    return Err(RateLimitError::WaitTimeout { waited_ms });
                }
            }
            tokio::time::sleep(pause).await;
        }
        Ok(())
    }

    pub fn get_stats(&self) -> RateLimitStats {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut calls, Instant::now());
        RateLimitStats {
            used: calls.len(),
            remaining: self.max_calls.saturating_sub(calls.len()),
            total: self.max_calls,
        }
    }

    /// Forget all recorded calls
    pub fn reset(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
        info!("Rate limiter reset, {} calls available", self.max_calls);
    }
}
