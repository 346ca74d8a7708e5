//! Global dual-window rate limiter
//!
//! Every outbound request goes through [`RateLimiter::schedule`]. An operation
//! runs only once it fits inside every configured window (by default 3 per
//! second AND 60 per minute), and only one operation is dispatched at a time so
//! requests never cluster at window boundaries. Waiters queue on a fair lock,
//! so dispatch follows submission order.

use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A ceiling of `limit` dispatches in any sliding window of `period`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub limit: u32,
    pub period: Duration,
}

impl RateWindow {
    pub fn per_second(limit: u32) -> Self {
        Self {
            limit,
            period: Duration::from_secs(1),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            period: Duration::from_secs(60),
        }
    }
}

/// Dispatch history of one window
#[derive(Debug)]
struct WindowState {
    window: RateWindow,
    dispatched: VecDeque<Instant>,
}

impl WindowState {
    fn new(window: RateWindow) -> Self {
        Self {
            window,
            dispatched: VecDeque::with_capacity(window.limit as usize),
        }
    }

    /// Forgets dispatches that have slid out of the window
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.dispatched.front() {
            if oldest + self.window.period <= now {
                self.dispatched.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until this window admits another dispatch
    fn wait_time(&self, now: Instant) -> Duration {
        if (self.dispatched.len() as u32) < self.window.limit {
            return Duration::ZERO;
        }

        match self.dispatched.front() {
            Some(&oldest) => (oldest + self.window.period).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }
}

/// Process-wide gate on outbound traffic
///
/// Construct one instance and share it (`Arc<RateLimiter>`) between every
/// fetcher; crawls of different entity kinds draw from the same budget.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<Vec<WindowState>>,
}

impl RateLimiter {
    /// Creates a limiter enforcing every window at once
    pub fn new(windows: Vec<RateWindow>) -> Self {
        Self {
            windows: Mutex::new(windows.into_iter().map(WindowState::new).collect()),
        }
    }

    /// Creates the per-second + per-minute limiter described by the config
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(vec![
            RateWindow::per_second(config.per_second),
            RateWindow::per_minute(config.per_minute),
        ])
    }

    /// Creates a limiter with no windows
    ///
    /// Operations still run one at a time but are never delayed.
    pub fn unlimited() -> Self {
        Self::new(Vec::new())
    }

    /// Runs `operation` once every window has room for it
    ///
    /// The limiter never fails; it only delays. The dispatch lock is held
    /// until `operation` completes.
    pub async fn schedule<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut windows = self.windows.lock().await;

        loop {
            let now = Instant::now();
            let mut wait = Duration::ZERO;
            for state in windows.iter_mut() {
                state.prune(now);
                wait = wait.max(state.wait_time(now));
            }

            if wait.is_zero() {
                for state in windows.iter_mut() {
                    state.dispatched.push_back(now);
                }
                break;
            }

            tracing::trace!("Rate limiter full, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }

        let output = operation().await;
        drop(windows);
        output
    }
}
