use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Admission check keyed by client. Injected through the app state so a
/// shared backend can replace the in-process one.
pub trait RateLimiter: Send + Sync {
    /// Records a request for `key` and returns whether it is allowed.
    fn check(&self, key: &str) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: Instant,
}

/// Fixed-window counter: the first request from a key opens a window of
/// `window` length in which at most `max` requests pass.
pub struct FixedWindowRateLimiter {
    max: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

/// Pruning expired windows only starts once this many keys are tracked.
const PRUNE_THRESHOLD: usize = 1024;

impl FixedWindowRateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() >= PRUNE_THRESHOLD {
            windows.retain(|_, w| now <= w.resets_at);
        }

        match windows.get_mut(key) {
            Some(w) if now <= w.resets_at => {
                if w.count >= self.max {
                    return false;
                }
                w.count += 1;
                true
            }
            _ => {
                windows.insert(
                    key.to_string(),
                    Window {
                        count: 1,
                        resets_at: now + self.window,
                    },
                );
                self.max > 0
            }
        }
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }
}
