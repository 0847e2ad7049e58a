use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Monotonic time source used by every bounded wait in the crate.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock for tests: `sleep` returns immediately and moves time forward.
///
/// An optional hook runs on every sleep, which lets a test play the emitter and append data
/// "while" the reader is waiting.
pub struct ManualClock {
    state: Mutex<ManualState>,
}

struct ManualState {
    now: Instant,
    slept: Duration,
    sleeps: usize,
    on_sleep: Option<Box<dyn FnMut(usize) + Send>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: Instant::now(),
                slept: Duration::ZERO,
                sleeps: 0,
                on_sleep: None,
            }),
        }
    }

    /// Installs a callback invoked with the 1-based sleep count after time has advanced.
    pub fn on_sleep(&self, hook: impl FnMut(usize) + Send + 'static) {
        self.lock().on_sleep = Some(Box::new(hook));
    }

    pub fn advance(&self, duration: Duration) {
        let mut state = self.lock();
        state.now += duration;
    }

    /// Total virtual time spent in `sleep`.
    pub fn slept(&self) -> Duration {
        self.lock().slept
    }

    pub fn sleeps(&self) -> usize {
        self.lock().sleeps
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.lock().now
    }

    fn sleep(&self, duration: Duration) {
        // The hook runs outside the lock so it may call back into the clock.
        let (count, hook) = {
            let mut state = self.lock();
            state.now += duration;
            state.slept += duration;
            state.sleeps += 1;
            (state.sleeps, state.on_sleep.take())
        };
        if let Some(mut hook) = hook {
            hook(count);
            let mut state = self.lock();
            if state.on_sleep.is_none() {
                state.on_sleep = Some(hook);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn manual_sleep_advances_time_without_blocking() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_secs(3600));
        assert_eq!(clock.now() - start, Duration::from_secs(3600));
        assert_eq!(clock.sleeps(), 1);
        assert_eq!(clock.slept(), Duration::from_secs(3600));
    }

    #[test]
    fn hook_sees_every_sleep() {
        let clock = ManualClock::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_hook = Arc::clone(&seen);
        clock.on_sleep(move |count| {
            seen_hook.store(count, Ordering::SeqCst);
        });
        clock.sleep(Duration::from_millis(1));
        clock.sleep(Duration::from_millis(1));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
