use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::PollSettings;

/// Shortest pause between attempts; a zero interval is raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryStep {
    /// Run one more attempt.
    Attempt,
    /// The deadline has passed; stop.
    Expired,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum RetryState {
    Fresh,
    Running,
    Expired,
}

/// Fixed-interval retry bounded by a monotonic deadline.
///
/// The first [`step`](Self::step) always yields an attempt. Each later step sleeps for the poll
/// interval, capped at the time left, so one final attempt happens right at the deadline before
/// the machine reports [`RetryStep::Expired`]. A timeout too large to represent as an
/// [`Instant`] (such as `Duration::MAX`) means no deadline at all.
pub struct BoundedRetry<'c> {
    clock: &'c dyn Clock,
    started: Instant,
    deadline: Option<Instant>,
    interval: Duration,
    attempts: usize,
    state: RetryState,
}

impl<'c> BoundedRetry<'c> {
    pub fn new(clock: &'c dyn Clock, settings: PollSettings) -> Self {
        let started = clock.now();
        Self {
            clock,
            started,
            deadline: started.checked_add(settings.timeout),
            interval: settings.interval.max(MIN_POLL_INTERVAL),
            attempts: 0,
            state: RetryState::Fresh,
        }
    }

    pub fn step(&mut self) -> RetryStep {
        match self.state {
            RetryState::Expired => return RetryStep::Expired,
            RetryState::Fresh => {
                self.state = RetryState::Running;
            }
            RetryState::Running => {
                let now = self.clock.now();
                let pause = match self.deadline {
                    Some(deadline) if now >= deadline => {
                        self.state = RetryState::Expired;
                        return RetryStep::Expired;
                    }
                    Some(deadline) => self.interval.min(deadline - now),
                    None => self.interval,
                };
                self.clock.sleep(pause);
            }
        }
        self.attempts += 1;
        RetryStep::Attempt
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started)
    }
}
