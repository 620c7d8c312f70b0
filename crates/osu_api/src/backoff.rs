//! The exponential-backoff policy shared by the upstream clients.

use std::time::Duration;

use rand::Rng as _;

/// Ceiling the escalating delay converges to.
const CAP: Duration = Duration::from_secs(64);

/// Exponential backoff with jitter, capped at roughly 64 seconds.
///
/// Starting from a client-configured cooldown, each escalation sets the delay
/// to `(2^r + U[0,1)) s` for retry count `r`; once the delay has reached the
/// cap, every further escalation yields `64 s` plus up to a second of jitter.
/// There is no retry limit, so a persistently failing upstream is retried at
/// the capped cadence forever.
#[derive(Debug)]
pub struct Backoff {
    retries: u32,
    delay: Duration,
}

impl Backoff {
    /// Starts the policy at the given initial delay.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            retries: 0,
            delay: cooldown,
        }
    }

    /// The delay to sleep before the next attempt.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Escalates after a rate limit or server error, returning the new delay.
    pub fn escalate(&mut self) -> Duration {
        let mut rng = rand::rng();
        self.delay = if self.delay >= CAP {
            CAP + Duration::from_millis(rng.random_range(0..1000))
        } else {
            Duration::from_secs_f64(2f64.powi(self.retries as i32) + rng.random::<f64>())
        };
        self.retries += 1;
        self.delay
    }
}
