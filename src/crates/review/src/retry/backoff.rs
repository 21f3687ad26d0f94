//! Exponential back-off schedule and jitter.

use rand::Rng;
use std::time::Duration;

/// Un-jittered exponential schedule.
///
/// The first delay is `initial`; every following delay is the previous one
/// multiplied by `factor`, capped at `max`. Jitter is applied separately to
/// each sleep so it never compounds into the schedule.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    factor: f64,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        let factor = if factor.is_finite() && factor >= 1.0 {
            factor
        } else {
            1.0
        };
        Self {
            next: initial,
            max,
            factor,
        }
    }

    /// Return the current delay and advance the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next.min(self.max);
        let grown = (current.as_secs_f64() * self.factor).min(self.max.as_secs_f64());
        self.next = Duration::from_secs_f64(grown);
        current
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

/// Perturb `delay` by a uniform offset in `[-factor*delay, +factor*delay]`.
pub fn apply_jitter(delay: Duration, factor: f64) -> Duration {
    apply_jitter_with(delay, factor, &mut rand::thread_rng())
}

pub(crate) fn apply_jitter_with<R: Rng + ?Sized>(
    delay: Duration,
    factor: f64,
    rng: &mut R,
) -> Duration {
    let factor = factor.clamp(0.0, 1.0);
    let base = delay.as_secs_f64();
    let spread = base * factor;
    if spread <= 0.0 {
        return delay;
    }
    let offset = rng.gen_range(-spread..=spread);
    Duration::from_secs_f64((base + offset).max(0.0))
}
