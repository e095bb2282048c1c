//! Pacing policies for job runners.
//!
//! Tree builds advance on a fixed tick by a randomized increment; benchmark
//! sweeps wait a randomized delay between units. Both are behind
//! [`PacingPolicy`] so tests can inject a deterministic policy.

use std::time::Duration;

use rand::Rng;

use crate::error::CoreError;

/// Default tree-build tick.
pub const DEFAULT_TREE_TICK: Duration = Duration::from_millis(100);

/// Default upper bound for a single tree-build increment (percentage points).
pub const DEFAULT_STEP_CEILING: f64 = 10.0;

/// Default lower bound of the benchmark inter-unit delay.
pub const DEFAULT_DELAY_MIN: Duration = Duration::from_millis(200);

/// Default upper bound of the benchmark inter-unit delay.
pub const DEFAULT_DELAY_MAX: Duration = Duration::from_millis(800);

/// Smallest increment a random draw may produce, so every tick makes progress.
const MIN_INCREMENT: f64 = 0.01;

pub trait PacingPolicy: Send + Sync {
    /// Fixed interval between tree-build ticks.
    fn tick_interval(&self) -> Duration;

    /// Progress added on the next tree-build tick.
    fn next_increment(&self) -> f64;

    /// Wait before the next benchmark unit.
    fn next_delay(&self) -> Duration;
}

/// Production pacing: uniform random increments in `(0, step_ceiling]` and
/// uniform random delays in `[delay_min, delay_max]`.
#[derive(Debug, Clone)]
pub struct RandomPacing {
    tick: Duration,
    step_ceiling: f64,
    delay_min: Duration,
    delay_max: Duration,
}

impl RandomPacing {
    pub fn new(
        tick: Duration,
        step_ceiling: f64,
        delay_min: Duration,
        delay_max: Duration,
    ) -> Result<Self, CoreError> {
        if !step_ceiling.is_finite() || step_ceiling < MIN_INCREMENT {
            return Err(CoreError::Validation(format!(
                "step ceiling must be at least {MIN_INCREMENT}, got {step_ceiling}"
            )));
        }
        if delay_min > delay_max {
            return Err(CoreError::Validation(format!(
                "delay minimum {delay_min:?} exceeds maximum {delay_max:?}"
            )));
        }
        if tick.is_zero() {
            return Err(CoreError::Validation("tick interval must be non-zero".into()));
        }
        Ok(Self {
            tick,
            step_ceiling,
            delay_min,
            delay_max,
        })
    }
}

impl Default for RandomPacing {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TREE_TICK,
            step_ceiling: DEFAULT_STEP_CEILING,
            delay_min: DEFAULT_DELAY_MIN,
            delay_max: DEFAULT_DELAY_MAX,
        }
    }
}

impl PacingPolicy for RandomPacing {
    fn tick_interval(&self) -> Duration {
        self.tick
    }

    fn next_increment(&self) -> f64 {
        rand::rng().random_range(MIN_INCREMENT..=self.step_ceiling)
    }

    fn next_delay(&self) -> Duration {
        let min = self.delay_min.as_millis() as u64;
        let max = self.delay_max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// Deterministic pacing: the same increment and delay every time.
#[derive(Debug, Clone)]
pub struct FixedPacing {
    pub tick: Duration,
    pub increment: f64,
    pub delay: Duration,
}

impl PacingPolicy for FixedPacing {
    fn tick_interval(&self) -> Duration {
        self.tick
    }

    fn next_increment(&self) -> f64 {
        self.increment
    }

    fn next_delay(&self) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_draws_stay_in_bounds() {
        let pacing = RandomPacing::new(
            Duration::from_millis(50),
            5.0,
            Duration::from_millis(10),
            Duration::from_millis(20),
        )
        .unwrap();

        for _ in 0..1_000 {
            let inc = pacing.next_increment();
            assert!(inc > 0.0 && inc <= 5.0, "increment {inc} out of range");

            let delay = pacing.next_delay();
            assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(20));
        }
        assert_eq!(pacing.tick_interval(), Duration::from_millis(50));
    }

    #[test]
    fn equal_delay_bounds_are_allowed() {
        let pacing = RandomPacing::new(
            DEFAULT_TREE_TICK,
            DEFAULT_STEP_CEILING,
            Duration::from_millis(7),
            Duration::from_millis(7),
        )
        .unwrap();

        assert_eq!(pacing.next_delay(), Duration::from_millis(7));
    }

    #[test]
    fn rejects_inverted_delay_range() {
        let result = RandomPacing::new(
            DEFAULT_TREE_TICK,
            DEFAULT_STEP_CEILING,
            Duration::from_millis(500),
            Duration::from_millis(100),
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_non_positive_step_ceiling() {
        for ceiling in [0.0, -1.0, f64::NAN] {
            let result =
                RandomPacing::new(DEFAULT_TREE_TICK, ceiling, DEFAULT_DELAY_MIN, DEFAULT_DELAY_MAX);
            assert!(result.is_err(), "ceiling {ceiling} should be rejected");
        }
    }
}
