use std::time::Duration;

/// Generates an exponentially growing sequence of delays, capped at a maximum.
///
/// The first call returns the initial delay (default `2` seconds); every call multiplies
/// the next delay by the multiplier (default `2`) until it reaches the maximum.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use reforge::ExponentialBackoff;
///
/// let mut backoff = ExponentialBackoff::new(Duration::from_secs(30));
/// assert_eq!(backoff.call(), Duration::from_secs(2));
/// assert_eq!(backoff.call(), Duration::from_secs(4));
/// assert_eq!(backoff.call(), Duration::from_secs(8));
/// ```
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_delay: Duration,
    multiplier: u32,
    delay: Duration,
}

impl ExponentialBackoff {
    /// Creates a backoff that never waits longer than `max_delay`.
    pub fn new(max_delay: Duration) -> Self {
        Self {
            max_delay,
            multiplier: 2,
            delay: Duration::from_secs(2),
        }
    }

    /// Sets the first delay of the sequence.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the factor applied to the delay on each call.
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Returns the current delay and advances the sequence.
    pub fn call(&mut self) -> Duration {
        let current = self.delay;
        self.delay = self
            .delay
            .saturating_mul(self.multiplier)
            .min(self.max_delay);
        current
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.call())
    }
}
