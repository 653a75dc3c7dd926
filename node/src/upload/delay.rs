// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Adaptive interval between upload ticks.

use crate::config::DelayConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UploadDelay {
    config: DelayConfig,
    current: Duration,
}

impl UploadDelay {
    pub fn new(config: DelayConfig) -> Self {
        let current = config.initial.clamp(config.min, config.max);
        Self { config, current }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// More data is waiting: come back sooner.
    pub fn decrease(&mut self) {
        self.scale(self.config.decrease_factor);
    }

    /// Retryable failure: back off.
    pub fn increase(&mut self) {
        self.scale(self.config.backoff_multiplier);
    }

    pub fn reset(&mut self) {
        self.current = self.config.initial.clamp(self.config.min, self.config.max);
    }

    fn scale(&mut self, factor: f64) {
        let nanos = (self.current.as_nanos() as f64 * factor).round();
        let scaled = Duration::from_nanos(nanos.min(u64::MAX as f64) as u64);
        self.current = scaled.clamp(self.config.min, self.config.max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DelayConfig {
        DelayConfig {
            initial: Duration::from_secs(5),
            min: Duration::from_secs(1),
            max: Duration::from_secs(20),
            decrease_factor: 0.5,
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let mut delay = UploadDelay::new(config());
        delay.increase();
        assert_eq!(delay.current(), Duration::from_secs(10));
        delay.increase();
        delay.increase();
        assert_eq!(delay.current(), Duration::from_secs(20));
    }

    #[test]
    fn test_decrease_stops_at_min() {
        let mut delay = UploadDelay::new(config());
        for _ in 0..10 {
            delay.decrease();
        }
        assert_eq!(delay.current(), Duration::from_secs(1));
        delay.reset();
        assert_eq!(delay.current(), Duration::from_secs(5));
    }
}
