use std::time::Duration;

use crate::error::SchedulerError;
use crate::regulator::RegulatorTuning;

/// Default target rate in ticks per second.
pub const DEFAULT_TARGET_RATE: f64 = 30.0;

/// Delay before the first tick, independent of the target rate.
///
/// Gives the host event loop time to finish its own startup.
pub const DEFAULT_BOOTSTRAP_DELAY: Duration = Duration::from_millis(10);

/// Frame loop configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Desired ticks per second. Must be positive and finite.
    pub target_rate: f64,

    /// When false the regulator only observes; the tick interval never changes.
    pub stabilization: bool,

    pub bootstrap_delay: Duration,

    pub tuning: RegulatorTuning,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_rate: DEFAULT_TARGET_RATE,
            stabilization: true,
            bootstrap_delay: DEFAULT_BOOTSTRAP_DELAY,
            tuning: RegulatorTuning::default(),
        }
    }
}

impl LoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_rate(mut self, rate: f64) -> Self {
        self.target_rate = rate;
        self
    }

    pub fn stabilization(mut self, enabled: bool) -> Self {
        self.stabilization = enabled;
        self
    }

    pub fn bootstrap_delay(mut self, delay: Duration) -> Self {
        self.bootstrap_delay = delay;
        self
    }

    pub fn tuning(mut self, tuning: RegulatorTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Checks the configuration before it reaches a scheduler.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        validate_target_rate(self.target_rate)?;
        self.tuning.validate()
    }
}

pub(crate) fn validate_target_rate(target_rate: f64) -> Result<(), SchedulerError> {
    // `!(x > 0)` also rejects NaN.
    if !(target_rate > 0.0) || !target_rate.is_finite() {
        return Err(SchedulerError::InvalidConfiguration { target_rate });
    }
    Ok(())
}
