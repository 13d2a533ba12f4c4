//! Adaptive tick-rate regulation.
//!
//! The regulator owns a notional "interval rate": the rate whose period is used as
//! the delay between ticks. Every tick it compares the measured rate against the
//! target and, when stabilization is on, nudges the interval rate by a bounded
//! proportional step. Hosts pay for hook execution and event-loop latency on top of
//! the requested delay, so the interval rate settles above the target in practice.

use std::fmt;
use std::time::Duration;

use crate::config::validate_target_rate;
use crate::error::SchedulerError;

/// Controller constants.
///
/// The defaults are the values the loop has always shipped with; they are exposed so
/// hosts with unusual event loops can retune them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RegulatorTuning {
    /// Relative deviation above which the interval is corrected (1%).
    pub correction_threshold: f64,

    /// Relative deviation above which a tick is reported as unhealthy (50%).
    pub alarm_threshold: f64,

    /// Fraction of the rate error applied per correction.
    pub gain: f64,

    /// Lower clamp of the interval rate, as a fraction of the target.
    pub min_rate_factor: f64,

    /// Upper clamp of the interval rate, as a multiple of the target.
    pub max_rate_factor: f64,
}

impl RegulatorTuning {
    /// Rejects tunings that would break the clamp or the classification.
    ///
    /// Thresholds and gain must be finite and non-negative; both rate factors must
    /// be finite and positive with `min_rate_factor <= max_rate_factor`.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let invalid = |field: &'static str, value: f64| -> Result<(), SchedulerError> {
            Err(SchedulerError::InvalidTuning { field, value })
        };

        for (field, value) in [
            ("correction_threshold", self.correction_threshold),
            ("alarm_threshold", self.alarm_threshold),
            ("gain", self.gain),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return invalid(field, value);
            }
        }

        for (field, value) in [
            ("min_rate_factor", self.min_rate_factor),
            ("max_rate_factor", self.max_rate_factor),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return invalid(field, value);
            }
        }

        if self.min_rate_factor > self.max_rate_factor {
            return invalid("min_rate_factor", self.min_rate_factor);
        }

        Ok(())
    }
}

impl Default for RegulatorTuning {
    fn default() -> Self {
        Self {
            correction_threshold: 0.01,
            alarm_threshold: 0.5,
            gain: 0.1,
            min_rate_factor: 0.5,
            max_rate_factor: 2.0,
        }
    }
}

/// Timing health of a single tick.
///
/// These are diagnostics, never errors.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Health {
    #[default]
    Nominal,
    /// Large deviation even though the regulator is correcting.
    SevereDegradation,
    /// Large deviation while the regulator is idle; something outside the loop
    /// (a suspended process, a debugger) is holding it back.
    SuspiciousActivity,
}

impl Health {
    pub fn is_nominal(self) -> bool {
        self == Health::Nominal
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Health::Nominal => "nominal",
            Health::SevereDegradation => "severe degradation",
            Health::SuspiciousActivity => "suspicious activity",
        })
    }
}

/// Result of one `RateRegulator::adjust` call.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Adjustment {
    /// Delay to request before the next tick.
    pub interval: Duration,
    /// Interval rate after correction and clamping.
    pub rate: f64,
    pub health: Health,
}

#[derive(Debug, Clone)]
pub struct RateRegulator {
    rate: f64,
    tuning: RegulatorTuning,
}

impl RateRegulator {
    /// Creates a regulator whose interval matches `target_rate` exactly.
    pub fn new(target_rate: f64, tuning: RegulatorTuning) -> Result<Self, SchedulerError> {
        validate_target_rate(target_rate)?;
        tuning.validate()?;
        Ok(Self {
            rate: target_rate,
            tuning,
        })
    }

    /// Puts the interval back at the nominal period of `target_rate`.
    pub fn reset(&mut self, target_rate: f64) -> Result<(), SchedulerError> {
        validate_target_rate(target_rate)?;
        self.rate = target_rate;
        Ok(())
    }

    /// Current interval rate in ticks per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn tuning(&self) -> &RegulatorTuning {
        &self.tuning
    }

    /// Current delay between ticks, rounded to whole milliseconds.
    pub fn interval(&self) -> Duration {
        rate_to_interval(self.rate)
    }

    /// Corrects the interval toward `target_rate` and classifies the tick.
    ///
    /// Depends only on the arguments and the current interval rate. With
    /// `stabilize == false` the interval is never touched.
    pub fn adjust(
        &mut self,
        measured_rate: f64,
        target_rate: f64,
        stabilize: bool,
    ) -> Result<Adjustment, SchedulerError> {
        validate_target_rate(target_rate)?;
        debug_assert!(measured_rate >= 0.0);

        let t = &self.tuning;
        let deviation = (measured_rate - target_rate).abs() / target_rate;

        if stabilize && deviation > t.correction_threshold {
            let corrected = self.rate + (target_rate - measured_rate) * t.gain;
            self.rate = corrected.clamp(
                target_rate * t.min_rate_factor,
                target_rate * t.max_rate_factor,
            );
        }

        let health = if deviation > t.alarm_threshold {
            if stabilize {
                Health::SevereDegradation
            } else {
                Health::SuspiciousActivity
            }
        } else {
            Health::Nominal
        };

        Ok(Adjustment {
            interval: self.interval(),
            rate: self.rate,
            health,
        })
    }
}

fn rate_to_interval(rate: f64) -> Duration {
    Duration::from_millis((1000.0 / rate).round() as u64)
}
