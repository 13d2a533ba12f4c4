use thiserror::Error;

use crate::scheduler::SchedulerState;

/// Errors surfaced by the scheduler.
///
/// Everything except `Hook` is the scheduler's own failure.
/// `Hook` carries whatever a lifecycle hook returned, untouched.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `start`/`stop`/`on_tick` called from the wrong lifecycle state.
    #[error("cannot {op} a scheduler that is {state}")]
    InvalidState {
        op: &'static str,
        state: SchedulerState,
    },

    /// Target rate is zero, negative or not a number.
    #[error("target rate must be a positive, finite number of ticks per second (got {target_rate})")]
    InvalidConfiguration { target_rate: f64 },

    /// A `RegulatorTuning` field would make the controller misbehave.
    #[error("regulator tuning `{field}` is out of range (got {value})")]
    InvalidTuning { field: &'static str, value: f64 },

    #[error(transparent)]
    Hook(#[from] anyhow::Error),
}

impl SchedulerError {
    pub(crate) fn invalid_state(op: &'static str, state: SchedulerState) -> Self {
        Self::InvalidState { op, state }
    }

    /// Returns the hook error if this is a propagated hook failure.
    pub fn as_hook(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Hook(e) => Some(e),
            _ => None,
        }
    }
}
