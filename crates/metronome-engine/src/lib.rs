//! Metronome engine crate.
//!
//! A fixed-callback frame loop: a re-arming timer drives the `process`,
//! `physics_process` and `draw` hooks at a target rate while a rate regulator
//! nudges the tick interval to absorb timing drift.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod regulator;
pub mod scheduler;
pub mod time;

pub mod logging;
pub mod window;

pub use config::LoopConfig;
pub use error::SchedulerError;
pub use lifecycle::{HookPresence, Hooks, PhysicsOutcome, TickCtx};
pub use regulator::{Health, RateRegulator, RegulatorTuning};
pub use scheduler::{FrameScheduler, SchedulerState};
