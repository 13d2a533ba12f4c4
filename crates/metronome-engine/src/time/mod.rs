//! Time subsystem.
//!
//! Provides monotonic clock sources and frame timing without coupling to the runtime.
//! Intended usage:
//! - one `ClockSource` per scheduler (`SystemClock` in production, `ManualClock` when
//!   the host wants to drive time itself)
//! - one `FrameClock` per running loop, fed a clock reading once per tick

mod clock;
mod frame_clock;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use frame_clock::{FrameClock, FrameTime};
