//! Window host.
//!
//! Owns the `winit` EventLoop and Window, and uses the event loop's timer
//! (`ControlFlow::WaitUntil`) to fire the scheduler's armed ticks.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
