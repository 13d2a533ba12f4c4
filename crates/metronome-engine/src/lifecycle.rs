//! Host lifecycle hooks.
//!
//! A host plugs into the frame loop by registering up to four optional hooks on a
//! [`Hooks`] record. Which hooks exist is decided once, when the scheduler is built;
//! absent hooks are simply never called.

use anyhow::Result;

/// Per-call context handed to every hook.
///
/// Stop requests and rate-display toggles are buffered and applied after the current
/// hook sequence returns.
#[derive(Debug, Clone)]
pub struct TickCtx {
    /// Elapsed time since the previous tick, in target-rate frames.
    pub delta: f64,
    /// Most recent measured rate in ticks per second.
    pub current_rate: f64,
    /// Index of the tick being dispatched. `ready` sees 0, as does the first tick.
    pub tick_index: u64,
    stop_requested: bool,
    rate_display: bool,
}

impl TickCtx {
    pub(crate) fn new(delta: f64, current_rate: f64, tick_index: u64, rate_display: bool) -> Self {
        Self {
            delta,
            current_rate,
            tick_index,
            stop_requested: false,
            rate_display,
        }
    }

    /// Asks the scheduler to stop once this tick finishes dispatching.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Turns the on-screen rate display on or off from the next tick on.
    pub fn set_rate_display(&mut self, on: bool) {
        self.rate_display = on;
    }

    /// Whether the rate display will be on after this tick.
    pub fn rate_display(&self) -> bool {
        self.rate_display
    }
}

/// What the physics hook reports about the tick.
///
/// `draw` is skipped only for `Unchanged`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum PhysicsOutcome {
    Changed,
    Unchanged,
    #[default]
    NotReported,
}

impl PhysicsOutcome {
    pub fn wants_draw(self) -> bool {
        match self {
            PhysicsOutcome::Changed | PhysicsOutcome::NotReported => true,
            PhysicsOutcome::Unchanged => false,
        }
    }
}

impl From<bool> for PhysicsOutcome {
    fn from(changed: bool) -> Self {
        if changed {
            PhysicsOutcome::Changed
        } else {
            PhysicsOutcome::Unchanged
        }
    }
}

impl From<Option<bool>> for PhysicsOutcome {
    fn from(changed: Option<bool>) -> Self {
        changed.map_or(PhysicsOutcome::NotReported, PhysicsOutcome::from)
    }
}

pub(crate) type StepHook<S> = Box<dyn FnMut(&mut S, &mut TickCtx) -> Result<()>>;
pub(crate) type PhysicsHook<S> = Box<dyn FnMut(&mut S, f64, &mut TickCtx) -> Result<PhysicsOutcome>>;

/// Optional lifecycle callbacks over host state `S`.
///
/// ```rust,ignore
/// let hooks = Hooks::new()
///     .ready(|world: &mut World, _| world.load())
///     .physics_process(|world, delta, _| Ok(world.step(delta).into()))
///     .draw(|world, _| world.present());
/// ```
pub struct Hooks<S> {
    pub(crate) ready: Option<StepHook<S>>,
    pub(crate) process: Option<StepHook<S>>,
    pub(crate) physics_process: Option<PhysicsHook<S>>,
    pub(crate) draw: Option<StepHook<S>>,
}

impl<S> Hooks<S> {
    pub fn new() -> Self {
        Self {
            ready: None,
            process: None,
            physics_process: None,
            draw: None,
        }
    }

    /// Runs once in `start`, before the first tick is armed.
    pub fn ready<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut S, &mut TickCtx) -> Result<()> + 'static,
    {
        self.ready = Some(Box::new(f));
        self
    }

    /// First hook of every tick.
    pub fn process<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut S, &mut TickCtx) -> Result<()> + 'static,
    {
        self.process = Some(Box::new(f));
        self
    }

    /// Second hook of every tick. Receives the frame delta.
    pub fn physics_process<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut S, f64, &mut TickCtx) -> Result<PhysicsOutcome> + 'static,
    {
        self.physics_process = Some(Box::new(f));
        self
    }

    /// Last hook of every tick, unless physics reported `Unchanged`.
    pub fn draw<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut S, &mut TickCtx) -> Result<()> + 'static,
    {
        self.draw = Some(Box::new(f));
        self
    }

    pub fn presence(&self) -> HookPresence {
        HookPresence {
            ready: self.ready.is_some(),
            process: self.process.is_some(),
            physics_process: self.physics_process.is_some(),
            draw: self.draw.is_some(),
        }
    }
}

impl<S> Default for Hooks<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Which hooks a host registered. Fixed for the lifetime of a scheduler.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct HookPresence {
    pub ready: bool,
    pub process: bool,
    pub physics_process: bool,
    pub draw: bool,
}

impl HookPresence {
    /// Names of the hooks that were not registered, in dispatch order.
    pub fn missing(&self) -> impl Iterator<Item = &'static str> {
        [
            ("ready", self.ready),
            ("process", self.process),
            ("physics_process", self.physics_process),
            ("draw", self.draw),
        ]
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name)
    }
}
