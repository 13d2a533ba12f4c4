//! Fixed-callback frame loop.
//!
//! `FrameScheduler` does not own a timer. It keeps the deadline of the next armed tick
//! and the host's event loop is expected to call [`FrameScheduler::on_tick`] once that
//! deadline passes (see `window::Runtime` for a `winit` host). Every tick re-arms the
//! next one before any hook runs, so a slow or failing hook never loses the loop.

use std::fmt;
use std::time::{Duration, Instant};

use crate::config::{validate_target_rate, LoopConfig};
use crate::error::SchedulerError;
use crate::lifecycle::{HookPresence, Hooks, PhysicsOutcome, TickCtx};
use crate::regulator::{Health, RateRegulator};
use crate::time::{ClockSource, FrameClock, FrameTime, SystemClock};

/// Guards the measured-rate division when two ticks share a timestamp.
pub const RATE_EPSILON: f64 = 1e-15;

/// Scheduler lifecycle. Transitions only move forward: `Idle -> Running -> Stopped`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Stopped => "stopped",
        })
    }
}

pub struct FrameScheduler<S, C: ClockSource = SystemClock> {
    host: S,
    hooks: Hooks<S>,
    presence: HookPresence,

    config: LoopConfig,
    regulator: RateRegulator,
    clock: C,

    lifecycle: SchedulerState,
    // Both exist only while running.
    frame_clock: Option<FrameClock>,
    next_tick: Option<Instant>,

    current_rate: f64,
    last_health: Health,
    ticks: u64,
    rate_display: bool,
}

impl<S> FrameScheduler<S, SystemClock> {
    pub fn new(config: LoopConfig, hooks: Hooks<S>, host: S) -> Result<Self, SchedulerError> {
        Self::with_clock(config, hooks, host, SystemClock)
    }
}

impl<S, C: ClockSource> FrameScheduler<S, C> {
    /// Builds an idle scheduler reading time from `clock`.
    ///
    /// Hook presence is probed here, once; each missing hook is logged.
    pub fn with_clock(
        config: LoopConfig,
        hooks: Hooks<S>,
        host: S,
        clock: C,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let regulator = RateRegulator::new(config.target_rate, config.tuning)?;

        let presence = hooks.presence();
        for name in presence.missing() {
            log::warn!("lifecycle hook `{name}` not provided; it will not be called");
        }

        log::info!(
            "frame scheduler initialized: target_rate={} stabilization={}",
            config.target_rate,
            config.stabilization
        );

        Ok(Self {
            host,
            hooks,
            presence,
            current_rate: config.target_rate,
            config,
            regulator,
            clock,
            lifecycle: SchedulerState::Idle,
            frame_clock: None,
            next_tick: None,
            last_health: Health::Nominal,
            ticks: 0,
            rate_display: false,
        })
    }

    // ── control surface ──────────────────────────────────────────────────

    /// Takes the first clock reading, runs `ready`, and arms the first tick after
    /// the bootstrap delay.
    ///
    /// A failing `ready` hook is returned as-is and leaves the scheduler `Stopped`;
    /// no tick is ever armed.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.lifecycle != SchedulerState::Idle {
            return Err(SchedulerError::invalid_state("start", self.lifecycle));
        }

        self.regulator.reset(self.config.target_rate)?;
        let now = self.clock.now();
        self.frame_clock = Some(FrameClock::start(now));

        let mut ctx = TickCtx::new(0.0, self.current_rate, 0, self.rate_display);
        if let Some(ready) = self.hooks.ready.as_mut() {
            if let Err(e) = ready(&mut self.host, &mut ctx) {
                self.shutdown();
                return Err(SchedulerError::Hook(e));
            }
        }
        self.rate_display = ctx.rate_display();

        if ctx.stop_requested() {
            log::debug!("stop requested from ready hook; no tick will run");
            self.shutdown();
            return Ok(());
        }

        self.next_tick = Some(now + self.config.bootstrap_delay);
        self.lifecycle = SchedulerState::Running;
        log::info!("frame loop started");
        Ok(())
    }

    /// Cancels the armed tick. There is no restart.
    pub fn stop(&mut self) -> Result<(), SchedulerError> {
        if self.lifecycle != SchedulerState::Running {
            return Err(SchedulerError::invalid_state("stop", self.lifecycle));
        }
        self.shutdown();
        log::debug!("frame loop stopped after {} ticks", self.ticks);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.next_tick = None;
        self.frame_clock = None;
        self.lifecycle = SchedulerState::Stopped;
    }

    /// Runs one tick: re-arm, measure, regulate, dispatch hooks.
    ///
    /// Hook errors are returned unchanged after the next tick has already been armed,
    /// so the loop keeps going if the host chooses to carry on.
    pub fn on_tick(&mut self) -> Result<(), SchedulerError> {
        if self.lifecycle != SchedulerState::Running {
            return Err(SchedulerError::invalid_state("tick", self.lifecycle));
        }

        let now = self.clock.now();
        self.next_tick = Some(now + self.regulator.interval());

        let target_rate = self.config.target_rate;
        let frame = self
            .frame_clock
            .get_or_insert_with(|| FrameClock::start(now))
            .tick(now, target_rate);
        self.ticks = self.ticks.wrapping_add(1);

        self.regulate(&frame)?;

        let mut ctx = TickCtx::new(
            frame.delta,
            self.current_rate,
            frame.frame_index,
            self.rate_display,
        );
        let dispatched = self.dispatch(frame.delta, &mut ctx);

        self.rate_display = ctx.rate_display();
        if ctx.stop_requested() {
            self.stop()?;
        }

        dispatched.map_err(SchedulerError::Hook)
    }

    fn regulate(&mut self, frame: &FrameTime) -> Result<(), SchedulerError> {
        let target_rate = self.config.target_rate;
        let measured_rate = target_rate / (frame.delta + RATE_EPSILON);

        let before = self.regulator.interval();
        let adj = self
            .regulator
            .adjust(measured_rate, target_rate, self.config.stabilization)?;

        match adj.health {
            Health::Nominal => {}
            Health::SevereDegradation => log::warn!(
                "severe performance drop: measured {measured_rate:.1} ticks/s against target {target_rate}"
            ),
            Health::SuspiciousActivity => log::warn!(
                "suspicious activity while rate stabilization is off: measured {measured_rate:.1} ticks/s against target {target_rate}"
            ),
        }

        if adj.interval != before {
            log::debug!("tick interval {before:?} -> {:?}", adj.interval);
        }

        self.current_rate = measured_rate;
        self.last_health = adj.health;
        Ok(())
    }

    fn dispatch(&mut self, delta: f64, ctx: &mut TickCtx) -> anyhow::Result<()> {
        let hooks = &mut self.hooks;
        let host = &mut self.host;

        if let Some(process) = hooks.process.as_mut() {
            process(host, ctx)?;
        }

        let outcome = match hooks.physics_process.as_mut() {
            Some(physics) => physics(host, delta, ctx)?,
            None => PhysicsOutcome::NotReported,
        };

        if outcome.wants_draw() {
            if let Some(draw) = hooks.draw.as_mut() {
                draw(host, ctx)?;
            }
        }

        Ok(())
    }

    // ── timer integration ─────────────────────────────────────────────────

    /// Deadline of the armed tick, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Whether the armed tick should fire at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_tick.is_some_and(|deadline| now >= deadline)
    }

    // ── observers ─────────────────────────────────────────────────────────

    pub fn lifecycle(&self) -> SchedulerState {
        self.lifecycle
    }

    /// Measured rate of the most recent tick, in ticks per second.
    ///
    /// Equals the target until the first tick runs.
    pub fn current_rate(&self) -> f64 {
        self.current_rate
    }

    /// Delay the next re-arm will request.
    pub fn interval(&self) -> Duration {
        self.regulator.interval()
    }

    /// Interval rate the regulator is currently steering with.
    pub fn regulator_rate(&self) -> f64 {
        self.regulator.rate()
    }

    pub fn health(&self) -> Health {
        self.last_health
    }

    pub fn target_rate(&self) -> f64 {
        self.config.target_rate
    }

    pub fn stabilization(&self) -> bool {
        self.config.stabilization
    }

    /// Whether the host should show `current_rate` on screen.
    pub fn rate_display(&self) -> bool {
        self.rate_display
    }

    pub fn presence(&self) -> HookPresence {
        self.presence
    }

    /// Number of ticks dispatched so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn state(&self) -> &S {
        &self.host
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.host
    }

    pub fn into_state(self) -> S {
        self.host
    }

    // ── runtime configuration ─────────────────────────────────────────────

    /// Changes the target rate. Takes effect on the next tick.
    pub fn set_target_rate(&mut self, rate: f64) -> Result<(), SchedulerError> {
        validate_target_rate(rate)?;
        self.config.target_rate = rate;
        Ok(())
    }

    pub fn set_stabilization(&mut self, enabled: bool) {
        self.config.stabilization = enabled;
    }

    pub fn set_rate_display(&mut self, on: bool) {
        self.rate_display = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    type Log = Vec<&'static str>;

    // `Duration` truncates to whole nanoseconds, so 1/30 s is not exact.
    const RATE_TOLERANCE: f64 = 1e-4;

    fn frame_secs(rate: f64) -> Duration {
        Duration::from_secs_f64(1.0 / rate)
    }

    fn full_hooks(outcome: PhysicsOutcome) -> Hooks<Log> {
        Hooks::new()
            .ready(|log: &mut Log, _| {
                log.push("ready");
                Ok(())
            })
            .process(|log, _| {
                log.push("process");
                Ok(())
            })
            .physics_process(move |log, _, _| {
                log.push("physics");
                Ok(outcome)
            })
            .draw(|log, _| {
                log.push("draw");
                Ok(())
            })
    }

    fn scheduler(
        config: LoopConfig,
        hooks: Hooks<Log>,
    ) -> (FrameScheduler<Log, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let s = FrameScheduler::with_clock(config, hooks, Vec::new(), clock.clone()).unwrap();
        (s, clock)
    }

    // ── state machine ─────────────────────────────────────────────────────

    #[test]
    fn start_runs_ready_once_and_arms_bootstrap_tick() {
        let (mut s, clock) = scheduler(LoopConfig::default(), full_hooks(PhysicsOutcome::Changed));
        let t0 = clock.now();

        s.start().unwrap();

        assert_eq!(s.lifecycle(), SchedulerState::Running);
        assert_eq!(s.state(), &["ready"]);
        assert_eq!(s.next_deadline(), Some(t0 + Duration::from_millis(10)));
        assert!(!s.is_due(t0));
        assert!(s.is_due(t0 + Duration::from_millis(10)));
    }

    #[test]
    fn stop_from_idle_is_invalid() {
        let (mut s, _) = scheduler(LoopConfig::default(), Hooks::new());
        let err = s.stop().unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InvalidState { op: "stop", state: SchedulerState::Idle }
        ));
    }

    #[test]
    fn no_restart_after_stop() {
        let (mut s, _) = scheduler(LoopConfig::default(), Hooks::new());
        s.start().unwrap();
        s.stop().unwrap();

        assert_eq!(s.lifecycle(), SchedulerState::Stopped);
        assert_eq!(s.next_deadline(), None);
        assert!(matches!(
            s.start().unwrap_err(),
            SchedulerError::InvalidState { state: SchedulerState::Stopped, .. }
        ));
        assert!(matches!(s.stop().unwrap_err(), SchedulerError::InvalidState { .. }));
    }

    #[test]
    fn double_start_is_invalid() {
        let (mut s, _) = scheduler(LoopConfig::default(), Hooks::new());
        s.start().unwrap();
        assert!(matches!(
            s.start().unwrap_err(),
            SchedulerError::InvalidState { state: SchedulerState::Running, .. }
        ));
    }

    #[test]
    fn tick_before_start_is_invalid() {
        let (mut s, _) = scheduler(LoopConfig::default(), full_hooks(PhysicsOutcome::Changed));
        assert!(matches!(s.on_tick().unwrap_err(), SchedulerError::InvalidState { .. }));
        assert!(s.state().is_empty());
    }

    #[test]
    fn invalid_target_rate_is_rejected_at_construction() {
        let clock = ManualClock::new();
        let result = FrameScheduler::with_clock(
            LoopConfig::new().target_rate(0.0),
            Hooks::<Log>::new(),
            Vec::new(),
            clock,
        );
        assert!(matches!(result, Err(SchedulerError::InvalidConfiguration { .. })));
    }

    #[test]
    fn inverted_tuning_is_rejected_before_any_tick() {
        let config = LoopConfig::new().tuning(crate::regulator::RegulatorTuning {
            min_rate_factor: 3.0,
            ..Default::default()
        });
        let result =
            FrameScheduler::with_clock(config, Hooks::<Log>::new(), Vec::new(), ManualClock::new());
        assert!(matches!(result, Err(SchedulerError::InvalidTuning { .. })));
    }

    #[test]
    fn failing_ready_aborts_start() {
        let hooks = Hooks::new().ready(|_: &mut Log, _| Err(anyhow::anyhow!("assets missing")));
        let (mut s, _) = scheduler(LoopConfig::default(), hooks);

        let err = s.start().unwrap_err();
        assert_eq!(err.to_string(), "assets missing");
        assert!(err.as_hook().is_some());
        assert_eq!(s.next_deadline(), None);
        assert_eq!(s.lifecycle(), SchedulerState::Stopped);
    }

    // ── dispatch ──────────────────────────────────────────────────────────

    #[test]
    fn hooks_run_in_fixed_order() {
        let (mut s, clock) = scheduler(LoopConfig::default(), full_hooks(PhysicsOutcome::Changed));
        s.start().unwrap();

        for _ in 0..3 {
            clock.advance(frame_secs(30.0));
            s.on_tick().unwrap();
        }

        assert_eq!(
            s.state(),
            &[
                "ready", "process", "physics", "draw", "process", "physics", "draw", "process",
                "physics", "draw",
            ]
        );
        assert_eq!(s.ticks(), 3);
    }

    #[test]
    fn unchanged_physics_skips_draw() {
        let (mut s, clock) = scheduler(LoopConfig::default(), full_hooks(PhysicsOutcome::Unchanged));
        s.start().unwrap();
        clock.advance(frame_secs(30.0));
        s.on_tick().unwrap();

        assert_eq!(s.state(), &["ready", "process", "physics"]);
    }

    #[test]
    fn unreported_physics_still_draws() {
        let (mut s, clock) =
            scheduler(LoopConfig::default(), full_hooks(PhysicsOutcome::NotReported));
        s.start().unwrap();
        clock.advance(frame_secs(30.0));
        s.on_tick().unwrap();

        assert_eq!(s.state().last(), Some(&"draw"));
    }

    #[test]
    fn missing_physics_still_draws() {
        let hooks = Hooks::new().draw(|log: &mut Log, _| {
            log.push("draw");
            Ok(())
        });
        let (mut s, clock) = scheduler(LoopConfig::default(), hooks);
        assert!(!s.presence().physics_process);

        s.start().unwrap();
        clock.advance(frame_secs(30.0));
        s.on_tick().unwrap();

        assert_eq!(s.state(), &["draw"]);
    }

    #[test]
    fn physics_receives_normalized_delta() {
        let hooks = Hooks::new().physics_process(|deltas: &mut Vec<f64>, delta, ctx| {
            assert_eq!(ctx.delta, delta);
            deltas.push(delta);
            Ok(PhysicsOutcome::Changed)
        });
        let clock = ManualClock::new();
        let mut s =
            FrameScheduler::with_clock(LoopConfig::new().target_rate(20.0), hooks, Vec::new(), clock.clone())
                .unwrap();

        s.start().unwrap();
        clock.advance(Duration::from_millis(100));
        s.on_tick().unwrap();

        assert!((s.state()[0] - 2.0).abs() < 1e-9);
    }

    // ── failure isolation ─────────────────────────────────────────────────

    #[test]
    fn failing_hook_propagates_but_next_tick_stays_armed() {
        let hooks = Hooks::new()
            .process(|log: &mut Log, _| {
                log.push("process");
                Ok(())
            })
            .physics_process(|_, _, _| Err(anyhow::anyhow!("physics blew up")))
            .draw(|log, _| {
                log.push("draw");
                Ok(())
            });
        let (mut s, clock) = scheduler(LoopConfig::default(), hooks);
        s.start().unwrap();

        clock.advance(frame_secs(30.0));
        let armed_at = clock.now();
        let err = s.on_tick().unwrap_err();

        assert_eq!(err.to_string(), "physics blew up");
        assert_eq!(s.state(), &["process"]);
        assert_eq!(s.lifecycle(), SchedulerState::Running);
        assert_eq!(s.next_deadline(), Some(armed_at + Duration::from_millis(33)));

        clock.advance(frame_secs(30.0));
        assert!(s.on_tick().is_err());
        assert_eq!(s.state(), &["process", "process"]);
    }

    // ── regulation ────────────────────────────────────────────────────────

    #[test]
    fn on_time_tick_is_nominal() {
        let (mut s, clock) = scheduler(LoopConfig::default(), Hooks::new());
        s.start().unwrap();

        clock.advance(frame_secs(30.0));
        s.on_tick().unwrap();

        assert_eq!(s.health(), Health::Nominal);
        assert!((s.current_rate() - 30.0).abs() < RATE_TOLERANCE);
        assert_eq!(s.interval(), Duration::from_millis(33));
    }

    #[test]
    fn stalled_tick_is_severe_and_corrected() {
        let (mut s, clock) = scheduler(LoopConfig::default(), Hooks::new());
        s.start().unwrap();

        clock.advance(Duration::from_millis(100));
        s.on_tick().unwrap();

        assert_eq!(s.health(), Health::SevereDegradation);
        assert!((s.current_rate() - 10.0).abs() < RATE_TOLERANCE);
        assert!(s.regulator_rate() >= 15.0);
        assert_eq!(s.interval(), Duration::from_millis(31));
    }

    #[test]
    fn stalled_tick_without_stabilization_is_suspicious() {
        let (mut s, clock) = scheduler(LoopConfig::new().stabilization(false), Hooks::new());
        s.start().unwrap();

        clock.advance(Duration::from_millis(100));
        s.on_tick().unwrap();

        assert_eq!(s.health(), Health::SuspiciousActivity);
        assert_eq!(s.interval(), Duration::from_millis(33));
    }

    #[test]
    fn rearm_uses_interval_from_before_adjustment() {
        let (mut s, clock) = scheduler(LoopConfig::default(), Hooks::new());
        s.start().unwrap();

        clock.advance(Duration::from_millis(100));
        let now = clock.now();
        s.on_tick().unwrap();

        assert_eq!(s.next_deadline(), Some(now + Duration::from_millis(33)));

        clock.advance(Duration::from_millis(33));
        let now = clock.now();
        s.on_tick().unwrap();
        assert_eq!(s.next_deadline(), Some(now + Duration::from_millis(31)));
    }

    #[test]
    fn zero_elapsed_tick_does_not_divide_by_zero() {
        let (mut s, _) = scheduler(LoopConfig::default(), Hooks::new());
        s.start().unwrap();
        s.on_tick().unwrap();

        assert!(s.current_rate().is_finite());
        assert_eq!(s.regulator_rate(), 15.0);
    }

    #[test]
    fn target_rate_can_change_while_running() {
        let (mut s, clock) = scheduler(LoopConfig::default(), Hooks::new());
        s.start().unwrap();

        s.set_target_rate(20.0).unwrap();
        assert!(s.set_target_rate(-1.0).is_err());
        assert_eq!(s.target_rate(), 20.0);

        clock.advance(Duration::from_millis(50));
        s.on_tick().unwrap();
        assert!((s.current_rate() - 20.0).abs() < RATE_TOLERANCE);
    }

    // ── stop from inside a hook ───────────────────────────────────────────

    #[test]
    fn hook_can_stop_the_loop() {
        let hooks = Hooks::new()
            .process(|log: &mut Log, ctx| {
                log.push("process");
                if ctx.tick_index == 1 {
                    ctx.request_stop();
                }
                Ok(())
            })
            .draw(|log, _| {
                log.push("draw");
                Ok(())
            });
        let (mut s, clock) = scheduler(LoopConfig::default(), hooks);
        s.start().unwrap();

        clock.advance(frame_secs(30.0));
        s.on_tick().unwrap();
        clock.advance(frame_secs(30.0));
        s.on_tick().unwrap();

        // The tick that asked to stop still finishes dispatching.
        assert_eq!(s.state(), &["process", "draw", "process", "draw"]);
        assert_eq!(s.lifecycle(), SchedulerState::Stopped);
        assert_eq!(s.next_deadline(), None);
        assert!(s.on_tick().is_err());
    }

    #[test]
    fn stop_request_is_honoured_even_when_a_hook_fails() {
        let hooks = Hooks::new().process(|_: &mut Log, ctx| {
            ctx.request_stop();
            Err(anyhow::anyhow!("gave up"))
        });
        let (mut s, clock) = scheduler(LoopConfig::default(), hooks);
        s.start().unwrap();

        clock.advance(frame_secs(30.0));
        assert!(s.on_tick().unwrap_err().as_hook().is_some());
        assert_eq!(s.lifecycle(), SchedulerState::Stopped);
    }

    // ── rate display ──────────────────────────────────────────────────────

    #[test]
    fn hooks_toggle_rate_display_while_running() {
        let hooks = Hooks::new()
            .ready(|_: &mut Log, ctx| {
                ctx.set_rate_display(true);
                Ok(())
            })
            .process(|_, ctx| {
                if ctx.tick_index == 1 {
                    assert!(ctx.rate_display());
                    ctx.set_rate_display(false);
                }
                Ok(())
            });
        let (mut s, clock) = scheduler(LoopConfig::default(), hooks);
        assert!(!s.rate_display());

        s.start().unwrap();
        assert!(s.rate_display());

        clock.advance(frame_secs(30.0));
        s.on_tick().unwrap();
        assert!(s.rate_display());

        clock.advance(frame_secs(30.0));
        s.on_tick().unwrap();
        assert!(!s.rate_display());
    }

    #[test]
    fn host_setting_reaches_hooks() {
        let hooks = Hooks::new().draw(|seen: &mut Vec<bool>, ctx| {
            seen.push(ctx.rate_display());
            Ok(())
        });
        let clock = ManualClock::new();
        let mut s =
            FrameScheduler::with_clock(LoopConfig::default(), hooks, Vec::new(), clock.clone())
                .unwrap();

        s.set_rate_display(true);
        s.start().unwrap();
        clock.advance(frame_secs(30.0));
        s.on_tick().unwrap();

        assert_eq!(s.state(), &[true]);
    }

    #[test]
    fn ready_can_stop_before_first_tick() {
        let hooks = Hooks::new().ready(|_: &mut Log, ctx| {
            ctx.request_stop();
            Ok(())
        });
        let (mut s, _) = scheduler(LoopConfig::default(), hooks);

        s.start().unwrap();
        assert_eq!(s.lifecycle(), SchedulerState::Stopped);
        assert_eq!(s.next_deadline(), None);
    }
}
