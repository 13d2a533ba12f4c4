use std::time::Instant;

use anyhow::{Context, Result};

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::error::SchedulerError;
use crate::scheduler::{FrameScheduler, SchedulerState};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Initial state of the rate display: append the measured rate to the window
    /// title after every tick. Hooks can flip it with `TickCtx::set_rate_display`.
    pub show_rate_in_title: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "metronome".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            show_rate_in_title: false,
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens a window, starts `scheduler` and fires its ticks until the window is
    /// closed or a hook requests a stop. Returns the host state afterwards.
    ///
    /// A failing `ready` hook ends the loop and is returned. Failing tick hooks are
    /// logged and the loop carries on with the tick that was already armed.
    pub fn run<S>(config: RuntimeConfig, scheduler: FrameScheduler<S>) -> Result<S> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, scheduler);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        if let Some(err) = state.fatal.take() {
            return Err(err);
        }

        Ok(state.scheduler.into_state())
    }
}

struct AppState<S> {
    config: RuntimeConfig,
    scheduler: FrameScheduler<S>,
    window: Option<Window>,
    // Whether the title currently carries the rate suffix.
    title_has_rate: bool,
    fatal: Option<anyhow::Error>,
}

impl<S> AppState<S> {
    fn new(config: RuntimeConfig, mut scheduler: FrameScheduler<S>) -> Self {
        scheduler.set_rate_display(config.show_rate_in_title);
        Self {
            config,
            scheduler,
            window: None,
            title_has_rate: false,
            fatal: None,
        }
    }

    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;
        self.window = Some(window);

        self.scheduler
            .start()
            .context("frame loop failed to start")?;
        Ok(())
    }

    fn tick(&mut self) {
        match self.scheduler.on_tick() {
            Ok(()) => {}
            Err(SchedulerError::Hook(e)) => log::error!("frame hook failed: {e:#}"),
            Err(e) => log::error!("tick rejected: {e}"),
        }

        self.refresh_title();
    }

    fn refresh_title(&mut self) {
        let Some(window) = &self.window else {
            return;
        };

        if self.scheduler.rate_display() {
            window.set_title(&rate_title(&self.config.title, self.scheduler.current_rate()));
            self.title_has_rate = true;
        } else if self.title_has_rate {
            window.set_title(&self.config.title);
            self.title_has_rate = false;
        }
    }

    fn close(&mut self, event_loop: &ActiveEventLoop) {
        if self.scheduler.lifecycle() == SchedulerState::Running {
            if let Err(e) = self.scheduler.stop() {
                log::error!("failed to stop frame loop: {e}");
            }
        }
        self.window = None;
        event_loop.exit();
    }
}

fn rate_title(title: &str, rate: f64) -> String {
    format!("{title}. FPS: {}", rate.round())
}

impl<S> ApplicationHandler for AppState<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.open(event_loop) {
            log::error!("{e:#}");
            self.fatal = Some(e);
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        match self.scheduler.lifecycle() {
            // Window not created yet; nothing is armed.
            SchedulerState::Idle => return,
            SchedulerState::Stopped => {
                self.close(event_loop);
                return;
            }
            SchedulerState::Running => {}
        }

        if self.scheduler.is_due(Instant::now()) {
            self.tick();
        }

        match self.scheduler.next_deadline() {
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            // A hook stopped the loop during this tick.
            None => self.close(event_loop),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let WindowEvent::CloseRequested = event {
            self.close(event_loop);
        }
    }
}
