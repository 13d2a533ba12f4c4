use anyhow::Result;
use winit::dpi::LogicalSize;

use metronome_engine::logging::{init_logging, LoggingConfig};
use metronome_engine::window::{Runtime, RuntimeConfig};
use metronome_engine::{FrameScheduler, Hooks, LoopConfig, PhysicsOutcome};

/// A dot bouncing between two walls. Stands in for whatever a real host simulates.
#[derive(Debug, Default)]
struct Bouncer {
    x: f64,
    velocity: f64,
    processed: u64,
    drawn: u64,
    resting: bool,
}

const WALL: f64 = 100.0;
/// Units per target-rate frame.
const SPEED: f64 = 2.5;
/// Velocity kept after hitting a wall.
const RESTITUTION: f64 = 0.8;

impl Bouncer {
    /// Moves the dot; returns whether it moved.
    fn step(&mut self, delta: f64) -> bool {
        if self.resting {
            return false;
        }

        self.x += self.velocity * delta;
        if self.x >= WALL || self.x <= 0.0 {
            self.x = self.x.clamp(0.0, WALL);
            self.velocity = -self.velocity * RESTITUTION;
        }

        if self.velocity.abs() < 0.05 {
            self.resting = true;
            log::info!("dot came to rest at x={:.1}", self.x);
        }
        true
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let hooks = Hooks::new()
        .ready(|dot: &mut Bouncer, _| {
            dot.velocity = SPEED;
            log::info!("demo ready; press the close button to quit");
            Ok(())
        })
        .process(|dot, _| {
            dot.processed += 1;
            Ok(())
        })
        // A resting dot reports `Unchanged`, which skips redundant draws.
        .physics_process(|dot, delta, ctx| {
            let moved = dot.step(delta);
            if dot.resting && ctx.rate_display() {
                ctx.set_rate_display(false);
            }
            Ok(PhysicsOutcome::from(moved))
        })
        .draw(|dot, ctx| {
            dot.drawn += 1;
            if ctx.tick_index % 30 == 0 {
                log::debug!("x={:.1} rate={:.1}", dot.x, ctx.current_rate);
            }
            Ok(())
        });

    let scheduler = FrameScheduler::new(
        LoopConfig::new().target_rate(30.0),
        hooks,
        Bouncer::default(),
    )?;

    let runtime = RuntimeConfig {
        title: "Metronome".to_string(),
        initial_size: LogicalSize::new(480.0, 240.0),
        show_rate_in_title: true,
    };

    let dot = Runtime::run(runtime, scheduler)?;
    log::info!(
        "processed {} ticks, drew {} frames",
        dot.processed,
        dot.drawn
    );
    Ok(())
}
