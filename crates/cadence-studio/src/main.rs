use std::cell::Cell;
use std::rc::Rc;

use anyhow::{Context, Result};
use winit::dpi::LogicalSize;

use cadence_engine::default_scheduler;
use cadence_engine::logging::{init_logging, LoggingConfig};
use cadence_engine::scheduler::{Diagnostic, FrameScheduler, SchedulerConfig};
use cadence_engine::window::{Runtime, RuntimeConfig, WinitHost};

/// Report cadence, in ticks.
const REPORT_EVERY: u64 = 120;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let fps = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<f64>()
            .with_context(|| format!("invalid target fps {arg:?}"))?,
        None => 60.0,
    };

    let host = WinitHost::new();
    let scheduler = FrameScheduler::new(
        host.bindings(),
        SchedulerConfig { max_fps: fps.max(60.0), ..SchedulerConfig::default() }.follow_visibility(),
    );
    scheduler.set_rate(fps);
    scheduler.set_diagnostic_sink(Some(|d: &Diagnostic| {
        log::trace!("diagnostic: {d}");
    }));

    // ── listeners ─────────────────────────────────────────────────────────

    let ticks = Rc::new(Cell::new(0u64));
    let simulated = Rc::new(Cell::new(0.0f64));
    {
        let ticks = Rc::clone(&ticks);
        let simulated = Rc::clone(&simulated);
        scheduler.add_tick(move |elapsed| {
            ticks.set(ticks.get() + 1);
            simulated.set(simulated.get() + elapsed);

            if ticks.get() % REPORT_EVERY == 0 {
                default_scheduler::with(|s| {
                    log::info!(
                        "tick {:>6}  target {:>5.1} fps  actual {:>6.1} fps  simulated {:>8.2}s",
                        ticks.get(),
                        s.target_fps(),
                        s.actual_fps(),
                        simulated.get(),
                    );
                });
            }
        });
    }
    scheduler.on_pause(|| log::info!("paused"));
    scheduler.on_resume(|| log::info!("resumed"));

    default_scheduler::install(scheduler.clone());
    scheduler.start();

    let result = Runtime::run(
        RuntimeConfig {
            title: format!("cadence studio ({fps} fps)"),
            initial_size: LogicalSize::new(640.0, 360.0),
            hide_on_blur: false,
        },
        &host,
    );

    scheduler.dispose();
    default_scheduler::uninstall();
    log::info!("{} ticks, {:.2}s simulated", ticks.get(), simulated.get());

    result
}
