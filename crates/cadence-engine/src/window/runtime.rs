use std::rc::Rc;
use std::time::Instant;

use anyhow::{Context, Result};

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use super::host::WinitHost;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Treat losing focus as hidden, on top of occlusion and suspension.
    pub hide_on_blur: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "cadence".to_string(),
            initial_size: LogicalSize::new(960.0, 540.0),
            hide_on_blur: false,
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window and runs the event loop until it is closed.
    ///
    /// Schedulers built from `host.bindings()` are driven from this loop.
    pub fn run(config: RuntimeConfig, host: &WinitHost) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, host.clone());

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        host.detach_window();
        Ok(())
    }
}

struct AppState {
    config: RuntimeConfig,
    host: WinitHost,
    window: Option<Rc<Window>>,
    exit_requested: bool,
}

impl AppState {
    fn new(config: RuntimeConfig, host: WinitHost) -> Self {
        Self { config, host, window: None, exit_requested: false }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let window = Rc::new(window);
        self.host.attach_window(Rc::clone(&window));
        self.window = Some(window);
        Ok(())
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        self.host.detach_window();
        self.window = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window(event_loop) {
                log::error!("failed to create initial window: {e:#}");
                self.request_exit(event_loop);
                return;
            }
        }
        self.host.set_hidden(false);
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.host.set_hidden(true);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            return;
        }
        if self.window.as_ref().map(|w| w.id()) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("close requested");
                self.request_exit(event_loop);
            }
            WindowEvent::Occluded(occluded) => self.host.set_hidden(occluded),
            WindowEvent::Focused(focused) if self.config.hide_on_blur => {
                self.host.set_hidden(!focused);
            }
            WindowEvent::RedrawRequested => {
                self.host.deliver_frames();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        self.host.fire_due_timers(Instant::now());

        match self.host.next_deadline() {
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }
}
