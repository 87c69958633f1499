use std::{fmt::Display, sync::Arc};

use prism_core::{Time, WindowConfig};
use thiserror::Error;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

mod input;

pub use input::Input;

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Os(#[from] winit::error::OsError),
    #[error("application stopped: {0}")]
    Handler(String),
}

/// What the runner drives. Any error ends the event loop.
pub trait AppHandler {
    type Error: Display;

    /// Called once, when the window first exists.
    fn init(&mut self, window: Arc<Window>) -> Result<(), Self::Error>;

    fn resize(&mut self, width: u32, height: u32) -> Result<(), Self::Error>;

    /// One frame: read input, draw.
    fn update(&mut self, input: &Input, time: &Time) -> Result<(), Self::Error>;
}

struct Runner<H> {
    handler: H,
    config: WindowConfig,
    window: Option<Arc<Window>>,
    input: Input,
    time: Time,
    failure: Option<WindowError>,
}

impl<H: AppHandler> Runner<H> {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: WindowError) {
        log::error!("{err}");
        self.failure = Some(err);
        event_loop.exit();
    }

    fn handler_failed(&mut self, event_loop: &ActiveEventLoop, err: H::Error) {
        self.fail(event_loop, WindowError::Handler(err.to_string()));
    }
}

impl<H: AppHandler> ApplicationHandler for Runner<H> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => return self.fail(event_loop, err.into()),
        };
        self.window = Some(window.clone());

        if let Err(err) = self.handler.init(window) {
            self.handler_failed(event_loop, err);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => match state {
                ElementState::Pressed => self.input.press(code),
                ElementState::Released => self.input.release(code),
            },
            WindowEvent::Resized(size) => {
                if let Err(err) = self.handler.resize(size.width, size.height) {
                    self.handler_failed(event_loop, err);
                }
            }
            WindowEvent::CloseRequested => {
                log::info!("Close requested, stopping");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                self.time.update();
                if let Err(err) = self.handler.update(&self.input, &self.time) {
                    return self.handler_failed(event_loop, err);
                }
                self.input.end_frame();
            }
            _ => (),
        }
    }
}

/// Opens the window and runs `handler` until the window closes or the handler fails.
pub fn run_app<H: AppHandler>(config: &WindowConfig, handler: H) -> Result<(), WindowError> {
    let event_loop = EventLoop::new()?;

    // keep rendering even when the OS has no events for us
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = Runner {
        handler,
        config: config.clone(),
        window: None,
        input: Input::default(),
        time: Time::default(),
        failure: None,
    };
    event_loop.run_app(&mut runner)?;

    match runner.failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
