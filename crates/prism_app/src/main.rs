use std::{process::ExitCode, sync::Arc};

use prism_core::{EngineConfig, Time};
use prism_renderer::{RenderError, Renderer};
use prism_window::{AppHandler, Input, run_app};
use winit::window::Window;

mod controls;

use controls::Command;

/// Frames between frame time reports.
const REPORT_INTERVAL: u64 = 300;

struct ForwardPlusApp {
    config: EngineConfig,
    renderer: Option<Renderer>,
    frame_time_acc: f32,
}

impl ForwardPlusApp {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            renderer: None,
            frame_time_acc: 0.0,
        }
    }
}

impl AppHandler for ForwardPlusApp {
    type Error = RenderError;

    fn init(&mut self, window: Arc<Window>) -> Result<(), RenderError> {
        self.renderer = Some(Renderer::new(window, &self.config)?);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        match &mut self.renderer {
            Some(renderer) => renderer.resize(width, height),
            None => Ok(()),
        }
    }

    fn update(&mut self, input: &Input, time: &Time) -> Result<(), RenderError> {
        let Some(renderer) = &mut self.renderer else {
            return Ok(());
        };

        for command in controls::commands(input) {
            match command {
                Command::ToggleMode => {
                    renderer.toggle_mode();
                }
                Command::MoreLights | Command::FewerLights => {
                    let requested =
                        controls::step_light_count(renderer.num_lights(), self.config.lights.count_step, command);
                    renderer.set_num_lights(requested)?;
                }
            }
        }
        controls::fly_camera(
            &mut renderer.camera_mut().transform,
            input,
            self.config.camera.move_speed,
            time.delta_seconds(),
        );

        match renderer.render(time.elapsed_seconds()) {
            Ok(()) => {}
            Err(err) if err.is_surface_lost() => {
                log::warn!("{err}, reconfiguring surface");
                renderer.reconfigure();
            }
            Err(RenderError::Surface(wgpu_err)) => {
                // timeouts and the like: skip this frame
                log::warn!("Skipping frame: {wgpu_err}");
            }
            Err(err) => return Err(err),
        }

        self.frame_time_acc += time.delta_seconds();
        if time.frame_count() % REPORT_INTERVAL == 0 {
            let avg_ms = self.frame_time_acc / REPORT_INTERVAL as f32 * 1000.0;
            log::debug!(
                "{:?}: {} lights, {avg_ms:.2} ms/frame",
                renderer.mode(),
                renderer.num_lights()
            );
            self.frame_time_acc = 0.0;
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => match EngineConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("{err}");
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };

    let window = config.window.clone();
    match run_app(&window, ForwardPlusApp::new(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
