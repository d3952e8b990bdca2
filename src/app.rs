use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use pixels::{Pixels, SurfaceTexture};
use tracing::{debug, error, info, warn};
use twodot_core::{TrialError, TrialEvent, TrialSpec};
use twodot_experiment::{ExperimentConfig, RunnerStatus, Timeline, TimelineRunner};
use twodot_render::{Control, FontArc, SkiaView};
use twodot_timing::{HighPrecisionTimer, Timer};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::player::SessionPlayer;

type Runner = TimelineRunner<SkiaView, SessionPlayer>;

/// Builds each trial's view at the window size current when the trial
/// starts, with the player selected by the config.
fn trial_factory(
    config: &ExperimentConfig,
    size: Rc<Cell<PhysicalSize<u32>>>,
    font: Option<FontArc>,
    timer: HighPrecisionTimer,
) -> impl FnMut(&TrialSpec) -> Result<(SkiaView, SessionPlayer), TrialError> + 'static {
    let assets_dir: PathBuf = config.assets_dir.clone();
    let marker_radius = config.marker_radius_px;
    let rate = config.playback_rate;
    let output = config.audio_output;

    move |spec: &TrialSpec| {
        let PhysicalSize { width, height } = size.get();
        let view = SkiaView::for_trial(
            width,
            height,
            spec,
            &assets_dir,
            marker_radius,
            font.as_ref(),
        )
        .map_err(|e| TrialError::Presentation(e.to_string()))?;
        let player = SessionPlayer::new(output, assets_dir.clone(), &timer, rate);
        Ok((view, player))
    }
}

pub struct App {
    config: ExperimentConfig,
    timeline: Option<Timeline>,
    runner: Option<Runner>,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    timer: HighPrecisionTimer,
    current_size: Rc<Cell<PhysicalSize<u32>>>,
    cursor: PhysicalPosition<f64>,
    refresh_rate: Option<f64>,
    results_written: bool,
}

impl App {
    pub fn new(config: ExperimentConfig, timeline: Timeline) -> Self {
        Self {
            config,
            timeline: Some(timeline),
            runner: None,
            window: None,
            pixels: None,
            timer: HighPrecisionTimer::new(),
            current_size: Rc::new(Cell::new(PhysicalSize::new(0, 0))),
            cursor: PhysicalPosition::new(0.0, 0.0),
            refresh_rate: None,
            results_written: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        #[cfg(target_os = "windows")]
        unsafe {
            windows::Win32::Media::timeBeginPeriod(1);
        }

        let event_loop = EventLoop::new()?;
        info!(
            "Platform: {} ({})",
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        let result = event_loop.run_app(&mut self);

        #[cfg(target_os = "windows")]
        unsafe {
            windows::Win32::Media::timeEndPeriod(1);
        }

        self.save_results();
        result.map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("No monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("Two-dot")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();
        self.current_size.set(size);

        info!(
            "Display: {}x{} at scale {:.2}{}",
            size.width,
            size.height,
            window.scale_factor(),
            self.refresh_rate
                .map(|hz| format!(", {hz:.1} Hz"))
                .unwrap_or_default()
        );

        let surface_texture = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface_texture)?);

        window.request_redraw();
        self.window = Some(window);

        self.start_runner()?;
        Ok(())
    }

    fn start_runner(&mut self) -> Result<()> {
        let timeline = self
            .timeline
            .take()
            .ok_or_else(|| anyhow!("timeline already started"))?;

        let font = twodot_render::load_font(&self.config.assets_dir);
        let factory = trial_factory(
            &self.config,
            Rc::clone(&self.current_size),
            font,
            self.timer.clone(),
        );
        let mut runner = TimelineRunner::new(timeline, self.config.invalid_trial_policy, factory);
        runner.start()?;
        self.runner = Some(runner);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(runner)) = (self.pixels.as_mut(), self.runner.as_mut()) else {
            return Ok(());
        };
        let Some(trial) = runner.current_mut() else {
            return Ok(());
        };

        let size = self.current_size.get();
        let view = trial.view_mut();
        view.ensure_size(size.width, size.height)?;
        let stats = view.render_frame(pixels.frame_mut(), &mut self.timer)?;
        let t_present = self.timer.now();
        pixels.render()?;
        let present = self.timer.elapsed(t_present);

        if stats.dirty_count > 0 {
            debug!(
                "frame: draw {:.3}ms, copy {:.3}ms, present {:.3}ms, dirty {}",
                stats.draw.as_secs_f64() * 1e3,
                stats.copy.as_secs_f64() * 1e3,
                present.as_secs_f64() * 1e3,
                stats.dirty_count,
            );
        }
        Ok(())
    }

    /// Samples the running player and feeds its events to the trial.
    fn update(&mut self, event_loop: &ActiveEventLoop) {
        let Some(runner) = self.runner.as_mut() else {
            return;
        };
        let events = match runner.current_mut() {
            Some(trial) => trial.player_mut().poll(),
            None => Vec::new(),
        };
        for event in events {
            self.dispatch(event, event_loop);
        }
    }

    fn dispatch(&mut self, event: TrialEvent, event_loop: &ActiveEventLoop) {
        let Some(runner) = self.runner.as_mut() else {
            return;
        };
        match runner.handle_event(event) {
            Ok(RunnerStatus::Running) => {}
            Ok(status) => {
                info!("Timeline {:?}", status);
                self.cleanup_and_exit(event_loop);
            }
            Err(e) => {
                error!("Timeline stopped: {}", e);
                self.cleanup_and_exit(event_loop);
            }
        }
    }

    fn handle_key(&mut self, key: PhysicalKey, event_loop: &ActiveEventLoop) {
        let PhysicalKey::Code(code) = key else {
            return;
        };
        match code {
            KeyCode::Space | KeyCode::Enter => {
                if self.control_visible(Control::Continue) {
                    self.dispatch(TrialEvent::ContinueActivated, event_loop);
                }
            }
            KeyCode::KeyF => {
                if self.control_visible(Control::Feedback) {
                    self.dispatch(TrialEvent::FeedbackActivated, event_loop);
                }
            }
            KeyCode::Escape => self.cleanup_and_exit(event_loop),
            _ => {}
        }
    }

    fn handle_click(&mut self, event_loop: &ActiveEventLoop) {
        let hit = self
            .runner
            .as_ref()
            .and_then(|r| r.current())
            .and_then(|t| t.view().hit_test(self.cursor.x as f32, self.cursor.y as f32));
        match hit {
            Some(Control::Continue) => self.dispatch(TrialEvent::ContinueActivated, event_loop),
            Some(Control::Feedback) => self.dispatch(TrialEvent::FeedbackActivated, event_loop),
            None => {}
        }
    }

    fn control_visible(&self, control: Control) -> bool {
        self.runner
            .as_ref()
            .and_then(|r| r.current())
            .is_some_and(|t| t.view().is_visible(control))
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        // Minimized windows report zero; keep drawing at the last size.
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                warn!("Failed to resize surface: {}", e);
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                warn!("Failed to resize buffer: {}", e);
            }
        }
        self.current_size.set(new_size);
        if let Some(trial) = self.runner.as_mut().and_then(|r| r.current_mut()) {
            if let Err(e) = trial.view_mut().resize(new_size.width, new_size.height) {
                warn!("Failed to resize view: {}", e);
            }
        }
        info!("Display resized to {}x{}", new_size.width, new_size.height);
    }

    fn save_results(&mut self) {
        if self.results_written {
            return;
        }
        let (Some(runner), Some(path)) = (self.runner.as_ref(), self.config.results_path.as_ref())
        else {
            return;
        };
        match runner.write_results(path) {
            Ok(()) => self.results_written = true,
            Err(e) => error!("Failed to write results: {}", e),
        }
    }

    /// Cancels whatever trial is still running and saves what completed.
    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(runner) = self.runner.as_mut() {
            runner.abort();
            info!(
                "{} trials completed, {} skipped",
                runner.outcomes().len(),
                runner.skipped().len()
            );
        }
        let stats = self.timer.calibration_stats();
        if self.timer.frame_count() > 0 {
            info!(
                "Frame timing over {} frames: avg {:.3}ms, jitter {:.3}ms, range {:.3}-{:.3}ms, {:.1} fps",
                self.timer.frame_count(),
                stats.average_frame_time_ns / 1e6,
                stats.jitter_ns / 1e6,
                stats.min_frame_time_ns / 1e6,
                stats.max_frame_time_ns / 1e6,
                stats.effective_fps
            );
        }
        self.save_results();
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!("Failed to start: {}", e);
                event_loop.exit();
                return;
            }
            // An empty or fully skipped timeline never shows a trial.
            if self.runner.as_ref().map(|r| r.status()) != Some(RunnerStatus::Running) {
                self.cleanup_and_exit(event_loop);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                self.update(event_loop);
                if let Err(e) = self.render() {
                    error!("Render failed: {}", e);
                    self.cleanup_and_exit(event_loop);
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                self.handle_key(event.physical_key, event_loop);
            }
            WindowEvent::CursorMoved { position, .. } => self.cursor = position,
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.handle_click(event_loop),
            WindowEvent::Resized(size) => self.handle_resize(size),
            _ => {}
        }
    }
}
