use crate::audio::Beeper;
use ab_glyph::FontVec;
use anyhow::{Context, Result};
use numag_core::{ExperimentPhase, Key};
use numag_experiment::{CsvResultSink, SessionEvent, TrialSequencer};
use numag_render::SkiaRenderer;
use numag_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::StdRng;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

pub type Session = TrialSequencer<HighPrecisionTimer, StdRng, CsvResultSink>;

const IDLE_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Aborted,
}

impl RunOutcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            RunOutcome::Completed => ExitCode::SUCCESS,
            RunOutcome::Aborted => ExitCode::from(2),
        }
    }
}

pub fn map_key(code: KeyCode) -> Key {
    match code {
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::Escape | KeyCode::KeyQ => Key::Abort,
        KeyCode::Space => Key::Continue,
        _ => Key::Other,
    }
}

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    font: Option<FontVec>,
    session: Session,
    beeper: Option<Beeper>,
    last_present: Option<u64>,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(session: Session, font: Option<FontVec>) -> Self {
        let beeper = Beeper::open(&session.config().tone);
        Self {
            window: None,
            pixels: None,
            renderer: None,
            font,
            session,
            beeper,
            last_present: None,
            error: None,
        }
    }

    pub fn run(mut self) -> Result<RunOutcome> {
        let event_loop = EventLoop::new()?;
        info!(
            "Starting {} for {} on {}/{}",
            self.session.config().exp_name,
            self.session.participant().name,
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        event_loop.run_app(&mut self)?;

        let stats = self.session.timer.frame_stats();
        info!(
            "Frames: {}, mean {:.3} ms, jitter {:.3} ms, {:.1} fps",
            stats.frames,
            stats.average_frame_time_ns / 1e6,
            stats.jitter_ns / 1e6,
            stats.effective_fps
        );

        if let Some(err) = self.error.take() {
            return Err(err);
        }
        Ok(match self.session.phase() {
            ExperimentPhase::Finished => RunOutcome::Completed,
            _ => RunOutcome::Aborted,
        })
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .context("no monitor available")?;
        let refresh_rate = monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title(self.session.config().exp_name.clone())
            .with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
            .with_resizable(false);
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();

        info!(
            "Display {}x{}, scale factor {:.2}, refresh {}",
            size.width,
            size.height,
            window.scale_factor(),
            refresh_rate.map_or("unknown".to_string(), |hz| format!("{hz:.1} Hz"))
        );

        let surface_texture = SurfaceTexture::new(size.width, size.height, Arc::clone(&window));
        self.pixels = Some(
            Pixels::new(size.width, size.height, surface_texture)
                .context("creating the pixel surface")?,
        );

        let geometry = &self.session.config().geometry;
        self.renderer = Some(SkiaRenderer::new(
            size.width,
            size.height,
            (geometry.screen_width, geometry.screen_height),
            self.font.take(),
        )?);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let events = self.session.update()?;
        self.dispatch(events);
        if self.session.phase().is_terminal() {
            return Ok(());
        }

        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };
        let scene = self.session.scene();
        let timings = renderer.render_frame(&scene, pixels.frame_mut(), &self.session.timer)?;
        pixels.render().context("presenting the frame")?;

        let presented = self.session.timer.now();
        self.session.frame_presented(presented);
        if let Some(last) = self.last_present.replace(presented) {
            self.session
                .timer
                .record_frame(Duration::from_nanos(presented.saturating_sub(last)));
        }
        debug!(
            "draw {:.3} ms, copy {:.3} ms",
            timings.draw.as_secs_f64() * 1e3,
            timings.copy.as_secs_f64() * 1e3
        );
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<()> {
        // Stamp before any other work
        let at = self.session.timer.now();
        let key = map_key(code);
        debug!("Key {:?} as {:?} at {} ns", code, key, at);
        let events = self.session.handle_input_at(key, at)?;
        self.dispatch(events);
        Ok(())
    }

    fn dispatch(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            match event {
                SessionEvent::FixationStarted { .. } => {
                    if let Some((current, total)) = self.session.trial_progress() {
                        debug!("Trial {}/{}", current, total);
                    }
                    if let Some(beeper) = &self.beeper {
                        beeper.beep();
                    }
                }
                SessionEvent::Aborted => info!("Stopping after abort"),
                other => debug!("{:?}", other),
            }
        }
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) -> Result<()> {
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        if let Some(pixels) = &mut self.pixels {
            pixels.resize_surface(size.width, size.height)?;
            pixels.resize_buffer(size.width, size.height)?;
        }
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(size.width, size.height)?;
        }
        info!("Display resized to {}x{}", size.width, size.height);
        Ok(())
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        event_loop.exit();
    }

    /// Keeps the first error for `run` to return
    fn fail(&mut self, err: anyhow::Error, event_loop: &ActiveEventLoop) {
        self.error.get_or_insert(err);
        self.exit(event_loop);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.create_window_and_surface(event_loop) {
                self.fail(err.context("opening the experiment window"), event_loop);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let result = match event {
            WindowEvent::CloseRequested => {
                warn!("Window closed");
                self.session
                    .handle_input(Key::Abort)
                    .map(drop)
                    .map_err(anyhow::Error::from)
            }
            WindowEvent::RedrawRequested => {
                let result = self.redraw();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
                result
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                match event.physical_key {
                    PhysicalKey::Code(code) => self.handle_key(code),
                    PhysicalKey::Unidentified(_) => Ok(()),
                }
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => match &self.window {
                Some(window) => {
                    let size = window.inner_size();
                    self.handle_resize(size)
                }
                None => Ok(()),
            },
            _ => Ok(()),
        };

        match result {
            Err(err) => self.fail(err, event_loop),
            Ok(()) if self.session.phase().is_terminal() => self.exit(event_loop),
            Ok(()) => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.session.timer.sleep(IDLE_SLEEP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_session_inputs() {
        assert_eq!(map_key(KeyCode::ArrowLeft), Key::Left);
        assert_eq!(map_key(KeyCode::ArrowRight), Key::Right);
        assert_eq!(map_key(KeyCode::Escape), Key::Abort);
        assert_eq!(map_key(KeyCode::KeyQ), Key::Abort);
        assert_eq!(map_key(KeyCode::Space), Key::Continue);
        assert_eq!(map_key(KeyCode::KeyA), Key::Other);
    }
}
