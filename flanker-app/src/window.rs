use crate::keys::key_name;
use ab_glyph::FontVec;
use anyhow::{Result, anyhow};
use flanker_core::{KeyPress, StimulusHandle};
use flanker_experiment::{Display, DisplayError, Keyboard};
use flanker_render::{RenderSettings, SkiaRenderer};
use pixels::{Pixels, SurfaceTexture};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::PhysicalKey,
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Fullscreen, Window, WindowId},
};

type KeyQueue = Rc<RefCell<VecDeque<KeyPress>>>;

/// Window state driven by the pumped event loop.
struct WindowBackend {
    settings: RenderSettings,
    font: Option<FontVec>,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    refresh_rate: Option<f64>,
    keys: KeyQueue,
    closed: bool,
    error: Option<anyhow::Error>,
}

impl WindowBackend {
    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("No monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("Flanker task")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();

        tracing::info!(
            width = physical_size.width,
            height = physical_size.height,
            scale_factor = window.scale_factor(),
            refresh_rate = ?self.refresh_rate,
            "window opened"
        );

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        let mut renderer =
            SkiaRenderer::new(physical_size.width, physical_size.height, self.settings)?;
        if let Some(font) = self.font.take() {
            renderer = renderer.with_font(font);
        }
        self.renderer = Some(renderer);

        window.set_cursor_visible(false);
        self.window = Some(window);
        Ok(())
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                tracing::warn!(error = %e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                tracing::warn!(error = %e, "failed to resize buffer");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                self.error = Some(e);
            }
        }
        tracing::info!(width = new_size.width, height = new_size.height, "display resized");
    }
}

impl ApplicationHandler for WindowBackend {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.error = Some(e.context("failed to create window and surface"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.closed = true,
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                let at = Instant::now();
                if let PhysicalKey::Code(code) = event.physical_key {
                    if let Some(name) = key_name(code) {
                        self.keys.borrow_mut().push_back(KeyPress::new(name, at));
                    }
                }
            }
            WindowEvent::Resized(sz) => self.handle_resize(sz),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }
}

/// Fullscreen window presenting frames at the monitor's refresh rate.
///
/// The event loop is pumped after every flip, so keyboard events reach the
/// paired [`WinitKeyboard`] at frame granularity with their arrival time.
pub struct WinitDisplay {
    event_loop: EventLoop<()>,
    backend: WindowBackend,
}

impl WinitDisplay {
    /// Open the window and wait until its surface exists.
    pub fn open(settings: RenderSettings, font: FontVec) -> Result<(Self, WinitKeyboard)> {
        let keys: KeyQueue = Rc::default();
        let mut display = WinitDisplay {
            event_loop: EventLoop::new()?,
            backend: WindowBackend {
                settings,
                font: Some(font),
                window: None,
                pixels: None,
                renderer: None,
                refresh_rate: None,
                keys: Rc::clone(&keys),
                closed: false,
                error: None,
            },
        };

        while display.backend.renderer.is_none() {
            let status = display
                .event_loop
                .pump_app_events(Some(Duration::from_millis(10)), &mut display.backend);
            if let Some(e) = display.backend.error.take() {
                return Err(e);
            }
            if let PumpStatus::Exit(code) = status {
                return Err(anyhow!("event loop exited with code {code} before the window opened"));
            }
        }
        Ok((display, WinitKeyboard { keys }))
    }

    /// Refresh rate the monitor reports, if any.
    pub fn refresh_rate(&self) -> Option<f64> {
        self.backend.refresh_rate
    }

    /// Decode every stimulus up front.
    pub fn preload<'a>(&mut self, handles: impl IntoIterator<Item = &'a StimulusHandle>) -> Result<()> {
        let renderer = self
            .backend
            .renderer
            .as_mut()
            .ok_or_else(|| anyhow!("window is not open"))?;
        renderer.preload(handles)
    }

    pub fn log_render_stats(&self) {
        let Some(renderer) = &self.backend.renderer else {
            return;
        };
        for name in ["clear", "draw", "copy", "total"] {
            if let Some(stats) = renderer.component_stats(name) {
                tracing::debug!(
                    component = name,
                    mean_ms = stats.average_frame_time_ns / 1e6,
                    max_ms = stats.max_frame_time_ns / 1e6,
                    "render timing"
                );
            }
        }
    }

    fn pump(&mut self) -> Result<(), DisplayError> {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.backend);
        if let Some(e) = self.backend.error.take() {
            return Err(DisplayError::backend("window backend failed", e));
        }
        if self.backend.closed || matches!(status, PumpStatus::Exit(_)) {
            return Err(DisplayError::new("window was closed"));
        }
        Ok(())
    }
}

impl Display for WinitDisplay {
    fn draw(&mut self, handle: &StimulusHandle) -> Result<(), DisplayError> {
        let renderer = self
            .backend
            .renderer
            .as_mut()
            .ok_or_else(|| DisplayError::new("window is not open"))?;
        renderer
            .draw(handle)
            .map_err(|e| DisplayError::backend("failed to draw stimulus", e))
    }

    fn flip(&mut self) -> Result<Instant, DisplayError> {
        let (Some(pixels), Some(renderer)) =
            (self.backend.pixels.as_mut(), self.backend.renderer.as_mut())
        else {
            return Err(DisplayError::new("window is not open"));
        };
        renderer
            .present(pixels.frame_mut())
            .map_err(|e| DisplayError::backend("failed to compose frame", e))?;
        pixels
            .render()
            .map_err(|e| DisplayError::new(format!("failed to present frame: {e}")))?;
        let flipped_at = Instant::now();
        self.pump()?;
        Ok(flipped_at)
    }

    fn frame_period(&self) -> Option<Duration> {
        self.refresh_rate()
            .filter(|hz| *hz > 0.0)
            .map(|hz| Duration::from_secs_f64(1.0 / hz))
    }
}

impl Drop for WinitDisplay {
    fn drop(&mut self) {
        if let Some(window) = &self.backend.window {
            window.set_cursor_visible(true);
        }
        self.log_render_stats();
    }
}

/// Key presses collected by [`WinitDisplay`]'s event pump.
pub struct WinitKeyboard {
    keys: KeyQueue,
}

impl Keyboard for WinitKeyboard {
    fn get_keys(&mut self, keys: &[String]) -> Vec<KeyPress> {
        let mut queue = self.keys.borrow_mut();
        let (hits, rest): (Vec<_>, Vec<_>) = queue.drain(..).partition(|p| keys.contains(&p.key));
        *queue = rest.into();
        hits
    }

    fn clear_events(&mut self) {
        self.keys.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyboard(presses: &[&str]) -> WinitKeyboard {
        let t0 = Instant::now();
        let queue: VecDeque<KeyPress> = presses
            .iter()
            .enumerate()
            .map(|(i, k)| KeyPress::new(*k, t0 + Duration::from_millis(i as u64)))
            .collect();
        WinitKeyboard {
            keys: Rc::new(RefCell::new(queue)),
        }
    }

    fn names(presses: &[KeyPress]) -> Vec<&str> {
        presses.iter().map(|p| p.key.as_str()).collect()
    }

    #[test]
    fn get_keys_takes_only_requested_keys_in_order() {
        let mut kb = keyboard(&["x", "m", "f7", "c"]);
        let hits = kb.get_keys(&["c".into(), "m".into()]);
        assert_eq!(names(&hits), ["m", "c"]);
        assert!(hits[0].at < hits[1].at);

        let rest = kb.get_keys(&["f7".into(), "x".into()]);
        assert_eq!(names(&rest), ["x", "f7"]);
    }

    #[test]
    fn clear_events_empties_the_queue() {
        let mut kb = keyboard(&["space", "f7"]);
        kb.clear_events();
        assert!(kb.get_keys(&["space".into(), "f7".into()]).is_empty());
    }
}
