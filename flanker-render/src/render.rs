use crate::assets::{load_image_pixmap, mirror_horizontally, scale_pixmap, transparent_pixmap};
use crate::text::render_text_pixmap;
use ab_glyph::FontVec;
use anyhow::{Context, Result, bail};
use bytemuck::{cast_slice, cast_slice_mut};
use flanker_cache::{get_text, text_count};
use flanker_core::{Stimulus, StimulusHandle, StimulusKind, Units};
use flanker_timing::{CalibrationStats, HighPrecisionTimer, Timer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tiny_skia::{Pixmap, Rect};

/// Fixed properties of the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub background: [u8; 4],
    pub pixels_per_degree: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    id: usize,
    flip: bool,
    extent: [u32; 2],
    color: [u8; 4],
}

pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub dirty_count: usize,
}

/// Software renderer for the task's stimuli.
///
/// Draw calls blit cached pixmaps onto an offscreen canvas. [`present`]
/// copies only the regions touched by this frame or the previous one into
/// the window's frame buffer, so the canvas always holds exactly one frame.
///
/// [`present`]: SkiaRenderer::present
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),
    settings: RenderSettings,

    font: Option<FontVec>,
    cache: HashMap<CacheKey, Arc<Pixmap>>,

    // Rendering state
    canvas: Pixmap,
    dirty_regions: Vec<Rect>,
    stale_regions: Vec<Rect>,
    frame_open: bool,
    first_frame: bool,
    draw_time: Duration,

    // Performance tracking
    component_timers: HashMap<&'static str, HighPrecisionTimer>,
    clear_buffer: Vec<u8>,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, settings: RenderSettings) -> Result<Self> {
        let canvas = Pixmap::new(width, height)
            .with_context(|| format!("invalid canvas size {width}x{height}"))?;
        let mut renderer = SkiaRenderer {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            settings,
            font: None,
            cache: HashMap::new(),
            canvas,
            dirty_regions: Vec::with_capacity(16),
            stale_regions: Vec::with_capacity(16),
            frame_open: false,
            first_frame: true,
            draw_time: Duration::ZERO,
            component_timers: ["draw", "clear", "copy", "total"]
                .iter()
                .map(|&k| (k, HighPrecisionTimer::new()))
                .collect(),
            clear_buffer: Vec::new(),
        };
        renderer.reset_canvas();
        Ok(renderer)
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.canvas = Pixmap::new(new_width, new_height)
            .with_context(|| format!("invalid canvas size {new_width}x{new_height}"))?;
        self.width = new_width;
        self.height = new_height;
        self.center = (new_width as f32 / 2.0, new_height as f32 / 2.0);
        self.reset_canvas();
        Ok(())
    }

    fn reset_canvas(&mut self) {
        self.clear_buffer = self
            .settings
            .background
            .into_iter()
            .cycle()
            .take((self.width * self.height * 4) as usize)
            .collect();
        self.canvas.data_mut().copy_from_slice(&self.clear_buffer);
        self.dirty_regions.clear();
        self.stale_regions.clear();
        self.frame_open = false;
        self.first_frame = true;
    }

    fn unit_scale(&self, units: Units) -> f32 {
        match units {
            Units::Pixels => 1.0,
            Units::Degrees => self.settings.pixels_per_degree,
        }
    }

    /// Canvas pixel position of a handle's centre (origin top-left, +y down).
    pub fn to_canvas(&self, handle: &StimulusHandle) -> (f32, f32) {
        let s = self.unit_scale(handle.units);
        (
            self.center.0 + handle.pos.0 * s,
            self.center.1 - handle.pos.1 * s,
        )
    }

    /// Load everything `handles` will need so the first trial frame does not
    /// stall on decoding. Both orientations are prepared for flippable images.
    pub fn preload<'a>(&mut self, handles: impl IntoIterator<Item = &'a StimulusHandle>) -> Result<()> {
        for handle in handles {
            self.cached_pixmap(handle)?;
            if !handle.kind.is_text() {
                let mut mirrored = handle.clone();
                mirrored.flip_horiz = !handle.flip_horiz;
                self.cached_pixmap(&mirrored)?;
            }
        }
        tracing::debug!(
            entries = self.cache.len(),
            interned = text_count(),
            "stimulus cache warmed"
        );
        Ok(())
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn cache_key(&self, handle: &StimulusHandle) -> CacheKey {
        let s = self.unit_scale(handle.units);
        let (extent, color) = match &handle.kind {
            StimulusKind::Image { size, .. } => (
                size.map_or([0, 0], |(w, h)| [(w * s).to_bits(), (h * s).to_bits()]),
                [0; 4],
            ),
            StimulusKind::Text { height, color, .. } => ([(height * s).to_bits(), 0], *color),
        };
        CacheKey {
            id: handle.cache_id(),
            flip: handle.flip_horiz,
            extent,
            color,
        }
    }

    fn cached_pixmap(&mut self, handle: &StimulusHandle) -> Result<Arc<Pixmap>> {
        let key = self.cache_key(handle);
        if let Some(p) = self.cache.get(&key) {
            return Ok(Arc::clone(p));
        }

        tracing::debug!(name = ?get_text(key.id), flip = key.flip, "rasterizing stimulus");
        let s = self.unit_scale(handle.units);
        let mut pm = match &handle.kind {
            StimulusKind::Image { path, size } => {
                let pm = load_image_pixmap(path)?;
                match size {
                    Some((w, h)) => {
                        scale_pixmap(&pm, (w * s).round() as u32, (h * s).round() as u32)?
                    }
                    None => pm,
                }
            }
            StimulusKind::Text {
                content,
                height,
                color,
            } => {
                let font = self
                    .font
                    .as_ref()
                    .context("text stimulus drawn but no font is loaded")?;
                match render_text_pixmap(content, height * s, font, *color) {
                    Some(pm) => pm,
                    None => transparent_pixmap()?,
                }
            }
        };
        if handle.flip_horiz {
            mirror_horizontally(&mut pm);
        }

        let pm = Arc::new(pm);
        self.cache.insert(key, Arc::clone(&pm));
        Ok(pm)
    }

    /// Start a frame: restore the background where the last frame drew.
    fn open_frame(&mut self) {
        if self.frame_open {
            return;
        }
        let t = std::time::Instant::now();
        std::mem::swap(&mut self.stale_regions, &mut self.dirty_regions);
        self.dirty_regions.clear();
        let stale = std::mem::take(&mut self.stale_regions);
        self.clear_dirty(&stale);
        self.stale_regions = stale;
        if let Some(timer) = self.component_timers.get_mut("clear") {
            timer.record_frame(t.elapsed());
        }
        self.frame_open = true;
    }

    /// Blit one stimulus onto the canvas.
    pub fn draw(&mut self, handle: &StimulusHandle) -> Result<()> {
        self.open_frame();
        let t = std::time::Instant::now();
        let pm = self.cached_pixmap(handle)?;
        let pos = self.to_canvas(handle);
        self.blit(&pm, pos);
        self.draw_time += t.elapsed();
        Ok(())
    }

    /// Copy this frame into `frame_buffer` (RGBA8, canvas-sized).
    pub fn present(&mut self, frame_buffer: &mut [u8]) -> Result<FrameStats> {
        if frame_buffer.len() != self.clear_buffer.len() {
            bail!(
                "frame buffer holds {} bytes, canvas needs {}",
                frame_buffer.len(),
                self.clear_buffer.len()
            );
        }
        self.open_frame();
        let t_clear = self
            .component_timers
            .get("clear")
            .and_then(|t| t.frame_times.last().copied())
            .unwrap_or_default();

        let t = std::time::Instant::now();
        if self.first_frame {
            self.first_frame = false;
            frame_buffer.copy_from_slice(&self.clear_buffer);
        }
        let mut present_rects = self.stale_regions.clone();
        present_rects.extend_from_slice(&self.dirty_regions);
        Self::coalesce_dirty(&mut present_rects);
        for rect in &present_rects {
            self.copy_dirty_region(*rect, frame_buffer);
        }
        let t_copy = t.elapsed();

        let t_draw = std::mem::take(&mut self.draw_time);
        let total = t_clear + t_draw + t_copy;
        for (name, d) in [("draw", t_draw), ("copy", t_copy), ("total", total)] {
            if let Some(timer) = self.component_timers.get_mut(name) {
                timer.record_frame(d);
            }
        }
        self.frame_open = false;

        Ok(FrameStats {
            clear: t_clear,
            draw: t_draw,
            copy: t_copy,
            total,
            dirty_count: self.dirty_regions.len(),
        })
    }

    /// Timing summary for one of `draw`, `clear`, `copy` or `total`.
    pub fn component_stats(&self, name: &str) -> Option<CalibrationStats> {
        self.component_timers
            .get(name)
            .map(|t| t.calibration_stats())
    }

    fn pixel_bounds(&self, rect: &Rect) -> Option<(usize, usize, usize, usize)> {
        let x0 = rect.x().floor().max(0.0).min(self.width as f32) as usize;
        let y0 = rect.y().floor().max(0.0).min(self.height as f32) as usize;
        let x1 = (rect.x() + rect.width()).ceil().min(self.width as f32) as usize;
        let y1 = (rect.y() + rect.height()).ceil().min(self.height as f32) as usize;
        (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
    }

    fn clear_dirty(&mut self, dirty: &[Rect]) {
        let stride = self.width as usize * 4;
        for rect in dirty {
            let Some((x0, y0, x1, y1)) = self.pixel_bounds(rect) else {
                continue;
            };
            let row_len = (x1 - x0) * 4;
            let canvas_data = self.canvas.data_mut();
            for y in y0..y1 {
                let off = y * stride + x0 * 4;
                canvas_data[off..off + row_len]
                    .copy_from_slice(&self.clear_buffer[off..off + row_len]);
            }
        }
    }

    fn copy_dirty_region(&self, dirty: Rect, frame_buffer: &mut [u8]) {
        let Some((x0, y0, x1, y1)) = self.pixel_bounds(&dirty) else {
            return;
        };
        let bytes = (x1 - x0) * 4;
        let row_bytes = self.width as usize * 4;
        let canvas_data = self.canvas.data();
        for row in y0..y1 {
            let off = row * row_bytes + x0 * 4;
            frame_buffer[off..off + bytes].copy_from_slice(&canvas_data[off..off + bytes]);
        }
    }

    fn coalesce_dirty(rects: &mut Vec<Rect>) {
        rects.sort_by(|a, b| a.y().total_cmp(&b.y()).then(a.x().total_cmp(&b.x())));
        let mut out: Vec<Rect> = Vec::with_capacity(rects.len());
        for r in rects.drain(..) {
            if let Some(last) = out.last_mut() {
                let same_row =
                    (r.y() - last.y()).abs() < 1.0 && (r.height() - last.height()).abs() < 1.0;
                let touching = r.x() <= last.x() + last.width() + 1.0;
                if same_row && touching {
                    let nx = last.x().min(r.x());
                    let nx2 = (last.x() + last.width()).max(r.x() + r.width());
                    if let Some(merged) = Rect::from_xywh(nx, last.y(), nx2 - nx, last.height()) {
                        *last = merged;
                        continue;
                    }
                }
            }
            out.push(r);
        }
        *rects = out;
    }

    /// Source-over blit of a premultiplied pixmap centred on `pos`.
    fn blit(&mut self, pm: &Pixmap, pos: (f32, f32)) {
        let (w, h) = (pm.width() as i32, pm.height() as i32);
        let (cw, ch) = (self.width as i32, self.height as i32);

        let x = (pos.0 - w as f32 * 0.5).floor() as i32;
        let y = (pos.1 - h as f32 * 0.5).floor() as i32;

        // Cull fully off-screen
        if x + w <= 0 || y + h <= 0 || x >= cw || y >= ch {
            return;
        }

        // Clipping
        let dst_x = x.max(0) as usize;
        let dst_y = y.max(0) as usize;
        let src_x = (-x).max(0) as usize;
        let src_y = (-y).max(0) as usize;
        let copy_w = (w as usize - src_x).min(cw as usize - dst_x);
        let copy_h = (h as usize - src_y).min(ch as usize - dst_y);
        let src_stride = w as usize;
        let dst_stride = cw as usize;

        let src_u32: &[u32] = cast_slice(pm.data());
        let dst_u32: &mut [u32] = cast_slice_mut(self.canvas.data_mut());

        let fully_opaque = (0..copy_h).all(|row| {
            let start = (src_y + row) * src_stride + src_x;
            src_u32[start..start + copy_w]
                .iter()
                .all(|&p| p.to_le_bytes()[3] == 255)
        });

        for row in 0..copy_h {
            let s0 = (src_y + row) * src_stride + src_x;
            let d0 = (dst_y + row) * dst_stride + dst_x;
            let src_row = &src_u32[s0..s0 + copy_w];
            let dst_row = &mut dst_u32[d0..d0 + copy_w];
            if fully_opaque {
                dst_row.copy_from_slice(src_row);
                continue;
            }
            for (d, &s) in dst_row.iter_mut().zip(src_row) {
                let [sr, sg, sb, sa] = s.to_le_bytes().map(u32::from);
                let [dr, dg, db, da] = d.to_le_bytes().map(u32::from);
                let inv = 255 - sa;
                let blend = |s: u32, d: u32| (s + (d * inv + 127) / 255).min(255) as u8;
                *d = u32::from_le_bytes([
                    blend(sr, dr),
                    blend(sg, dg),
                    blend(sb, db),
                    blend(sa, da),
                ]);
            }
        }

        if let Some(r) = Rect::from_xywh(
            dst_x as f32,
            dst_y as f32,
            copy_w as f32,
            copy_h as f32,
        ) {
            self.dirty_regions.push(r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const GREY: [u8; 4] = [128, 128, 128, 255];

    fn settings() -> RenderSettings {
        RenderSettings {
            background: GREY,
            pixels_per_degree: 10.0,
        }
    }

    fn write_png(name: &str, w: u32, h: u32, rgba: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("flanker-render-{name}-{}.png", std::process::id()));
        image::RgbaImage::from_raw(w, h, rgba.to_vec())
            .unwrap()
            .save(&path)
            .unwrap();
        path
    }

    fn image_handle(path: PathBuf, units: Units) -> StimulusHandle {
        StimulusHandle::new(StimulusKind::Image { path, size: None }, units)
    }

    fn pixel(buf: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * width + x) * 4) as usize;
        [buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]
    }

    #[test]
    fn positions_are_centre_origin_with_y_up() {
        let r = SkiaRenderer::new(200, 100, settings()).unwrap();
        let mut h = image_handle("car.bmp".into(), Units::Degrees);
        h.pos = (2.0, 3.0);
        assert_eq!(r.to_canvas(&h), (120.0, 20.0));
        h.units = Units::Pixels;
        assert_eq!(r.to_canvas(&h), (102.0, 47.0));
    }

    #[test]
    fn drawn_image_reaches_frame_buffer_and_is_cleared_next_frame() {
        let red = write_png("red", 2, 2, &[255, 0, 0, 255].repeat(4));
        let mut r = SkiaRenderer::new(10, 10, settings()).unwrap();
        let mut fb = vec![0u8; 10 * 10 * 4];

        r.draw(&image_handle(red.clone(), Units::Pixels)).unwrap();
        let stats = r.present(&mut fb).unwrap();
        assert_eq!(stats.dirty_count, 1);
        assert_eq!(pixel(&fb, 10, 4, 4), [255, 0, 0, 255]);
        assert_eq!(pixel(&fb, 10, 5, 5), [255, 0, 0, 255]);
        assert_eq!(pixel(&fb, 10, 0, 0), GREY);

        r.present(&mut fb).unwrap();
        assert_eq!(pixel(&fb, 10, 4, 4), GREY);
        let _ = std::fs::remove_file(red);
    }

    #[test]
    fn flipped_handle_mirrors_the_image() {
        let path = write_png("pair", 2, 1, &[255, 0, 0, 255, 0, 0, 255, 255]);
        let mut r = SkiaRenderer::new(4, 1, settings()).unwrap();
        let mut fb = vec![0u8; 4 * 4];
        let mut h = image_handle(path.clone(), Units::Pixels);

        r.draw(&h).unwrap();
        r.present(&mut fb).unwrap();
        assert_eq!(pixel(&fb, 4, 1, 0), [255, 0, 0, 255]);
        assert_eq!(pixel(&fb, 4, 2, 0), [0, 0, 255, 255]);

        h.flip_horiz = true;
        r.draw(&h).unwrap();
        r.present(&mut fb).unwrap();
        assert_eq!(pixel(&fb, 4, 1, 0), [0, 0, 255, 255]);
        assert_eq!(pixel(&fb, 4, 2, 0), [255, 0, 0, 255]);
        assert_eq!(r.cache_len(), 2);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn translucent_pixels_blend_over_background() {
        let path = write_png("half", 1, 1, &[255, 255, 255, 128]);
        let mut r = SkiaRenderer::new(3, 3, settings()).unwrap();
        let mut fb = vec![0u8; 3 * 3 * 4];
        r.draw(&image_handle(path.clone(), Units::Pixels)).unwrap();
        r.present(&mut fb).unwrap();
        let [red, _, _, alpha] = pixel(&fb, 3, 1, 1);
        assert_eq!(alpha, 255);
        assert!((190..=193).contains(&red), "got {red}");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn offscreen_stimuli_are_culled() {
        let path = write_png("cull", 2, 2, &[0, 255, 0, 255].repeat(4));
        let mut r = SkiaRenderer::new(10, 10, settings()).unwrap();
        let mut fb = vec![0u8; 400];
        let mut h = image_handle(path.clone(), Units::Degrees);
        h.pos = (5.0, 0.0);
        r.draw(&h).unwrap();
        assert_eq!(r.present(&mut fb).unwrap().dirty_count, 0);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn text_without_font_is_an_error() {
        let mut r = SkiaRenderer::new(10, 10, settings()).unwrap();
        let text = StimulusHandle::new(
            StimulusKind::Text {
                content: "+".into(),
                height: 20.0,
                color: [0, 0, 0, 255],
            },
            Units::Pixels,
        );
        assert!(r.draw(&text).is_err());
    }

    #[test]
    fn mismatched_frame_buffer_is_rejected() {
        let mut r = SkiaRenderer::new(10, 10, settings()).unwrap();
        assert!(r.present(&mut [0u8; 16]).is_err());
    }

    #[test]
    fn adjacent_rects_coalesce() {
        let mut rects = vec![
            Rect::from_xywh(10.0, 0.0, 5.0, 5.0).unwrap(),
            Rect::from_xywh(0.0, 0.0, 10.0, 5.0).unwrap(),
            Rect::from_xywh(0.0, 20.0, 5.0, 5.0).unwrap(),
        ];
        SkiaRenderer::coalesce_dirty(&mut rects);
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].width(), 15.0);
    }
}
