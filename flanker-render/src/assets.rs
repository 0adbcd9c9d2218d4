//! Decoding and preparing image stimuli.

use anyhow::{Context, Result};
use std::path::Path;
use tiny_skia::{ColorU8, FilterQuality, Pixmap, PixmapPaint, Transform};

/// Decode an image file into a premultiplied pixmap.
pub fn load_image_pixmap(path: &Path) -> Result<Pixmap> {
    let img = image::open(path)
        .with_context(|| format!("failed to load image {}", path.display()))?
        .to_rgba8();
    pixmap_from_rgba(img.width(), img.height(), img.as_raw())
}

/// Straight-alpha RGBA8 to a premultiplied pixmap.
pub fn pixmap_from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Pixmap> {
    let mut pm = Pixmap::new(width, height)
        .with_context(|| format!("invalid image size {width}x{height}"))?;
    for (dst, src) in pm.pixels_mut().iter_mut().zip(rgba.chunks_exact(4)) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Ok(pm)
}

pub fn scale_pixmap(src: &Pixmap, width: u32, height: u32) -> Result<Pixmap> {
    let (width, height) = (width.max(1), height.max(1));
    if (width, height) == (src.width(), src.height()) {
        return Ok(src.clone());
    }
    let mut out = Pixmap::new(width, height)
        .with_context(|| format!("invalid scaled size {width}x{height}"))?;
    let sx = width as f32 / src.width() as f32;
    let sy = height as f32 / src.height() as f32;
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    out.draw_pixmap(0, 0, src.as_ref(), &paint, Transform::from_scale(sx, sy), None);
    Ok(out)
}

pub fn mirror_horizontally(pm: &mut Pixmap) {
    let w = pm.width() as usize;
    for row in pm.pixels_mut().chunks_exact_mut(w) {
        row.reverse();
    }
}

pub fn transparent_pixmap() -> Result<Pixmap> {
    Pixmap::new(1, 1).context("failed to allocate pixmap")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_is_premultiplied() {
        let pm = pixmap_from_rgba(1, 1, &[200, 100, 0, 128]).unwrap();
        let px = pm.pixels()[0];
        assert_eq!(px.alpha(), 128);
        assert_eq!(px.red(), 100);
        assert_eq!(px.green(), 50);
    }

    #[test]
    fn mirror_reverses_each_row() {
        let mut pm = pixmap_from_rgba(
            2,
            2,
            &[
                255, 0, 0, 255, 0, 0, 255, 255, //
                0, 255, 0, 255, 0, 0, 0, 255,
            ],
        )
        .unwrap();
        mirror_horizontally(&mut pm);
        let px = pm.pixels();
        assert_eq!(px[0].blue(), 255);
        assert_eq!(px[1].red(), 255);
        assert_eq!(px[2].red(), 0);
        assert_eq!(px[3].green(), 255);
    }

    #[test]
    fn scaling_changes_extent() {
        let src = pixmap_from_rgba(2, 2, &[255; 16]).unwrap();
        let out = scale_pixmap(&src, 8, 4).unwrap();
        assert_eq!((out.width(), out.height()), (8, 4));
    }

    #[test]
    fn missing_image_names_the_path() {
        let err = load_image_pixmap(Path::new("images/nope.bmp")).unwrap_err();
        assert!(format!("{err:#}").contains("nope.bmp"));
    }
}
