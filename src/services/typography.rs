// src/services/typography.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{Rgba, RgbaImage, imageops};
use log::{debug, warn};
use rusttype::{Font, Scale, point};

use crate::errors::BoothError;

static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans-Bold.ttf");

#[derive(Clone)]
pub struct Typeface {
    font: Arc<Font<'static>>,
    /// File the face was loaded from; `None` for the bundled face.
    pub source: Option<PathBuf>,
}

impl std::fmt::Debug for Typeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Typeface").field("source", &self.source).finish()
    }
}

/// Where the text sits relative to the anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Anchor is the bottom-right corner of the text box.
    BottomRight,
    /// Anchor is the centre of the text box.
    Center,
}

#[derive(Debug, Clone, Copy)]
pub struct Shadow {
    pub color: Rgba<u8>,
    pub offset: (i32, i32),
    pub blur: f32,
}

impl Typeface {
    /// DejaVu Sans Bold, compiled into the binary.
    pub fn bundled() -> Result<Self, BoothError> {
        let font = Font::try_from_bytes(BUNDLED_FONT).ok_or_else(|| {
            BoothError::ImageProcessing("Bundled font could not be parsed".to_string())
        })?;
        Ok(Self {
            font: Arc::new(font),
            source: None,
        })
    }

    pub fn load(path: &Path) -> Result<Self, BoothError> {
        let data = std::fs::read(path).map_err(|e| {
            BoothError::ImageProcessing(format!("Failed to read font {}: {}", path.display(), e))
        })?;
        let font = Font::try_from_vec(data).ok_or_else(|| {
            BoothError::ImageProcessing(format!("Not a usable font: {}", path.display()))
        })?;
        Ok(Self {
            font: Arc::new(font),
            source: Some(path.to_path_buf()),
        })
    }

    /// The explicit font when it loads, otherwise the bundled face.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, BoothError> {
        if let Some(path) = explicit {
            match Self::load(path) {
                Ok(face) => {
                    debug!("Using font {}", path.display());
                    return Ok(face);
                }
                Err(e) => warn!("{}; using the bundled font", e),
            }
        }
        Self::bundled()
    }

    /// Width and height of the rendered text box in pixels.
    pub fn measure(&self, px: f32, text: &str) -> (f32, f32) {
        if text.is_empty() {
            return (0.0, 0.0);
        }
        let scale = Scale::uniform(px);
        let v_metrics = self.font.v_metrics(scale);
        let width = self
            .font
            .layout(text, scale, point(0.0, v_metrics.ascent))
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .fold(0.0f32, f32::max);
        (width, v_metrics.ascent - v_metrics.descent)
    }

    fn top_left(&self, px: f32, text: &str, anchor: Anchor, at: (f32, f32)) -> (f32, f32) {
        let (w, h) = self.measure(px, text);
        match anchor {
            Anchor::BottomRight => (at.0 - w, at.1 - h),
            Anchor::Center => (at.0 - w / 2.0, at.1 - h / 2.0),
        }
    }

    /// Draws `text` alpha-blended onto `img`, optionally over a blurred shadow.
    pub fn draw(
        &self,
        img: &mut RgbaImage,
        px: f32,
        text: &str,
        anchor: Anchor,
        at: (f32, f32),
        color: Rgba<u8>,
        shadow: Option<Shadow>,
    ) {
        let (x, y) = self.top_left(px, text, anchor, at);
        if let Some(shadow) = shadow {
            self.draw_shadow(img, px, text, (x, y), shadow);
        }
        self.rasterize(img, px, text, (x, y), color);
    }

    fn draw_shadow(&self, img: &mut RgbaImage, px: f32, text: &str, at: (f32, f32), shadow: Shadow) {
        let (w, h) = self.measure(px, text);
        let margin = (shadow.blur * 2.0).ceil() as u32 + 1;
        let mut layer = RgbaImage::new(w.ceil() as u32 + margin * 2, h.ceil() as u32 + margin * 2);
        self.rasterize(&mut layer, px, text, (margin as f32, margin as f32), shadow.color);
        let layer = if shadow.blur > 0.0 {
            imageops::blur(&layer, shadow.blur / 2.0)
        } else {
            layer
        };
        imageops::overlay(
            img,
            &layer,
            at.0.round() as i64 + shadow.offset.0 as i64 - margin as i64,
            at.1.round() as i64 + shadow.offset.1 as i64 - margin as i64,
        );
    }

    fn rasterize(&self, img: &mut RgbaImage, px: f32, text: &str, at: (f32, f32), color: Rgba<u8>) {
        let scale = Scale::uniform(px);
        let v_metrics = self.font.v_metrics(scale);
        let origin = point(at.0, at.1 + v_metrics.ascent);
        for glyph in self.font.layout(text, scale, origin) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let x = gx as i32 + bb.min.x;
                let y = gy as i32 + bb.min.y;
                if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
                    return;
                }
                blend(img.get_pixel_mut(x as u32, y as u32), color, coverage);
            });
        }
    }
}

/// Source-over blend of `color` at the given glyph coverage.
pub fn blend(dst: &mut Rgba<u8>, color: Rgba<u8>, coverage: f32) {
    let sa = coverage.clamp(0.0, 1.0) * color.0[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let src = color.0[c] as f32 * sa;
        let below = dst.0[c] as f32 * da * (1.0 - sa);
        dst.0[c] = ((src + below) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_blend_replaces_the_pixel() {
        let mut px = Rgba([10, 20, 30, 255]);
        blend(&mut px, Rgba([200, 100, 50, 255]), 1.0);
        assert_eq!(px, Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn translucent_blend_mixes_over_an_opaque_background() {
        let mut px = Rgba([0, 0, 0, 255]);
        blend(&mut px, Rgba([255, 255, 255, 153]), 1.0);
        assert_eq!(px.0[3], 255);
        assert_eq!(px.0[0], 153);
    }

    #[test]
    fn zero_coverage_leaves_the_pixel_alone() {
        let mut px = Rgba([1, 2, 3, 4]);
        blend(&mut px, Rgba([255, 255, 255, 255]), 0.0);
        assert_eq!(px, Rgba([1, 2, 3, 4]));
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let err = Typeface::load(Path::new("/definitely/not/here.ttf")).unwrap_err();
        assert!(matches!(err, BoothError::ImageProcessing(_)));
    }

    #[test]
    fn unreadable_explicit_font_falls_back_to_the_bundled_face() {
        let face = Typeface::discover(Some(Path::new("/definitely/not/here.ttf"))).unwrap();
        assert_eq!(face.source, None);
    }

    #[test]
    fn measure_scales_with_pixel_size() {
        let face = Typeface::bundled().unwrap();
        assert_eq!(face.measure(20.0, ""), (0.0, 0.0));

        let (w_small, h_small) = face.measure(20.0, "THEMEBOOTH");
        let (w_big, h_big) = face.measure(40.0, "THEMEBOOTH");
        assert!(w_small > 0.0);
        assert!((h_small - 20.0).abs() < 1.0);
        assert!((w_big / w_small - 2.0).abs() < 0.1);
        assert!((h_big / h_small - 2.0).abs() < 0.1);
    }

    #[test]
    fn centered_text_stays_around_the_anchor() {
        let face = Typeface::bundled().unwrap();
        let mut img = RgbaImage::from_pixel(200, 100, Rgba([0, 0, 0, 255]));
        face.draw(&mut img, 30.0, "HI", Anchor::Center, (100.0, 50.0), Rgba([255, 255, 255, 255]), None);

        let lit: Vec<(u32, u32)> = img
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!lit.is_empty());
        assert!(lit.iter().all(|(x, y)| (60..140).contains(x) && (25..75).contains(y)));
    }

    #[test]
    fn shadow_darkens_pixels_beside_the_text() {
        let face = Typeface::bundled().unwrap();
        let shadow = Shadow {
            color: Rgba([0, 0, 0, 255]),
            offset: (3, 3),
            blur: 0.0,
        };
        let background = Rgba([255, 255, 255, 255]);
        let mut plain = RgbaImage::from_pixel(120, 60, background);
        let mut shaded = plain.clone();
        let at = (110.0, 50.0);
        face.draw(&mut plain, 24.0, "I", Anchor::BottomRight, at, Rgba([255, 0, 0, 255]), None);
        face.draw(&mut shaded, 24.0, "I", Anchor::BottomRight, at, Rgba([255, 0, 0, 255]), Some(shadow));

        let darker = plain
            .pixels()
            .zip(shaded.pixels())
            .filter(|(a, b)| b.0[1] < a.0[1] && b.0[0] < a.0[0])
            .count();
        assert!(darker > 0);
    }
}
