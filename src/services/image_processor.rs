// src/services/image_processor.rs
use std::path::Path;

use chrono::Utc;
use image::{
    DynamicImage, GenericImageView, ImageFormat as ImgFormat, Rgba, RgbaImage, imageops,
};
use log::debug;
use uuid::Uuid;

use crate::config::Branding;
use crate::errors::BoothError;
use crate::models::{AspectRatio, EncodedImage, SourceImage};
use crate::services::typography::{Anchor, Shadow, Typeface};

pub const DEFAULT_MAX_SOURCE_DIMENSION: u32 = 2048;

const FRAME_BACKGROUND: Rgba<u8> = Rgba([17, 24, 39, 255]);
const FRAME_LABEL: Rgba<u8> = Rgba([103, 232, 249, 255]);
const FRAME_ATTRIBUTION: Rgba<u8> = Rgba([255, 255, 255, 102]);
const WATERMARK_FILL: Rgba<u8> = Rgba([255, 255, 255, 153]);
const WATERMARK_SHADOW: Shadow = Shadow {
    color: Rgba([0, 0, 0, 179]),
    offset: (2, 2),
    blur: 5.0,
};

/// Centered crop rectangle in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Computes the centered crop of a `width x height` image to `ratio`.
/// Wider sources keep their full height; everything else keeps full width.
pub fn crop_rect(width: u32, height: u32, ratio: AspectRatio) -> CropRect {
    let target = ratio.as_f64();
    let source = width as f64 / height as f64;
    if source > target {
        let kept = ((height as f64 * target).round() as u32).clamp(1, width);
        CropRect {
            x: (width - kept) / 2,
            y: 0,
            width: kept,
            height,
        }
    } else {
        let kept = ((width as f64 / target).round() as u32).clamp(1, height);
        CropRect {
            x: 0,
            y: (height - kept) / 2,
            width,
            height: kept,
        }
    }
}

/// Watermark geometry, all relative to image width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatermarkLayout {
    pub font_px: f32,
    pub padding: f32,
    /// Bottom-right corner of the text box.
    pub anchor: (f32, f32),
}

impl WatermarkLayout {
    pub fn new(width: u32, height: u32) -> Self {
        let padding = per_mille(width, 25);
        Self {
            font_px: font_px(width, 35, 12.0),
            padding,
            anchor: (width as f32 - padding, height as f32 - padding),
        }
    }
}

/// Framed-card geometry for a cropped image of the given size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub image_origin: (u32, u32),
    pub label: Option<TextLine>,
    pub title: TextLine,
    pub subtitle: TextLine,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLine {
    pub font_px: f32,
    /// Centre of the text box.
    pub center: (f32, f32),
}

impl FrameLayout {
    pub fn new(width: u32, height: u32, has_label: bool) -> Self {
        let w = width as f32;
        let h = height as f32;
        let side = per_mille(width, 40);
        let top = per_mille(width, 40);
        let bottom = per_mille(width, if has_label { 240 } else { 180 });

        let canvas_width = (w + side * 2.0).round() as u32;
        let canvas_height = (h + top + bottom).round() as u32;
        let cx = canvas_width as f32 / 2.0;
        let ch = canvas_height as f32;

        let label = has_label.then(|| TextLine {
            font_px: font_px(width, 80, 24.0),
            center: (cx, h + top + (bottom - per_mille(width, 100)) / 2.0),
        });

        Self {
            canvas_width,
            canvas_height,
            image_origin: (side.round() as u32, top.round() as u32),
            label,
            title: TextLine {
                font_px: font_px(width, 50, 12.0),
                center: (cx, ch - per_mille(width, 110)),
            },
            subtitle: TextLine {
                font_px: font_px(width, 35, 8.0),
                center: (cx, ch - per_mille(width, 50)),
            },
        }
    }
}

/// `width * n / 1000` as a pixel offset.
fn per_mille(width: u32, n: u32) -> f32 {
    (width as f64 * n as f64 / 1000.0) as f32
}

/// Floored width-relative font size with a lower bound.
fn font_px(width: u32, n: u32, min: f32) -> f32 {
    ((width as u64 * n as u64 / 1000) as f32).max(min)
}

pub struct ImageProcessor {
    typeface: Typeface,
    branding: Branding,
    max_source_dimension: u32,
}

impl ImageProcessor {
    pub fn new(typeface: Typeface, branding: Branding) -> Self {
        Self {
            typeface,
            branding,
            max_source_dimension: DEFAULT_MAX_SOURCE_DIMENSION,
        }
    }

    pub fn with_max_source_dimension(mut self, max: u32) -> Self {
        self.max_source_dimension = max;
        self
    }

    pub fn branding(&self) -> &Branding {
        &self.branding
    }

    /// Reads and normalizes an uploaded file.
    pub fn read_upload(&self, path: &Path) -> Result<SourceImage, BoothError> {
        let data = std::fs::read(path)
            .map_err(|e| BoothError::Decode(format!("Failed to read {}: {}", path.display(), e)))?;
        self.decode_upload(&data, None)
    }

    /// Decodes an upload into a [`SourceImage`], downscaling oversized photos.
    pub fn decode_upload(
        &self,
        data: &[u8],
        mime_hint: Option<&str>,
    ) -> Result<SourceImage, BoothError> {
        let (width, height) = self.validate_image(data)?;
        let mime_type = sniff_mime(data)
            .or(mime_hint)
            .unwrap_or("application/octet-stream")
            .to_string();

        let (image, width, height) =
            if width > self.max_source_dimension || height > self.max_source_dimension {
                let resized = self.resize_if_needed(data, self.max_source_dimension)?;
                let (w, h) = self.validate_image(&resized)?;
                debug!("Downscaled upload from {}x{} to {}x{}", width, height, w, h);
                (EncodedImage::png(resized), w, h)
            } else {
                (EncodedImage::new(data.to_vec(), mime_type), width, height)
            };

        Ok(SourceImage {
            id: Uuid::new_v4(),
            image,
            width,
            height,
            uploaded_at: Utc::now(),
        })
    }

    pub fn validate_image(&self, data: &[u8]) -> Result<(u32, u32), BoothError> {
        let img = image::load_from_memory(data)
            .map_err(|e| BoothError::Decode(format!("Invalid image format: {}", e)))?;
        Ok(img.dimensions())
    }

    pub fn resize_if_needed(&self, data: &[u8], max_size: u32) -> Result<Vec<u8>, BoothError> {
        let img = load(data)?;
        let (width, height) = img.dimensions();

        if width <= max_size && height <= max_size {
            return Ok(data.to_vec());
        }

        let ratio = (max_size as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);

        let resized = img.resize(new_width, new_height, imageops::FilterType::Lanczos3);
        encode_png(&resized)
    }

    /// Crops to `ratio` around the centre and re-encodes as PNG.
    pub fn crop_to_ratio(
        &self,
        image: &EncodedImage,
        ratio: AspectRatio,
    ) -> Result<EncodedImage, BoothError> {
        let cropped = crop(&load(&image.data)?, ratio);
        Ok(EncodedImage::png(encode_png(&cropped)?))
    }

    /// Draws the attribution string in the bottom-right corner.
    pub fn add_watermark(&self, image: &EncodedImage) -> Result<EncodedImage, BoothError> {
        let mut canvas = load(&image.data)?.to_rgba8();
        let layout = WatermarkLayout::new(canvas.width(), canvas.height());

        self.typeface.draw(
            &mut canvas,
            layout.font_px,
            &self.branding.watermark,
            Anchor::BottomRight,
            layout.anchor,
            WATERMARK_FILL,
            Some(WATERMARK_SHADOW),
        );

        Ok(EncodedImage::png(encode_png(&DynamicImage::ImageRgba8(canvas))?))
    }

    /// Builds the printable card: cropped image on a dark canvas with an
    /// optional uppercase label and two attribution lines underneath.
    pub fn framed_card(
        &self,
        image: &EncodedImage,
        ratio: AspectRatio,
        label: Option<&str>,
    ) -> Result<EncodedImage, BoothError> {
        let cropped = crop(&load(&image.data)?, ratio).to_rgba8();
        let layout = FrameLayout::new(cropped.width(), cropped.height(), label.is_some());

        let mut canvas =
            RgbaImage::from_pixel(layout.canvas_width, layout.canvas_height, FRAME_BACKGROUND);
        imageops::overlay(
            &mut canvas,
            &cropped,
            layout.image_origin.0 as i64,
            layout.image_origin.1 as i64,
        );

        if let (Some(text), Some(line)) = (label, layout.label) {
            self.typeface.draw(
                &mut canvas,
                line.font_px,
                &text.to_uppercase(),
                Anchor::Center,
                line.center,
                FRAME_LABEL,
                None,
            );
        }
        for (text, line) in [
            (&self.branding.frame_title, layout.title),
            (&self.branding.frame_subtitle, layout.subtitle),
        ] {
            self.typeface.draw(
                &mut canvas,
                line.font_px,
                text,
                Anchor::Center,
                line.center,
                FRAME_ATTRIBUTION,
                None,
            );
        }

        Ok(EncodedImage::png(encode_png(&DynamicImage::ImageRgba8(canvas))?))
    }
}

fn crop(img: &DynamicImage, ratio: AspectRatio) -> DynamicImage {
    let (width, height) = img.dimensions();
    let rect = crop_rect(width, height, ratio);
    img.crop_imm(rect.x, rect.y, rect.width, rect.height)
}

fn load(data: &[u8]) -> Result<DynamicImage, BoothError> {
    image::load_from_memory(data)
        .map_err(|e| BoothError::ImageProcessing(format!("Failed to load image: {}", e)))
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, BoothError> {
    let mut output = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
        .map_err(|e| BoothError::ImageProcessing(format!("Failed to encode image: {}", e)))?;
    Ok(output)
}

fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    let mime = match image::guess_format(data).ok()? {
        ImgFormat::Png => "image/png",
        ImgFormat::Jpeg => "image/jpeg",
        ImgFormat::WebP => "image/webp",
        ImgFormat::Gif => "image/gif",
        ImgFormat::Bmp => "image/bmp",
        ImgFormat::Tiff => "image/tiff",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> ImageProcessor {
        ImageProcessor::new(Typeface::bundled().unwrap(), Branding::default())
    }

    fn png(width: u32, height: u32) -> EncodedImage {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
        EncodedImage::png(encode_png(&DynamicImage::ImageRgba8(img)).unwrap())
    }

    fn dims(image: &EncodedImage) -> (u32, u32) {
        load(&image.data).unwrap().dimensions()
    }

    #[test]
    fn crop_keeps_ratio_and_stays_inside_the_source() {
        let ratios = [AspectRatio::SQUARE, AspectRatio::PORTRAIT, AspectRatio::new(4, 3).unwrap()];
        for (w, h) in [(1024, 1024), (1920, 1080), (1080, 1920), (333, 777), (640, 17)] {
            for ratio in ratios {
                let rect = crop_rect(w, h, ratio);
                assert!(rect.width <= w && rect.height <= h);
                let got = rect.width as f64 / rect.height as f64;
                let tolerance = ratio.as_f64().max(1.0) / rect.height.min(rect.width) as f64;
                assert!(
                    (got - ratio.as_f64()).abs() <= tolerance,
                    "{}x{} to {} gave {}x{}",
                    w,
                    h,
                    ratio,
                    rect.width,
                    rect.height
                );
            }
        }
    }

    #[test]
    fn wide_sources_are_trimmed_symmetrically_left_and_right() {
        let rect = crop_rect(1920, 1080, AspectRatio::SQUARE);
        assert_eq!(rect, CropRect { x: 420, y: 0, width: 1080, height: 1080 });
    }

    #[test]
    fn tall_sources_are_trimmed_top_and_bottom() {
        let rect = crop_rect(900, 2000, AspectRatio::PORTRAIT);
        assert_eq!(rect, CropRect { x: 0, y: 200, width: 900, height: 1600 });
    }

    #[test]
    fn watermark_font_scales_with_width_and_is_clamped() {
        let big = WatermarkLayout::new(1000, 800);
        assert_eq!(big.font_px, 35.0);
        assert_eq!(big.anchor, (975.0, 775.0));
        assert_eq!(WatermarkLayout::new(100, 100).font_px, 12.0);
    }

    #[test]
    fn frame_padding_depends_on_label() {
        let labelled = FrameLayout::new(1000, 1000, true);
        assert_eq!((labelled.canvas_width, labelled.canvas_height), (1080, 1280));
        assert_eq!(labelled.image_origin, (40, 40));
        let label = labelled.label.unwrap();
        assert_eq!(label.font_px, 80.0);
        assert_eq!(label.center, (540.0, 1110.0));

        let plain = FrameLayout::new(1000, 1000, false);
        assert_eq!(plain.canvas_height, 1220);
        assert!(plain.label.is_none());
        assert_eq!(plain.title.center, (540.0, 1110.0));
        assert_eq!(plain.subtitle.font_px, 35.0);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = processor().decode_upload(b"not an image", Some("image/png")).unwrap_err();
        assert!(matches!(err, BoothError::Decode(_)));
    }

    #[test]
    fn decode_sniffs_mime_and_keeps_small_images_untouched() {
        let upload = png(64, 48);
        let source = processor().decode_upload(&upload.data, Some("image/jpeg")).unwrap();
        assert_eq!(source.mime_type(), "image/png");
        assert_eq!((source.width, source.height), (64, 48));
        assert_eq!(source.data(), &upload.data);
        assert!(source.data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn decode_downscales_oversized_uploads() {
        let upload = png(400, 100);
        let source = processor()
            .with_max_source_dimension(200)
            .decode_upload(&upload.data, None)
            .unwrap();
        assert_eq!((source.width, source.height), (200, 50));
    }

    #[test]
    fn missing_upload_file_is_a_decode_error() {
        let err = processor().read_upload(Path::new("/no/such/photo.png")).unwrap_err();
        assert!(matches!(err, BoothError::Decode(_)));
    }

    #[test]
    fn crop_output_matches_the_rectangle() {
        let out = processor().crop_to_ratio(&png(300, 200), AspectRatio::SQUARE).unwrap();
        assert_eq!(out.mime_type, "image/png");
        assert_eq!(dims(&out), (200, 200));
    }

    #[test]
    fn watermark_is_drawn_in_the_bottom_right_corner() {
        let source = png(400, 300);
        let out = processor().add_watermark(&source).unwrap();
        assert_eq!(dims(&out), (400, 300));

        let before = load(&source.data).unwrap().to_rgba8();
        let after = load(&out.data).unwrap().to_rgba8();
        let changed: Vec<(u32, u32)> = before
            .enumerate_pixels()
            .filter(|(x, y, p)| after.get_pixel(*x, *y) != *p)
            .map(|(x, y, _)| (x, y))
            .collect();

        assert!(!changed.is_empty());
        // Everything drawn sits in the lower-right quadrant.
        assert!(changed.iter().all(|(x, y)| *x >= 200 && *y >= 150));
        let top_left_untouched = (0..100)
            .flat_map(|y| (0..100).map(move |x| (x, y)))
            .all(|(x, y)| after.get_pixel(x, y) == &Rgba([255, 0, 0, 255]));
        assert!(top_left_untouched);
    }

    /// Rows between the bottom of the photo and the top of the title line.
    fn label_band_has_ink(card: &EncodedImage, layout: &FrameLayout, photo_height: u32) -> bool {
        let rgba = load(&card.data).unwrap().to_rgba8();
        let start = layout.image_origin.1 + photo_height;
        let end = (layout.title.center.1 - layout.title.font_px) as u32;
        (start..end).any(|y| (0..rgba.width()).any(|x| *rgba.get_pixel(x, y) != FRAME_BACKGROUND))
    }

    #[test]
    fn label_band_is_inked_only_when_labelled() {
        let photo = png(500, 500);
        let labelled = processor()
            .framed_card(&photo, AspectRatio::SQUARE, Some("1970s"))
            .unwrap();
        let plain = processor().framed_card(&photo, AspectRatio::SQUARE, None).unwrap();

        assert!(label_band_has_ink(&labelled, &FrameLayout::new(500, 500, true), 500));
        assert!(!label_band_has_ink(&plain, &FrameLayout::new(500, 500, false), 500));
    }

    #[test]
    fn label_is_printed_uppercase() {
        let photo = png(300, 300);
        let lower = processor().framed_card(&photo, AspectRatio::SQUARE, Some("curls")).unwrap();
        let upper = processor().framed_card(&photo, AspectRatio::SQUARE, Some("CURLS")).unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn attribution_lines_are_drawn_below_the_photo() {
        let out = processor().framed_card(&png(500, 500), AspectRatio::SQUARE, None).unwrap();
        let layout = FrameLayout::new(500, 500, false);
        let rgba = load(&out.data).unwrap().to_rgba8();
        let start = (layout.title.center.1 - layout.title.font_px / 2.0) as u32;
        let inked = (start..layout.canvas_height)
            .flat_map(|y| (0..layout.canvas_width).map(move |x| (x, y)))
            .filter(|(x, y)| *rgba.get_pixel(*x, *y) != FRAME_BACKGROUND)
            .count();
        assert!(inked > 0);
    }

    #[test]
    fn framed_card_has_padded_dimensions_and_dark_border() {
        let out = processor()
            .framed_card(&png(500, 1000), AspectRatio::SQUARE, Some("1970s"))
            .unwrap();
        assert_eq!(dims(&out), (540, 640));
        let rgba = load(&out.data).unwrap().to_rgba8();
        assert_eq!(*rgba.get_pixel(0, 0), FRAME_BACKGROUND);
        assert_eq!(*rgba.get_pixel(270, 270), Rgba([255, 0, 0, 255]));
    }
}
