//! Image Exporter
//!
//! Rasterizes a [`VisualComposition`] to PNG at a fixed upscale factor.
//! Every call paints from scratch; exported bytes are never reused.

use chrono::{DateTime, Utc};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use qrcode::{Color, QrCode};
use serde::Serialize;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use atomicwrites::{AtomicFile, OverwriteBehavior};

use crate::hashing::sha256_hex;
use crate::render::{
    text_width, Align, Element, PhotoShape, PhotoSource, Rect, VisualComposition, GLYPH_SIZE,
};
use crate::templates::{Rgb, BADGE_FILL, BADGE_TEXT, INK, PLACEHOLDER_FILL};

pub const DEFAULT_EXPORT_SCALE: u32 = 2;
pub const FILENAME_SUFFIX: &str = "-id-card.png";

const BORDER_WIDTH: u32 = 1;
/// Light modules kept around the symbol on every side.
const QR_QUIET_ZONE: u32 = 4;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static RASTERIZE_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_rasterize_call_count() -> u32 {
    RASTERIZE_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_rasterize_call_count() {
    RASTERIZE_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Nothing to export: no card is composed")]
    NotComposed,

    #[error("Rasterization failed: {0}")]
    Rasterize(String),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// One exported PNG and its metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedCard {
    pub id: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub size: [u32; 2],
    pub sha256: String,
    pub payload_fingerprint: String,
    #[serde(skip)]
    pub png: Vec<u8>,
}

impl ExportedCard {
    /// Write the PNG into `dir` under its filename. The file appears whole
    /// or not at all.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(&self.filename);
        let write_err = |message: String| ExportError::Write { path: path.clone(), message };

        std::fs::create_dir_all(dir).map_err(|err| write_err(err.to_string()))?;
        AtomicFile::new(&path, OverwriteBehavior::AllowOverwrite)
            .write(|f| {
                f.write_all(&self.png)?;
                f.flush()
            })
            .map_err(|err| write_err(err.to_string()))?;

        log::info!("wrote {}", path.display());
        Ok(path)
    }
}

/// Download filename: each run of whitespace or path separators in `name`
/// becomes one `-`, and leading dots become `-`, so the result is always a
/// bare file name.
pub fn export_filename(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    let mut in_gap = false;
    for c in name.chars() {
        if c.is_whitespace() || c == '/' || c == '\\' {
            if !in_gap {
                stem.push('-');
            }
            in_gap = true;
        } else if c == '.' && stem.chars().all(|p| p == '-') {
            stem.push('-');
            in_gap = false;
        } else {
            stem.push(c);
            in_gap = false;
        }
    }
    format!("{stem}{FILENAME_SUFFIX}")
}

pub struct Exporter {
    scale: u32,
}

impl Exporter {
    pub fn new(scale: u32) -> Self {
        Self { scale: scale.max(1) }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn export(&self, visual: Option<&VisualComposition>) -> Result<ExportedCard, ExportError> {
        let result = visual
            .ok_or(ExportError::NotComposed)
            .and_then(|visual| self.export_composition(visual));
        if let Err(err) = &result {
            log::error!("Error generating image: {err}");
        }
        result
    }

    fn export_composition(&self, visual: &VisualComposition) -> Result<ExportedCard, ExportError> {
        let canvas = self.rasterize(visual)?;
        let size = [canvas.width(), canvas.height()];

        let mut png = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(canvas).write_to(&mut png, ImageFormat::Png)?;
        let png = png.into_inner();

        Ok(ExportedCard {
            id: Uuid::new_v4().to_string(),
            filename: export_filename(&visual.student_name),
            created_at: Utc::now(),
            size,
            sha256: sha256_hex(&png),
            payload_fingerprint: visual.payload_fingerprint.clone(),
            png,
        })
    }

    /// Paint the composition onto a fresh canvas.
    pub fn rasterize(&self, visual: &VisualComposition) -> Result<RgbaImage, ExportError> {
        #[cfg(feature = "test-hooks")]
        RASTERIZE_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let mut painter = Painter {
            canvas: RgbaImage::from_pixel(
                visual.width * self.scale,
                visual.height * self.scale,
                rgba(visual.palette.background),
            ),
            scale: self.scale,
        };

        for element in visual.elements() {
            painter.element(element)?;
        }
        painter.frame(visual.palette.border, BORDER_WIDTH);

        Ok(painter.canvas)
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(DEFAULT_EXPORT_SCALE)
    }
}

fn rgba(color: Rgb) -> Rgba<u8> {
    Rgba([color[0], color[1], color[2], 0xff])
}

/// Draws in logical coordinates; every call multiplies by `scale`.
struct Painter {
    canvas: RgbaImage,
    scale: u32,
}

impl Painter {
    fn element(&mut self, element: &Element) -> Result<(), ExportError> {
        match element {
            Element::Rect { rect, color } => self.fill(*rect, *color),
            Element::Text { x, y, scale, color, align, content } => {
                self.text(*x, *y, *scale, *color, *align, content)
            }
            Element::Field { rect, label, value, align, background } => {
                if let Some(bg) = background {
                    self.fill(*rect, *bg);
                }
                let anchor = match align {
                    Align::Left => rect.x,
                    Align::Center => rect.x + rect.w / 2,
                    Align::Right => rect.x + rect.w,
                };
                let pad = if background.is_some() { 4 } else { 0 };
                self.text(anchor, rect.y + pad, 1, INK, *align, label);
                self.text(anchor, rect.y + pad + GLYPH_SIZE + 4, 1, INK, *align, value);
            }
            Element::Badge { rect, label } => {
                self.fill(*rect, BADGE_FILL);
                let text_y = rect.y + (rect.h - GLYPH_SIZE) / 2;
                self.text(rect.x + rect.w / 2, text_y, 1, BADGE_TEXT, Align::Center, label);
            }
            Element::Photo { rect, shape, source } => self.photo(*rect, *shape, source)?,
            Element::QrCode { rect, payload } => self.qr_code(*rect, payload)?,
        }
        Ok(())
    }

    fn put(&mut self, px: u32, py: u32, color: Rgba<u8>) {
        if px < self.canvas.width() && py < self.canvas.height() {
            self.canvas.put_pixel(px, py, color);
        }
    }

    /// Fill in device pixels.
    fn fill_px(&mut self, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
        for py in y..y.saturating_add(h) {
            for px in x..x.saturating_add(w) {
                self.put(px, py, color);
            }
        }
    }

    fn fill(&mut self, rect: Rect, color: Rgb) {
        let s = self.scale;
        self.fill_px(rect.x * s, rect.y * s, rect.w * s, rect.h * s, rgba(color));
    }

    fn frame(&mut self, color: Rgb, width: u32) {
        let (w, h) = (self.canvas.width(), self.canvas.height());
        let t = width * self.scale;
        let color = rgba(color);
        self.fill_px(0, 0, w, t, color);
        self.fill_px(0, h.saturating_sub(t), w, t, color);
        self.fill_px(0, 0, t, h, color);
        self.fill_px(w.saturating_sub(t), 0, t, h, color);
    }

    fn text(&mut self, x: u32, y: u32, scale: u32, color: Rgb, align: Align, content: &str) {
        let width = text_width(content, scale);
        let left = match align {
            Align::Left => x,
            Align::Center => x.saturating_sub(width / 2),
            Align::Right => x.saturating_sub(width),
        };

        let dot = scale * self.scale;
        let color = rgba(color);
        let cell = GLYPH_SIZE * dot;
        for (i, c) in content.chars().enumerate() {
            let glyph = BASIC_FONTS.get(c).or_else(|| BASIC_FONTS.get('?')).unwrap_or([0; 8]);
            let origin_x = left * self.scale + i as u32 * cell;
            let origin_y = y * self.scale;
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..8u32 {
                    if bits & (1u8 << col) != 0 {
                        self.fill_px(origin_x + col * dot, origin_y + row as u32 * dot, dot, dot, color);
                    }
                }
            }
        }
    }

    fn photo(&mut self, rect: Rect, shape: PhotoShape, source: &PhotoSource) -> Result<(), ExportError> {
        let (x, y) = (rect.x * self.scale, rect.y * self.scale);
        let (w, h) = (rect.w * self.scale, rect.h * self.scale);

        let pixels = match source {
            PhotoSource::Embedded { mime, bytes } => {
                let decoded = image::load_from_memory(bytes)
                    .map_err(|err| ExportError::Rasterize(format!("photo ({mime}) could not be decoded: {err}")))?
                    .to_rgba8();
                cover(&decoded, w, h)
            }
            PhotoSource::Placeholder => {
                self.fill(rect, PLACEHOLDER_FILL);
                let text_y = rect.y + (rect.h - GLYPH_SIZE) / 2;
                self.text(rect.x + rect.w / 2, text_y, 1, INK, Align::Center, "No Photo");
                return Ok(());
            }
        };

        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
        let radius = cx.min(cy);
        for (px, py, pixel) in pixels.enumerate_pixels() {
            if shape == PhotoShape::Circle {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
            }
            self.put(x + px, y + py, *pixel);
        }
        Ok(())
    }

    fn qr_code(&mut self, rect: Rect, payload: &str) -> Result<(), ExportError> {
        let code = QrCode::new(payload.as_bytes())
            .map_err(|err| ExportError::Rasterize(format!("QR payload could not be encoded: {err}")))?;
        let modules = code.width() as u32;
        let colors = code.to_colors();

        let size = rect.w.min(rect.h) * self.scale;
        let module = size / (modules + 2 * QR_QUIET_ZONE);
        if module == 0 {
            return Err(ExportError::Rasterize(format!(
                "QR code needs {} px with its quiet zone, box is {size} px",
                modules + 2 * QR_QUIET_ZONE
            )));
        }
        let offset = (size - module * modules) / 2;
        let (x0, y0) = (rect.x * self.scale + offset, rect.y * self.scale + offset);

        self.fill(rect, [0xff, 0xff, 0xff]);
        let dark = rgba([0, 0, 0]);
        for (i, color) in colors.iter().enumerate() {
            if matches!(color, Color::Dark) {
                let (mx, my) = (i as u32 % modules, i as u32 / modules);
                self.fill_px(x0 + mx * module, y0 + my * module, module, module, dark);
            }
        }
        Ok(())
    }
}

/// Center-crop `img` to the target aspect ratio, then resize to `w`x`h`.
fn cover(img: &RgbaImage, w: u32, h: u32) -> RgbaImage {
    let (iw, ih) = img.dimensions();
    let (cw, ch) = if iw as u64 * h as u64 > ih as u64 * w as u64 {
        ((ih as u64 * w as u64 / h as u64) as u32, ih)
    } else {
        (iw, (iw as u64 * h as u64 / w as u64) as u32)
    };
    let (cw, ch) = (cw.max(1), ch.max(1));
    let cropped = imageops::crop_imm(img, (iw - cw) / 2, (ih - ch) / 2, cw, ch).to_image();
    imageops::resize(&cropped, w, h, FilterType::Triangle)
}
