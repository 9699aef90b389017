// src/render.rs
use ab_glyph::{FontVec, PxScale};
use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::{
    drawing::{draw_text_mut, text_size},
    filter::gaussian_blur_f32,
    geometric_transformations::{rotate, Interpolation},
};
use std::{fs, io::Cursor, path::Path};
use tracing::{info, warn};

use crate::{
    age::{month_text, year_text, WalletAge},
    error::AgeError,
};

/// Card bytes plus the headers they should be served with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub cache_control: &'static str,
}

pub trait AgeRenderer: Send + Sync {
    fn render(&self, age: &WalletAge) -> Result<RenderedImage, AgeError>;
}

const CACHE_CONTROL: &str = "public, max-age=300"; // 5 minutes
const FONT_SIZE: f32 = 100.0;
const TEXT_INSET_X: u32 = 400;
const TEXT_Y: u32 = 210;
const TILT_RAD: f32 = 0.165;
const LINE_OFFSET: i32 = 60;
const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const SHADOW_ALPHA: f32 = 0.5;
const SHADOW_SIGMA: f32 = 2.0;
const SHADOW_OFFSET: i64 = 2;
const BLANK: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Draws the age, tilted, in the top-right corner of a template PNG.
pub struct CardRenderer {
    template: RgbaImage,
    font: FontVec,
}

impl CardRenderer {
    pub fn new(template: RgbaImage, font: FontVec) -> Self {
        Self { template, font }
    }

    /// Plain white card, used when no template is on disk.
    pub fn blank(width: u32, height: u32, font: FontVec) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, BLANK), font)
    }

    /// Loads the font and template from disk. The font is required; a missing
    /// template falls back to a blank card of `fallback_size`.
    pub fn load(template_path: &Path, font_path: &Path, fallback_size: (u32, u32)) -> Result<Self, AgeError> {
        let font_bytes = fs::read(font_path)
            .map_err(|e| AgeError::Render(format!("font {}: {}", font_path.display(), e)))?;
        let font = FontVec::try_from_vec(font_bytes)
            .map_err(|e| AgeError::Render(format!("font {}: {}", font_path.display(), e)))?;

        if !template_path.exists() {
            warn!(
                "Card template {} not found, using a blank {}x{} card",
                template_path.display(),
                fallback_size.0,
                fallback_size.1
            );
            return Ok(Self::blank(fallback_size.0, fallback_size.1, font));
        }

        let template = image::open(template_path)
            .map_err(|e| AgeError::Render(format!("template {}: {}", template_path.display(), e)))?
            .to_rgba8();
        info!(
            "Loaded card template {} ({}x{})",
            template_path.display(),
            template.width(),
            template.height()
        );

        Ok(Self::new(template, font))
    }

    /// Text lines with their vertical offset from the anchor.
    fn lines(age: &WalletAge) -> Vec<(String, i32)> {
        match (age.years, age.months) {
            (y, m) if y > 0 && m > 0 => vec![(year_text(y), -LINE_OFFSET), (month_text(m), LINE_OFFSET)],
            (y, _) if y > 0 => vec![(year_text(y), 0)],
            (_, m) => vec![(month_text(m), 0)],
        }
    }

    /// Transparent layer with the label centred on `anchor`, then tilted about it.
    fn label_layer(&self, age: &WalletAge, width: u32, height: u32, anchor: (f32, f32)) -> RgbaImage {
        let scale = PxScale::from(FONT_SIZE);
        let mut layer = RgbaImage::new(width, height);

        for (line, dy) in Self::lines(age) {
            let (w, h) = text_size(scale, &self.font, &line);
            let x = anchor.0 as i32 - w as i32 / 2;
            let y = anchor.1 as i32 + dy - h as i32 / 2;
            draw_text_mut(&mut layer, TEXT_COLOR, x, y, scale, &self.font, &line);
        }

        rotate(&layer, anchor, TILT_RAD, Interpolation::Bilinear, Rgba([0, 0, 0, 0]))
    }
}

impl AgeRenderer for CardRenderer {
    fn render(&self, age: &WalletAge) -> Result<RenderedImage, AgeError> {
        let mut canvas = self.template.clone();
        let (width, height) = canvas.dimensions();
        if width <= TEXT_INSET_X || height <= TEXT_Y {
            return Err(AgeError::Render(format!(
                "card {}x{} is too small for the age label",
                width, height
            )));
        }

        let anchor = ((width - TEXT_INSET_X) as f32, TEXT_Y as f32);
        let label = self.label_layer(age, width, height, anchor);

        let mut shadow = label.clone();
        for px in shadow.pixels_mut() {
            *px = Rgba([0, 0, 0, (px[3] as f32 * SHADOW_ALPHA) as u8]);
        }
        let shadow = gaussian_blur_f32(&shadow, SHADOW_SIGMA);

        imageops::overlay(&mut canvas, &shadow, SHADOW_OFFSET, SHADOW_OFFSET);
        imageops::overlay(&mut canvas, &label, 0, 0);

        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| AgeError::Render(e.to_string()))?;

        Ok(RenderedImage {
            bytes,
            content_type: "image/png",
            cache_control: CACHE_CONTROL,
        })
    }
}
