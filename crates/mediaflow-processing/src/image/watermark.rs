use anyhow::{Context, Result};
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use mediaflow_core::dimension::{fit_within, scale};
use mediaflow_core::{Dimension, ScalePercent};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Distance in pixels kept between the overlay and every frame edge it is anchored to
pub const WATERMARK_INSET: u32 = 10;

/// Watermark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkOptions {
    /// Clockwise rotation in degrees
    #[serde(default)]
    pub rotation: f64,
    pub position: WatermarkPosition,
    #[serde(default)]
    pub size: WatermarkSize,
    pub image_path: PathBuf,
}

/// Anchor of the overlay inside the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkPosition {
    Northwest,
    North,
    Northeast,
    West,
    Center,
    East,
    Southwest,
    South,
    Southeast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Start,
    Middle,
    End,
}

impl WatermarkPosition {
    fn anchors(self) -> (Anchor, Anchor) {
        use Anchor::*;
        match self {
            WatermarkPosition::Northwest => (Start, Start),
            WatermarkPosition::North => (Middle, Start),
            WatermarkPosition::Northeast => (End, Start),
            WatermarkPosition::West => (Start, Middle),
            WatermarkPosition::Center => (Middle, Middle),
            WatermarkPosition::East => (End, Middle),
            WatermarkPosition::Southwest => (Start, End),
            WatermarkPosition::South => (Middle, End),
            WatermarkPosition::Southeast => (End, End),
        }
    }

    /// Top-left offset of an `overlay` sized box inside `frame`, never negative.
    pub fn offset(self, frame: Dimension, overlay: (u32, u32)) -> (u32, u32) {
        let (horizontal, vertical) = self.anchors();
        (
            axis_offset(horizontal, frame.width, overlay.0),
            axis_offset(vertical, frame.height, overlay.1),
        )
    }
}

fn axis_offset(anchor: Anchor, frame: u32, overlay: u32) -> u32 {
    match anchor {
        Anchor::Start => WATERMARK_INSET,
        Anchor::Middle => frame.saturating_sub(overlay) / 2,
        Anchor::End => frame
            .saturating_sub(overlay)
            .saturating_sub(WATERMARK_INSET),
    }
}

/// Watermark size, either axis falling back to the overlay image's own
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatermarkSize {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Bound relative to the target frame, e.g. "20%"
    pub scale: Option<ScalePercent>,
}

/// Overlay written for an ffmpeg `overlay=x:y` filter
#[derive(Debug, Clone)]
pub struct PreparedOverlay {
    pub path: PathBuf,
    pub x: u32,
    pub y: u32,
}

/// Renders a configured overlay image onto frames of any size.
///
/// The overlay is decoded once; sizing, rotation and placement are computed
/// per target frame.
#[derive(Clone)]
pub struct WatermarkCompositor {
    options: WatermarkOptions,
    overlay: Arc<RgbaImage>,
}

impl WatermarkCompositor {
    /// Decode the overlay image. Blocking.
    pub fn load(options: WatermarkOptions) -> Result<Self> {
        let overlay = image::open(&options.image_path)
            .with_context(|| {
                format!(
                    "Failed to open watermark image {}",
                    options.image_path.display()
                )
            })?
            .to_rgba8();

        Ok(Self::from_image(options, overlay))
    }

    pub fn from_image(options: WatermarkOptions, overlay: RgbaImage) -> Self {
        Self {
            options,
            overlay: Arc::new(overlay),
        }
    }

    pub fn options(&self) -> &WatermarkOptions {
        &self.options
    }

    /// Overlay size for `frame`, before rotation.
    pub fn overlay_size(&self, frame: Dimension) -> Dimension {
        let size = &self.options.size;
        let mut target = Dimension::new(
            size.width.unwrap_or(self.overlay.width()),
            size.height.unwrap_or(self.overlay.height()),
        );

        if target.width > frame.width || target.height > frame.height {
            target = fit_within(target, frame);
        }
        if let Some(percent) = size.scale {
            target = fit_within(target, scale(frame, percent));
        }
        target
    }

    /// Resized and rotated overlay for `frame`.
    pub fn render_overlay(&self, frame: Dimension) -> RgbaImage {
        let size = self.overlay_size(frame);
        let resized = imageops::resize(
            self.overlay.as_ref(),
            size.width.max(1),
            size.height.max(1),
            imageops::FilterType::Lanczos3,
        );
        rotate(resized, self.options.rotation)
    }

    /// Overlay the watermark onto `base`.
    pub fn composite(&self, base: &DynamicImage) -> DynamicImage {
        let frame = Dimension::new(base.width(), base.height());
        let overlay = self.render_overlay(frame);
        let (x, y) = self
            .options
            .position
            .offset(frame, (overlay.width(), overlay.height()));

        let mut canvas = base.to_rgba8();
        imageops::overlay(&mut canvas, &overlay, i64::from(x), i64::from(y));
        DynamicImage::ImageRgba8(canvas)
    }

    /// Write the overlay for a `frame` sized video into `dir` as PNG.
    pub async fn prepare_for_video(&self, frame: Dimension, dir: &Path) -> Result<PreparedOverlay> {
        let compositor = self.clone();
        let path = dir.join(format!("{}.png", Uuid::new_v4()));
        let output = path.clone();

        let (width, height) = tokio::task::spawn_blocking(move || -> Result<(u32, u32)> {
            let overlay = compositor.render_overlay(frame);
            overlay
                .save_with_format(&output, image::ImageFormat::Png)
                .with_context(|| format!("Failed to write overlay {}", output.display()))?;
            Ok((overlay.width(), overlay.height()))
        })
        .await
        .context("Watermark task panicked")??;

        let (x, y) = self.options.position.offset(frame, (width, height));
        tracing::debug!(
            path = %path.display(),
            frame = %frame,
            x = x,
            y = y,
            "Prepared video watermark"
        );

        Ok(PreparedOverlay { path, x, y })
    }
}

/// Rotate clockwise by `degrees`. Right angles are lossless; other angles
/// rotate on a transparent canvas grown to the rotated bounding box.
fn rotate(image: RgbaImage, degrees: f64) -> RgbaImage {
    let degrees = degrees.rem_euclid(360.0);
    if degrees == 0.0 {
        return image;
    }
    if degrees == 90.0 {
        return imageops::rotate90(&image);
    }
    if degrees == 180.0 {
        return imageops::rotate180(&image);
    }
    if degrees == 270.0 {
        return imageops::rotate270(&image);
    }

    let theta = degrees.to_radians();
    let (w, h) = (f64::from(image.width()), f64::from(image.height()));
    let bound_w = (w * theta.cos().abs() + h * theta.sin().abs()).ceil() as u32;
    let bound_h = (w * theta.sin().abs() + h * theta.cos().abs()).ceil() as u32;

    let mut canvas = RgbaImage::from_pixel(bound_w, bound_h, Rgba([0, 0, 0, 0]));
    let x = (i64::from(bound_w) - i64::from(image.width())) / 2;
    let y = (i64::from(bound_h) - i64::from(image.height())) / 2;
    imageops::overlay(&mut canvas, &image, x, y);

    rotate_about_center(
        &canvas,
        theta as f32,
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    )
}
