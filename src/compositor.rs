//! Alpha compositing of banknote foregrounds onto background scenes.
//!
//! Every composite is built on a transparent working canvas of a fixed,
//! per-run size so that all generated samples share identical dimensions,
//! then flattened to opaque RGB for saving (JPEG carries no alpha).

use image::{
    imageops, imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage,
};
use serde::{Deserialize, Serialize};

/// Fixed canvas dimensions for one materialization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
        }
    }
}

/// Where and how a foreground lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Uniform scale factor applied to both axes.
    pub scale: f32,
    /// Counter-clockwise rotation in degrees.
    pub rotation: f32,
    /// Pixel offset of the foreground's top-left corner on the canvas.
    /// May be negative or beyond the canvas; the paste simply clips.
    pub offset: (i64, i64),
}

impl Placement {
    pub fn new(scale: f32, rotation: f32, offset: (i64, i64)) -> Self {
        Self {
            scale,
            rotation,
            offset,
        }
    }
}

/// Composite `foreground` onto `background` within a fresh canvas.
///
/// The background is pasted at the origin and the scaled, rotated foreground
/// at `placement.offset`, masked by its own alpha channel. The result is
/// flattened over black and always has exactly `canvas` dimensions, however
/// large or small the inputs are. Deterministic for identical inputs.
pub fn composite(
    background: &DynamicImage,
    foreground: &DynamicImage,
    placement: &Placement,
    canvas: CanvasSize,
) -> RgbImage {
    // Re-composite the background onto a transparent buffer of its own size
    // so the paste below always starts from a clean alpha baseline.
    let bg_rgba = background.to_rgba8();
    let mut base = RgbaImage::new(bg_rgba.width(), bg_rgba.height());
    imageops::overlay(&mut base, &bg_rgba, 0, 0);

    let scaled_w = (foreground.width() as f32 * placement.scale).max(1.0) as u32;
    let scaled_h = (foreground.height() as f32 * placement.scale).max(1.0) as u32;
    let fg = foreground
        .resize_exact(scaled_w, scaled_h, FilterType::Triangle)
        .to_rgba8();
    let fg = rotate_expand(&fg, placement.rotation);

    let mut out = RgbaImage::new(canvas.width, canvas.height);
    imageops::overlay(&mut out, &base, 0, 0);
    imageops::overlay(&mut out, &fg, placement.offset.0, placement.offset.1);

    flatten(&out)
}

/// Blend `layer` directly over `base` with no geometry changes.
///
/// The layer is resized to exactly the base's dimensions and alpha-composited
/// at the origin; output size equals the base's size, not the canvas. Models
/// "object held in front of the camera" rather than "placed within a scene".
pub fn blend_over(base: &DynamicImage, layer: &DynamicImage) -> RgbImage {
    let base_rgba = base.to_rgba8();
    let mut out = RgbaImage::new(base_rgba.width(), base_rgba.height());
    imageops::overlay(&mut out, &base_rgba, 0, 0);

    let layer = layer
        .resize_exact(out.width(), out.height(), FilterType::Triangle)
        .to_rgba8();
    imageops::overlay(&mut out, &layer, 0, 0);

    flatten(&out)
}

/// Rotate an RGBA image counter-clockwise, expanding the output bounding box
/// so corners are never clipped. Newly exposed area is fully transparent.
fn rotate_expand(src: &RgbaImage, degrees: f32) -> RgbaImage {
    if degrees.rem_euclid(360.0) < f32::EPSILON {
        return src.clone();
    }

    let rad = degrees.to_radians();
    let (sin_a, cos_a) = rad.sin_cos();
    let (w, h) = (src.width() as f32, src.height() as f32);

    // The small bias keeps right-angle rotations from ceiling up a pixel
    // due to sin/cos rounding.
    let new_w = (w * cos_a.abs() + h * sin_a.abs() - 1e-3).ceil() as u32;
    let new_h = (w * sin_a.abs() + h * cos_a.abs() - 1e-3).ceil() as u32;

    let cx = w / 2.0;
    let cy = h / 2.0;
    let ncx = new_w as f32 / 2.0;
    let ncy = new_h as f32 / 2.0;

    let mut out = RgbaImage::new(new_w, new_h);
    for y in 0..new_h {
        for x in 0..new_w {
            // Inverse-map each output pixel into the source frame.
            let dx = x as f32 + 0.5 - ncx;
            let dy = y as f32 + 0.5 - ncy;
            let src_x = cx + dx * cos_a - dy * sin_a - 0.5;
            let src_y = cy + dx * sin_a + dy * cos_a - 0.5;
            out.put_pixel(x, y, bilinear_sample(src, src_x, src_y));
        }
    }
    out
}

/// Sample a pixel with bilinear interpolation; out-of-bounds is transparent.
fn bilinear_sample(img: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let (width, height) = img.dimensions();
    if x < -0.5 || y < -0.5 || x >= width as f32 - 0.5 || y >= height as f32 - 0.5 {
        return Rgba([0, 0, 0, 0]);
    }

    let xc = x.max(0.0).min(width as f32 - 1.0);
    let yc = y.max(0.0).min(height as f32 - 1.0);

    let x0 = xc.floor() as u32;
    let y0 = yc.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = xc - x0 as f32;
    let fy = yc - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut result = [0u8; 4];
    for c in 0..4 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;
        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(result)
}

/// Flatten RGBA over an opaque black backdrop.
fn flatten(canvas: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(canvas.width(), canvas.height());
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let a = pixel[3] as u16;
        out.put_pixel(
            x,
            y,
            Rgb([
                ((pixel[0] as u16 * a) / 255) as u8,
                ((pixel[1] as u16 * a) / 255) as u8,
                ((pixel[2] as u16 * a) / 255) as u8,
            ]),
        );
    }
    out
}
