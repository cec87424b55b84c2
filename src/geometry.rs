//! Pure slicing operations used to multiply one banknote photo into several
//! partial views. No I/O; callers pair each returned buffer with a name from
//! [`crate::naming`].

use image::{DynamicImage, GenericImageView};

use crate::error::{DatasetError, Result};

/// Slice an image into `floor(1/fraction)` vertical strips, left to right.
///
/// Each strip is `floor(width * fraction)` pixels wide and starts where the
/// previous one ended. Pixels to the right of the last full strip are dropped;
/// a fraction that does not evenly divide 1 never produces a partial strip.
pub fn slice_vertical(image: &DynamicImage, fraction: f64) -> Result<Vec<DynamicImage>> {
    let count = strip_count(fraction)?;
    let strip_w = (image.width() as f64 * fraction) as u32;

    let mut strips = Vec::with_capacity(count as usize);
    for i in 0..count {
        strips.push(image.crop_imm(i * strip_w, 0, strip_w, image.height()));
    }
    Ok(strips)
}

/// Slice an image into `floor(1/fraction)` horizontal strips, top to bottom.
/// Same remainder policy as [`slice_vertical`].
pub fn slice_horizontal(image: &DynamicImage, fraction: f64) -> Result<Vec<DynamicImage>> {
    let count = strip_count(fraction)?;
    let strip_h = (image.height() as f64 * fraction) as u32;

    let mut strips = Vec::with_capacity(count as usize);
    for i in 0..count {
        strips.push(image.crop_imm(0, i * strip_h, image.width(), strip_h));
    }
    Ok(strips)
}

/// Split an image into its four quadrants around the center pixel, in reading
/// order (top-left, top-right, bottom-left, bottom-right).
///
/// For odd dimensions the left/top quadrants get the truncated half and the
/// right/bottom quadrants the remainder, so the four pieces tile the source
/// exactly.
pub fn slice_quadrants(image: &DynamicImage) -> [DynamicImage; 4] {
    let (w, h) = (image.width(), image.height());
    let (mx, my) = (w / 2, h / 2);

    [
        image.crop_imm(0, 0, mx, my),
        image.crop_imm(mx, 0, w - mx, my),
        image.crop_imm(0, my, mx, h - my),
        image.crop_imm(mx, my, w - mx, h - my),
    ]
}

fn strip_count(fraction: f64) -> Result<u32> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(DatasetError::InvalidFraction(fraction));
    }
    Ok((1.0 / fraction) as u32)
}
