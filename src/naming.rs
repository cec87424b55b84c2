//! Filenames are the pipeline's protocol: every generated image encodes its
//! source identity and transform provenance in its name, and the first
//! [`CLASS_KEY_LEN`] characters of the stem are the ground-truth class label.
//!
//! Every constructor here keeps the originating source's stem as the leading
//! component, so `class_key` survives every transform unchanged. Classification
//! depends on that prefix verbatim; breaking it silently misfiles images.

use std::path::Path;

/// Number of leading stem characters that identify a class, e.g. `eg_00005`.
pub const CLASS_KEY_LEN: usize = 8;

/// Extension used for all generated images.
pub const OUTPUT_EXT: &str = "jpg";

/// Slicing axis, as encoded in output names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceAxis {
    Vertical,
    Horizontal,
}

impl SliceAxis {
    fn tag(self) -> char {
        match self {
            SliceAxis::Vertical => 'v',
            SliceAxis::Horizontal => 'h',
        }
    }
}

/// File stem without extension, e.g. `eg_00005_front` for `eg_00005_front.jpg`.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Class key of a file name: the first [`CLASS_KEY_LEN`] characters of its
/// stem (the whole stem when shorter).
pub fn class_key(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.chars().take(CLASS_KEY_LEN).collect()
}

/// Name for strip `index` (1-based) of a slice pass:
/// `{base}_v-{fraction}-{index}.jpg` or `{base}_h-{fraction}-{index}.jpg`.
pub fn slice_name(base: &str, axis: SliceAxis, fraction: f64, index: usize) -> String {
    format!("{base}_{}-{fraction}-{index}.{OUTPUT_EXT}", axis.tag())
}

/// Name for quadrant `quadrant` (1-based, reading order):
/// `{base}_c-0.25-{quadrant}.jpg`.
pub fn quadrant_name(base: &str, quadrant: usize) -> String {
    format!("{base}_c-0.25-{quadrant}.{OUTPUT_EXT}")
}

/// Name for a fixed-placement composite: `{fgBase}_{bgBase}.jpg`.
///
/// The foreground (the banknote) comes first so its class key stays the
/// leading prefix.
pub fn composite_name(fg_base: &str, bg_base: &str) -> String {
    format!("{fg_base}_{bg_base}.{OUTPUT_EXT}")
}

/// Name for iteration `iteration` (1-based) of a sampled-placement composite:
/// `{fgBase}_{bgBase}_r-{iteration}.jpg`.
pub fn sampled_name(fg_base: &str, bg_base: &str, iteration: usize) -> String {
    format!("{fg_base}_{bg_base}_r-{iteration}.{OUTPUT_EXT}")
}

/// Name for an untransformed copy of the source: `{base}.jpg`.
pub fn copy_name(base: &str) -> String {
    format!("{base}.{OUTPUT_EXT}")
}
