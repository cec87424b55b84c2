//! Dataset hygiene: group images by an identity key and reduce every group
//! to a single survivor.
//!
//! Three key strategies share one pass shape. The survivor of a group is
//! always the first path discovered for its key: a positional rule, never a
//! content-based one.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::{imageops::FilterType, RgbImage};
use image_hasher::{HashAlg, HasherConfig};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::materialize::enumerate_images;

/// Edge length of the thumbnails in a preview strip.
const THUMB_SIZE: u32 = 150;

/// Grid size of the perceptual difference hash.
const HASH_SIZE: u32 = 4;

const HISTORY_FILE: &str = ".history.jsonl";

/// How two images are decided to be "the same".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Difference hash over a downsampled grayscale grid; resized or
    /// recompressed copies collapse to the same key.
    Perceptual,
    /// blake3 over the raw file bytes; byte-identical copies only.
    Exact,
    /// Base filename with a fixed-length trailing suffix stripped; models the
    /// same logical image fetched at several resolutions, where the suffix
    /// encodes the resolution (e.g. `img1__340.jpg` / `img1__480.jpg`).
    Suffix { len: usize },
}

/// All paths sharing one key, in discovery order. `paths[0]` is the survivor.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub key: String,
    pub paths: Vec<PathBuf>,
}

/// One removal pass over a group, appended to the dataset's history log.
#[derive(Serialize, Deserialize, Debug)]
pub struct CullRecord {
    pub timestamp: String,
    pub retained: String,
    pub culled: Vec<String>,
}

/// Scan `dir` and return every group with more than one member, keyed by
/// `strategy`. Groups come back in first-seen order; within a group, paths
/// keep the order the walk discovered them in.
pub fn find_groups(dir: &Path, strategy: KeyStrategy) -> Result<Vec<DuplicateGroup>> {
    let images = enumerate_images(dir)?;

    let keys: Vec<Option<String>> = match strategy {
        KeyStrategy::Suffix { len } => images
            .iter()
            .map(|path| Some(suffix_key(path, len)))
            .collect(),
        KeyStrategy::Exact => images
            .par_iter()
            .map(|path| match fs::read(path) {
                Ok(bytes) => Some(blake3::hash(&bytes).to_hex().to_string()),
                Err(err) => {
                    eprintln!("⚠️  Skipping unreadable file {}: {err}", path.display());
                    None
                }
            })
            .collect(),
        KeyStrategy::Perceptual => {
            let hasher = HasherConfig::new()
                .hash_alg(HashAlg::Gradient)
                .hash_size(HASH_SIZE, HASH_SIZE)
                .to_hasher();
            images
                .par_iter()
                .map(|path| match image::open(path) {
                    Ok(img) => Some(hasher.hash_image(&img).to_base64()),
                    Err(err) => {
                        eprintln!("⚠️  Skipping unreadable image {}: {err}", path.display());
                        None
                    }
                })
                .collect()
        }
    };

    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<PathBuf>> =
        std::collections::HashMap::new();
    for (path, key) in images.into_iter().zip(keys) {
        let Some(key) = key else { continue };
        let members = groups.entry(key.clone()).or_default();
        if members.is_empty() {
            order.push(key);
        }
        members.push(path);
    }

    Ok(order
        .into_iter()
        .filter_map(|key| {
            let paths = groups.remove(&key)?;
            (paths.len() > 1).then_some(DuplicateGroup { key, paths })
        })
        .collect())
}

/// Filename key with the trailing `len` characters of the file name removed
/// (the whole name when shorter).
fn suffix_key(path: &Path, len: usize) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let chars = name.chars().count();
    name.chars().take(chars.saturating_sub(len)).collect()
}

/// Delete every member of each group except its survivor, appending one
/// history record per group. Returns the number of files removed.
pub fn remove_duplicates(dataset: &Path, groups: &[DuplicateGroup]) -> Result<usize> {
    let history_file = dataset.join(HISTORY_FILE);
    let mut history_out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&history_file)?;

    let mut removed = 0;
    for group in groups {
        let mut culled = Vec::new();
        for path in &group.paths[1..] {
            fs::remove_file(path)?;
            culled.push(path.to_string_lossy().into_owned());
            removed += 1;
        }

        let record = CullRecord {
            timestamp: Utc::now().to_rfc3339(),
            retained: group.paths[0].to_string_lossy().into_owned(),
            culled,
        };
        writeln!(history_out, "{}", serde_json::to_string(&record)?)?;
    }
    Ok(removed)
}

/// Read back the dataset's removal history, skipping malformed lines.
pub fn read_history(dataset: &Path) -> Result<Vec<CullRecord>> {
    let file = fs::File::open(dataset.join(HISTORY_FILE))?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        if let Ok(record) = serde_json::from_str::<CullRecord>(&line?) {
            records.push(record);
        }
    }
    Ok(records)
}

/// Render a group as a horizontal strip of fixed-size thumbnails for human
/// review of a dry run.
pub fn thumbnail_strip(group: &DuplicateGroup) -> Result<RgbImage> {
    let mut strip = RgbImage::new(THUMB_SIZE * group.paths.len() as u32, THUMB_SIZE);
    for (i, path) in group.paths.iter().enumerate() {
        let thumb = image::open(path)?
            .resize_exact(THUMB_SIZE, THUMB_SIZE, FilterType::Triangle)
            .to_rgb8();
        image::imageops::replace(&mut strip, &thumb, (i as u32 * THUMB_SIZE) as i64, 0);
    }
    Ok(strip)
}
