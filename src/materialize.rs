//! Dataset materialization: clean the working directories, run the schedule
//! over every source image into a flat staging area, then classify staged
//! files into one directory per class key.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use rand_chacha::ChaCha8Rng;
use walkdir::WalkDir;

use crate::compositor::{self, CanvasSize};
use crate::error::{DatasetError, Result};
use crate::geometry;
use crate::naming::{self, SliceAxis};
use crate::schedule::{Schedule, Step};

/// Extensions treated as dataset images (case-insensitive).
pub const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png"];

const REMOVAL_POLL_INTERVAL: Duration = Duration::from_millis(50);
const REMOVAL_POLL_ATTEMPTS: u32 = 100;

#[derive(Debug, Default, Clone, Copy)]
pub struct MaterializeStats {
    pub sources: usize,
    pub generated: usize,
    pub skipped: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ClassifyStats {
    pub images: usize,
    pub classes: usize,
}

/// Delete and recreate every directory in `directories`.
///
/// Deletion of all directories is confirmed complete before any recreation
/// starts: recursive removal can finish asynchronously relative to this
/// process on some platforms, and recreating inside a tree that is still
/// vanishing would silently corrupt the run. Directories that do not exist
/// are fine; they are simply created.
pub fn clean(directories: &[PathBuf]) -> Result<()> {
    for dir in directories {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
    }
    for dir in directories {
        await_removal(dir)?;
    }
    for dir in directories {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn await_removal(dir: &Path) -> Result<()> {
    for _ in 0..REMOVAL_POLL_ATTEMPTS {
        if !dir.exists() {
            return Ok(());
        }
        thread::sleep(REMOVAL_POLL_INTERVAL);
    }
    Err(DatasetError::DeletionIncomplete(dir.to_path_buf()))
}

/// Recursively list all image files under `dir`, in walk order.
///
/// Callers must not rely on a particular order, with one documented
/// exception: the cleanup pass keeps the first-discovered member of each
/// duplicate group.
pub fn enumerate_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(DatasetError::SourceNotFound(dir.to_path_buf()));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(std::result::Result::ok) {
        let path = entry.path();
        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
                if IMAGE_EXTS.contains(&ext.to_lowercase().as_str()) {
                    images.push(path.to_path_buf());
                }
            }
        }
    }
    Ok(images)
}

/// Run `schedule` over every image under `input`, writing all outputs flat
/// into `staging`.
///
/// A source that fails to decode is reported and skipped; it never affects
/// other sources' outputs. Setup failures (missing directories, unreadable
/// backgrounds) abort the run.
pub fn materialize(
    input: &Path,
    schedule: &Schedule,
    staging: &Path,
    canvas: CanvasSize,
    rng: &mut ChaCha8Rng,
) -> Result<MaterializeStats> {
    let sources = enumerate_images(input)?;

    let bar = ProgressBar::new(sources.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.green} {pos}/{len} {msg}") {
        bar.set_style(style);
    }

    let mut stats = MaterializeStats {
        sources: sources.len(),
        ..Default::default()
    };

    for path in &sources {
        bar.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        let source = match image::open(path) {
            Ok(img) => img,
            Err(err) => {
                eprintln!("⚠️  Skipping unreadable image {}: {err}", path.display());
                stats.skipped += 1;
                bar.inc(1);
                continue;
            }
        };

        let base = naming::base_name(path);
        for step in &schedule.steps {
            stats.generated += run_step(path, &source, &base, step, staging, canvas, rng)?;
        }
        bar.inc(1);
    }

    bar.finish_and_clear();
    Ok(stats)
}

fn run_step(
    source_path: &Path,
    source: &DynamicImage,
    base: &str,
    step: &Step,
    staging: &Path,
    canvas: CanvasSize,
    rng: &mut ChaCha8Rng,
) -> Result<usize> {
    match step {
        Step::SliceVertical { fraction } => {
            let strips = geometry::slice_vertical(source, *fraction)?;
            save_strips(strips, base, SliceAxis::Vertical, *fraction, staging)
        }

        Step::SliceHorizontal { fraction } => {
            let strips = geometry::slice_horizontal(source, *fraction)?;
            save_strips(strips, base, SliceAxis::Horizontal, *fraction, staging)
        }

        Step::Quadrants => {
            let quads = geometry::slice_quadrants(source);
            for (i, quad) in quads.iter().enumerate() {
                quad.to_rgb8()
                    .save(staging.join(naming::quadrant_name(base, i + 1)))?;
            }
            Ok(4)
        }

        Step::CopyOriginal => match source_path.file_name() {
            Some(name) => {
                fs::copy(source_path, staging.join(name))?;
                Ok(1)
            }
            None => Ok(0),
        },

        Step::Overlay { layer } => {
            let layer_img = open_asset(layer)?;
            let blended = compositor::blend_over(source, &layer_img);
            let name = naming::composite_name(base, &naming::base_name(layer));
            blended.save(staging.join(name))?;
            Ok(1)
        }

        Step::Composite {
            background,
            placement,
        } => {
            let bg = open_asset(background)?;
            let out = compositor::composite(&bg, source, placement, canvas);
            let name = naming::composite_name(base, &naming::base_name(background));
            out.save(staging.join(name))?;
            Ok(1)
        }

        Step::Sampled { background, .. } => {
            let bg = open_asset(background)?;
            let bg_base = naming::base_name(background);
            let placements = step.sample_placements(rng);
            for (i, placement) in placements.iter().enumerate() {
                let out = compositor::composite(&bg, source, placement, canvas);
                out.save(staging.join(naming::sampled_name(base, &bg_base, i + 1)))?;
            }
            Ok(placements.len())
        }
    }
}

fn save_strips(
    strips: Vec<DynamicImage>,
    base: &str,
    axis: SliceAxis,
    fraction: f64,
    staging: &Path,
) -> Result<usize> {
    let count = strips.len();
    for (i, strip) in strips.into_iter().enumerate() {
        strip
            .to_rgb8()
            .save(staging.join(naming::slice_name(base, axis, fraction, i + 1)))?;
    }
    Ok(count)
}

/// Backgrounds and overlay layers are part of the run's configuration; one
/// that cannot be read aborts the run instead of silently thinning output.
fn open_asset(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| DatasetError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Move every staged image into `output/<class_key>/`, creating one
/// directory per distinct key. Refuses to overwrite an existing destination.
pub fn classify(staging: &Path, output: &Path) -> Result<ClassifyStats> {
    let images = enumerate_images(staging)?;

    let mut classes: Vec<String> = Vec::new();
    for path in &images {
        let key = naming::class_key(&path.file_name().unwrap_or_default().to_string_lossy());
        if !classes.contains(&key) {
            classes.push(key);
        }
    }

    for class in &classes {
        fs::create_dir_all(output.join(class))?;
    }

    for path in &images {
        let name = match path.file_name() {
            Some(name) => name.to_owned(),
            None => continue,
        };
        let key = naming::class_key(&name.to_string_lossy());
        let dest = output.join(&key).join(&name);
        if dest.exists() {
            return Err(DatasetError::DestinationCollision(dest));
        }
        fs::rename(path, &dest)?;
    }

    Ok(ClassifyStats {
        images: images.len(),
        classes: classes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn write_image(path: &Path, w: u32, h: u32, rgb: [u8; 3]) {
        let mut img = RgbImage::new(w, h);
        for pixel in img.pixels_mut() {
            *pixel = Rgb(rgb);
        }
        img.save(path).unwrap();
    }

    fn fixed_schedule() -> Schedule {
        Schedule {
            steps: vec![
                Step::SliceVertical { fraction: 0.5 },
                Step::SliceHorizontal { fraction: 0.5 },
                Step::CopyOriginal,
            ],
        }
    }

    #[test]
    fn test_clean_tolerates_missing_and_full_directories() {
        let tmp = TempDir::new().unwrap();
        let dir_a = tmp.path().join("a");
        let dir_b = tmp.path().join("b");

        fs::create_dir(&dir_a).unwrap();
        fs::write(dir_a.join("stale.jpg"), b"old").unwrap();

        clean(&[dir_a.clone(), dir_b.clone()]).unwrap();

        assert!(dir_a.exists() && fs::read_dir(&dir_a).unwrap().next().is_none());
        assert!(dir_b.exists() && fs::read_dir(&dir_b).unwrap().next().is_none());
    }

    #[test]
    fn test_enumerate_recurses_and_filters_extensions() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("deep/er");
        fs::create_dir_all(&nested).unwrap();
        write_image(&tmp.path().join("a.jpg"), 4, 4, [0, 0, 0]);
        write_image(&nested.join("b.png"), 4, 4, [0, 0, 0]);
        fs::write(tmp.path().join("notes.txt"), b"not an image").unwrap();

        let images = enumerate_images(tmp.path()).unwrap();
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn test_enumerate_missing_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            enumerate_images(&missing),
            Err(DatasetError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_vertical_halves_of_worked_example() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        let staging = tmp.path().join("tmp");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&staging).unwrap();
        write_image(&input.join("eg_00005_front.jpg"), 800, 600, [90, 90, 90]);

        let schedule = Schedule {
            steps: vec![Step::SliceVertical { fraction: 0.5 }],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let stats = materialize(
            &input,
            &schedule,
            &staging,
            CanvasSize::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(stats.generated, 2);

        for name in ["eg_00005_front_v-0.5-1.jpg", "eg_00005_front_v-0.5-2.jpg"] {
            let img = image::open(staging.join(name)).unwrap();
            assert_eq!(img.dimensions(), (400, 600));
            assert_eq!(naming::class_key(name), "eg_00005");
        }
    }

    #[test]
    fn test_every_staged_name_keeps_source_class_key() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        let staging = tmp.path().join("tmp");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&staging).unwrap();
        write_image(&input.join("eg_00005_front.jpg"), 64, 48, [10, 20, 30]);
        let background = tmp.path().join("background01.jpg");
        write_image(&background, 120, 80, [40, 40, 40]);
        let hand = tmp.path().join("hand1.jpg");
        write_image(&hand, 30, 30, [200, 180, 160]);

        let schedule = Schedule {
            steps: vec![
                Step::SliceVertical { fraction: 0.5 },
                Step::SliceHorizontal { fraction: 0.5 },
                Step::Quadrants,
                Step::CopyOriginal,
                Step::Overlay { layer: hand },
                Step::Composite {
                    background: background.clone(),
                    placement: crate::compositor::Placement::new(0.7, 30.0, (10, 10)),
                },
                Step::Sampled {
                    background,
                    iterations: 2,
                    scale: (0.5, 0.7),
                    rotation: (-35.0, 30.0),
                    offset_x: (-10, 60),
                    offset_y: (0, 40),
                },
            ],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let stats = materialize(
            &input,
            &schedule,
            &staging,
            CanvasSize {
                width: 128,
                height: 96,
            },
            &mut rng,
        )
        .unwrap();

        let staged = enumerate_images(&staging).unwrap();
        assert_eq!(staged.len(), stats.generated);
        assert!(stats.generated >= 12);
        for path in staged {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert_eq!(naming::class_key(&name), "eg_00005", "name was {name}");
        }
    }

    #[test]
    fn test_unreadable_source_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        let staging = tmp.path().join("tmp");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&staging).unwrap();
        write_image(&input.join("eg_00005_front.jpg"), 32, 32, [1, 2, 3]);
        fs::write(input.join("eg_00009_bogus.jpg"), b"not a jpeg").unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let stats = materialize(
            &input,
            &fixed_schedule(),
            &staging,
            CanvasSize::default(),
            &mut rng,
        )
        .unwrap();

        assert_eq!(stats.sources, 2);
        assert_eq!(stats.skipped, 1);
        assert!(stats.generated > 0);
    }

    #[test]
    fn test_classify_groups_by_key_and_counts() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join("tmp");
        let output = tmp.path().join("out");
        fs::create_dir_all(&staging).unwrap();
        fs::create_dir_all(&output).unwrap();
        write_image(&staging.join("eg_00005_front_v-0.5-1.jpg"), 8, 8, [0, 0, 0]);
        write_image(&staging.join("eg_00005_back.jpg"), 8, 8, [0, 0, 0]);
        write_image(&staging.join("sa_00050_front.jpg"), 8, 8, [0, 0, 0]);

        let stats = classify(&staging, &output).unwrap();
        assert_eq!(stats.images, 3);
        assert_eq!(stats.classes, 2);

        assert!(output.join("eg_00005/eg_00005_front_v-0.5-1.jpg").exists());
        assert!(output.join("eg_00005/eg_00005_back.jpg").exists());
        assert!(output.join("sa_00050/sa_00050_front.jpg").exists());
        // Moved, not copied.
        assert!(enumerate_images(&staging).unwrap().is_empty());
    }

    #[test]
    fn test_classify_refuses_to_clobber() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join("tmp");
        let output = tmp.path().join("out");
        fs::create_dir_all(&staging).unwrap();
        fs::create_dir_all(output.join("eg_00005")).unwrap();
        write_image(&staging.join("eg_00005_front.jpg"), 8, 8, [0, 0, 0]);
        write_image(&output.join("eg_00005/eg_00005_front.jpg"), 8, 8, [9, 9, 9]);

        assert!(matches!(
            classify(&staging, &output),
            Err(DatasetError::DestinationCollision(_))
        ));
    }

    #[test]
    fn test_regeneration_is_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        fs::create_dir_all(&input).unwrap();
        write_image(&input.join("eg_00005_front.jpg"), 100, 60, [120, 50, 70]);
        let staging = tmp.path().join("tmp");
        let output = tmp.path().join("out");

        let run = || -> Vec<(PathBuf, Vec<u8>)> {
            clean(&[staging.clone(), output.clone()]).unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(5);
            materialize(
                &input,
                &fixed_schedule(),
                &staging,
                CanvasSize::default(),
                &mut rng,
            )
            .unwrap();
            classify(&staging, &output).unwrap();

            let mut files: Vec<(PathBuf, Vec<u8>)> = enumerate_images(&output)
                .unwrap()
                .into_iter()
                .map(|p| {
                    let rel = p.strip_prefix(&output).unwrap().to_path_buf();
                    let bytes = fs::read(&p).unwrap();
                    (rel, bytes)
                })
                .collect();
            files.sort();
            files
        };

        let first = run();
        let second = run();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
