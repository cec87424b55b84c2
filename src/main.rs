use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::PathBuf;

use noteforge::compositor::CanvasSize;
use noteforge::dedupe::{self, KeyStrategy};
use noteforge::materialize;
use noteforge::schedule::Schedule;

#[derive(Parser, Debug)]
#[command(
    name = "noteforge",
    version,
    about = "Generate and clean banknote image datasets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Materialize an augmented, classified dataset from canonical sources
    Generate {
        /// Directory of canonical source images (never mutated)
        #[arg(long, value_name = "DIR")]
        input: PathBuf,
        /// Flat staging directory (destroyed and recreated each run)
        #[arg(long, value_name = "DIR")]
        staging: PathBuf,
        /// Classified output directory (destroyed and recreated each run)
        #[arg(long, value_name = "DIR")]
        output: PathBuf,
        /// Directory of background scenes to composite onto
        #[arg(long, value_name = "DIR")]
        backgrounds: Option<PathBuf>,
        /// Directory of occluding layers (e.g. holding hands) to blend over
        #[arg(long, value_name = "DIR")]
        overlays: Option<PathBuf>,
        /// JSON schedule file; overrides the standard recipe
        #[arg(long, value_name = "FILE", conflicts_with_all = ["backgrounds", "overlays"])]
        schedule: Option<PathBuf>,
        /// Canvas size for composites, e.g. 1200x800
        #[arg(long, value_name = "WxH", default_value = "1200x800", value_parser = parse_canvas)]
        canvas: CanvasSize,
        /// Seed for sampled placements; omit for a fresh seed per run
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Find duplicate images; dry run unless --remove is given
    Dedupe {
        /// Dataset directory to scan
        #[arg(short, long, value_name = "DIR")]
        dataset: PathBuf,
        /// How images are matched
        #[arg(long, value_enum, default_value = "hash")]
        by: Strategy,
        /// Trailing filename characters treated as a resolution suffix
        #[arg(long, default_value_t = 9)]
        suffix_len: usize,
        /// Delete every duplicate except the first seen per group
        #[arg(short, long)]
        remove: bool,
        /// Write a side-by-side thumbnail strip per group into this directory
        #[arg(long, value_name = "DIR", conflicts_with = "remove")]
        preview: Option<PathBuf>,
        /// Skip the confirmation prompt before deleting
        #[arg(short, long)]
        yes: bool,
    },

    /// List removal history records for a dataset
    History {
        /// Dataset directory
        #[arg(short, long, value_name = "DIR")]
        dataset: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Strategy {
    /// Perceptual difference hash
    Hash,
    /// Exact byte content
    Exact,
    /// Filename with resolution suffix stripped
    Suffix,
}

fn parse_canvas(value: &str) -> std::result::Result<CanvasSize, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{value}'"))?;
    let width = w.parse().map_err(|_| format!("bad width '{w}'"))?;
    let height = h.parse().map_err(|_| format!("bad height '{h}'"))?;
    Ok(CanvasSize { width, height })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            staging,
            output,
            backgrounds,
            overlays,
            schedule,
            canvas,
            seed,
        } => {
            let schedule = match schedule {
                Some(path) => Schedule::from_json_file(&path)
                    .with_context(|| format!("Failed to load schedule {}", path.display()))?,
                None => {
                    let overlays = optional_images(overlays.as_deref())?;
                    let backgrounds = optional_images(backgrounds.as_deref())?;
                    Schedule::standard(&overlays, &backgrounds)
                }
            };

            let mut rng = match seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };

            println!("▶ Cleaning {} and {}", staging.display(), output.display());
            materialize::clean(&[staging.clone(), output.clone()])?;

            println!("▶ Generating from {}", input.display());
            let stats = materialize::materialize(&input, &schedule, &staging, canvas, &mut rng)?;
            println!(
                "Found images in '{}' = {} ({} skipped)",
                input.display(),
                stats.sources,
                stats.skipped
            );
            println!("Generated images = {}", stats.generated);

            let classified = materialize::classify(&staging, &output)?;
            println!(
                "Found classes in '{}' = {}",
                output.display(),
                classified.classes
            );
            println!(
                "✅ {} images classified into {}",
                classified.images,
                output.display()
            );
        }

        Commands::Dedupe {
            dataset,
            by,
            suffix_len,
            remove,
            preview,
            yes,
        } => {
            let strategy = match by {
                Strategy::Hash => KeyStrategy::Perceptual,
                Strategy::Exact => KeyStrategy::Exact,
                Strategy::Suffix => KeyStrategy::Suffix { len: suffix_len },
            };

            println!("▶ Scanning for duplicates in: {}", dataset.display());
            let groups = dedupe::find_groups(&dataset, strategy)?;
            if groups.is_empty() {
                println!("No duplicates found.");
                return Ok(());
            }

            println!("Found {} duplicate group(s):", groups.len());
            for (i, group) in groups.iter().enumerate() {
                println!(" Group {} [{}]:", i + 1, group.key);
                for (j, path) in group.paths.iter().enumerate() {
                    let marker = if j == 0 { "🏆" } else { "▶" };
                    println!("   {marker} {}", path.display());
                }
            }

            if let Some(preview_dir) = preview {
                fs::create_dir_all(&preview_dir).with_context(|| {
                    format!("Failed to create preview dir {}", preview_dir.display())
                })?;
                for (i, group) in groups.iter().enumerate() {
                    let strip = dedupe::thumbnail_strip(group)?;
                    let path = preview_dir.join(format!("group-{}.jpg", i + 1));
                    strip.save(&path)?;
                    println!("🖼️  Wrote {}", path.display());
                }
            }

            if !remove {
                println!("\n⚠️  Dry-run only; no files were changed.");
                return Ok(());
            }

            let pending: usize = groups.iter().map(|g| g.paths.len() - 1).sum();
            if !yes {
                let confirmed = dialoguer::Confirm::new()
                    .with_prompt(format!("Permanently delete {pending} file(s)?"))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Aborted; no files were changed.");
                    return Ok(());
                }
            }

            let removed = dedupe::remove_duplicates(&dataset, &groups)?;
            println!("Removed images: {removed}");
            println!(
                "✅ Recorded cull history in {}",
                dataset.join(".history.jsonl").display()
            );
        }

        Commands::History { dataset } => {
            let records = dedupe::read_history(&dataset)
                .with_context(|| format!("Could not read history for {}", dataset.display()))?;

            println!("🗂️  Cull History:");
            for (i, record) in records.iter().enumerate() {
                println!(
                    "[{}] {}\n     kept: {}\n     culled: {:?}\n",
                    i, record.timestamp, record.retained, record.culled
                );
            }
        }
    }

    Ok(())
}

/// Enumerate an optional asset directory; `None` yields an empty list.
fn optional_images(dir: Option<&std::path::Path>) -> Result<Vec<PathBuf>> {
    match dir {
        Some(dir) => Ok(materialize::enumerate_images(dir)
            .with_context(|| format!("Failed to list images under {}", dir.display()))?),
        None => Ok(Vec::new()),
    }
}
