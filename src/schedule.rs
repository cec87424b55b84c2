//! Explicit per-source transform schedule.
//!
//! The schedule replaces any hardcoded background/parameter tables: the
//! materializer receives the full list of steps to run against every source
//! image, and sampled steps draw from an injected seedable RNG so a run is
//! reproducible from its seed.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::compositor::Placement;
use crate::error::Result;

/// One transform invocation applied to every source image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Vertical strips of `fraction` of the source width each.
    SliceVertical { fraction: f64 },
    /// Horizontal strips of `fraction` of the source height each.
    SliceHorizontal { fraction: f64 },
    /// The four center quadrants.
    Quadrants,
    /// The source itself, copied into staging unchanged.
    CopyOriginal,
    /// Alpha-blend `layer` (e.g. a holding hand) over the full source.
    Overlay { layer: PathBuf },
    /// Composite the source onto `background` with fixed placement.
    Composite {
        background: PathBuf,
        placement: Placement,
    },
    /// Composite the source onto `background` `iterations` times, sampling a
    /// fresh placement per iteration.
    Sampled {
        background: PathBuf,
        iterations: u32,
        scale: (f32, f32),
        rotation: (f32, f32),
        offset_x: (i64, i64),
        offset_y: (i64, i64),
    },
}

impl Step {
    /// Draw the placements a `Sampled` step uses for one source image.
    pub fn sample_placements(&self, rng: &mut ChaCha8Rng) -> Vec<Placement> {
        match self {
            Step::Sampled {
                iterations,
                scale,
                rotation,
                offset_x,
                offset_y,
                ..
            } => (0..*iterations)
                .map(|_| {
                    Placement::new(
                        rng.gen_range(range_of(*scale)),
                        rng.gen_range(range_of(*rotation)),
                        (
                            rng.gen_range(range_of(*offset_x)),
                            rng.gen_range(range_of(*offset_y)),
                        ),
                    )
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn range_of<T: PartialOrd>(bounds: (T, T)) -> RangeInclusive<T> {
    bounds.0..=bounds.1
}

/// The full ordered schedule for one materialization run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    pub steps: Vec<Step>,
}

impl Schedule {
    /// The standard training recipe: half slices along both axes, the
    /// original copied verbatim, one blend per overlay layer, and one sampled
    /// placement per background scene.
    pub fn standard(overlays: &[PathBuf], backgrounds: &[PathBuf]) -> Self {
        let mut steps = vec![
            Step::SliceVertical { fraction: 0.5 },
            Step::SliceHorizontal { fraction: 0.5 },
            Step::CopyOriginal,
        ];

        for layer in overlays {
            steps.push(Step::Overlay {
                layer: layer.clone(),
            });
        }

        for background in backgrounds {
            steps.push(Step::Sampled {
                background: background.clone(),
                iterations: 1,
                scale: (0.5, 0.7),
                rotation: (-90.0, 90.0),
                offset_x: (-100, 850),
                offset_y: (80, 300),
            });
        }

        Schedule { steps }
    }

    /// Load a schedule from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
