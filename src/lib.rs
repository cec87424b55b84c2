//! noteforge: synthetic banknote dataset generation and dataset hygiene.
//!
//! From a small set of canonical banknote photos, the materializer produces a
//! much larger labeled corpus (slices, composites onto background scenes,
//! blends with occluding layers), names every output so that its class label
//! and provenance are derivable from the filename alone, and sorts the results
//! into one directory per class. The cleanup pass removes duplicate and
//! near-duplicate images from any dataset directory.

pub mod compositor;
pub mod dedupe;
pub mod error;
pub mod geometry;
pub mod materialize;
pub mod naming;
pub mod schedule;

pub use error::{DatasetError, Result};
