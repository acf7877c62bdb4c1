//! Sample loading from serialized spectrogram files.

use crate::error::{Error, Result};
use crate::pickle::read_rows;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default spectrogram shape: 628 frames of 128 mel bins.
pub const DEFAULT_INPUT_SHAPE: [usize; 2] = [628, 128];

/// Reference to one serialized spectrogram on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRef {
    pub id: u64,
    pub path: PathBuf,
}

/// A loaded spectrogram, row-major `[frames, bins]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    data: Vec<f32>,
    shape: [usize; 2],
}

impl Spectrogram {
    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// One spectrogram paired with its label vector.
#[derive(Debug, Clone)]
pub struct Sample {
    pub spectrogram: Spectrogram,
    pub label: Arc<[f32]>,
}

/// Load one spectrogram and check it is exactly `expected` (`[frames, bins]`).
///
/// Nested lists and numpy arrays are both accepted; integer values are
/// converted to `f32`.
pub fn load_spectrogram(path: &Path, expected: [usize; 2]) -> Result<Spectrogram> {
    let rows = read_rows(path)?;

    let frames = rows.len();
    let bins = rows.first().map_or(0, Vec::len);
    let ragged = rows.iter().find(|row| row.len() != bins);

    if let Some(row) = ragged {
        return Err(Error::ShapeMismatch {
            path: path.to_path_buf(),
            expected,
            found: [frames, row.len()],
        });
    }
    if [frames, bins] != expected {
        return Err(Error::ShapeMismatch {
            path: path.to_path_buf(),
            expected,
            found: [frames, bins],
        });
    }

    let mut data = Vec::with_capacity(frames * bins);
    for row in rows {
        data.extend(row);
    }

    Ok(Spectrogram {
        data,
        shape: expected,
    })
}

/// Load a sample's spectrogram and attach its already-resolved label.
pub fn load_sample(sample: &SampleRef, label: Arc<[f32]>, expected: [usize; 2]) -> Result<Sample> {
    let spectrogram = load_spectrogram(&sample.path, expected)?;
    Ok(Sample { spectrogram, label })
}
