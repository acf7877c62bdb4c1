//! Error types.

use std::path::PathBuf;
use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A dataset file or directory could not be read.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file was readable but did not hold the expected serialized array.
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// A spectrogram did not have the configured `[frames, bins]` shape.
    #[error("Shape mismatch in {path}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        path: PathBuf,
        expected: [usize; 2],
        found: [usize; 2],
    },

    /// Dataset layout or label matrix is inconsistent.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Sample files and label rows disagree in count.
    #[error("Split '{split}' has {samples} sample files but {labels} label rows")]
    LengthMismatch {
        split: String,
        samples: usize,
        labels: usize,
    },

    /// The split holds neither samples nor labels.
    #[error("Split at {0} is empty")]
    EmptySplit(PathBuf),

    /// End of data for the current pass. Not a failure.
    #[error("Pipeline exhausted")]
    Exhausted,

    /// `next_batch` was called before the first `reinitialize`.
    #[error("Pipeline not initialized")]
    NotInitialized,

    /// Loader pool or producer thread failure.
    #[error("Worker error: {0}")]
    Worker(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the end-of-data sentinel.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Error::Exhausted)
    }
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
