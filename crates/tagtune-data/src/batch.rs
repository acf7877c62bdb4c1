//! Batched samples ready for the training engine.

use crate::loader::Sample;

/// A group of samples flattened row-major.
///
/// `spectrograms` has shape `[len, frames, bins]`, `labels` has shape
/// `[len, num_classes]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub spectrograms: Vec<f32>,
    pub labels: Vec<f32>,
    pub len: usize,
    pub input_shape: [usize; 2],
    pub num_classes: usize,
}

impl Batch {
    /// Stack loaded samples. All samples must share `input_shape` and label width.
    pub fn from_samples(samples: Vec<Sample>, input_shape: [usize; 2], num_classes: usize) -> Self {
        let len = samples.len();
        let mut spectrograms = Vec::with_capacity(len * input_shape[0] * input_shape[1]);
        let mut labels = Vec::with_capacity(len * num_classes);

        for sample in samples {
            labels.extend_from_slice(&sample.label);
            spectrograms.extend(sample.spectrogram.into_data());
        }

        Self {
            spectrograms,
            labels,
            len,
            input_shape,
            num_classes,
        }
    }

    /// `[len, frames, bins]`
    pub fn spectrogram_dims(&self) -> [usize; 3] {
        [self.len, self.input_shape[0], self.input_shape[1]]
    }

    /// `[len, num_classes]`
    pub fn label_dims(&self) -> [usize; 2] {
        [self.len, self.num_classes]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
