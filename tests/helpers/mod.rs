//! Test helpers and fixtures for tagtune integration tests
//!
//! Datasets are written as small pickle files into a temp directory, and
//! training runs on the NdArray backend so no GPU is needed.

#![allow(dead_code)]

use serde_pickle::SerOptions;
use std::fs::File;
use std::path::Path;
use burn::backend::{Autodiff, NdArray};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use tagtune::{Activation, DevicePlacement, Split, TaggingModel, TrainConfig};

pub type TestBackend = Autodiff<NdArray<f32>>;

/// `[frames, bins]` of fixture spectrograms.
pub const TEST_SHAPE: [usize; 2] = [4, 3];

pub const TEST_CLASSES: [&str; 2] = ["rock", "jazz"];

pub fn write_pickle<T: serde::Serialize>(path: &Path, value: &T) {
    let mut file = File::create(path).expect("Failed to create pickle file");
    serde_pickle::to_writer(&mut file, value, SerOptions::new()).expect("Failed to write pickle");
}

/// Write `n` samples into `root/<split>`.
///
/// Sample `i` is filled with a signed ramp; its label tags "rock" for even
/// ids and "jazz" for odd ones.
pub fn write_split(root: &Path, split: Split, n: usize) {
    write_split_with_labels(root, split, n, (0..n).map(label_for).collect());
}

pub fn write_split_with_labels(root: &Path, split: Split, n: usize, labels: Vec<Vec<f64>>) {
    let dir = root.join(split.as_str());
    std::fs::create_dir_all(&dir).expect("Failed to create split directory");

    for i in 0..n {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        let spectrogram: Vec<Vec<f64>> = (0..TEST_SHAPE[0])
            .map(|f| {
                (0..TEST_SHAPE[1])
                    .map(|b| sign * (f * TEST_SHAPE[1] + b + 1) as f64 / 10.0)
                    .collect()
            })
            .collect();
        write_pickle(&dir.join(format!("{}.pickle", i)), &spectrogram);
    }
    write_pickle(&dir.join("labels.pickle"), &labels);
}

fn label_for(i: usize) -> Vec<f64> {
    if i % 2 == 0 {
        vec![1.0, 0.0]
    } else {
        vec![0.0, 1.0]
    }
}

/// Dataset root with `train` and `val` splits.
pub fn dataset(train: usize, val: usize) -> tempfile::TempDir {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    write_split(root.path(), Split::Train, train);
    write_split(root.path(), Split::Val, val);
    root
}

/// Small CPU config pointing at `root`.
pub fn test_config(root: &Path) -> TrainConfig {
    TrainConfig::default()
        .with_dataset_root(root)
        .with_input_shape(TEST_SHAPE)
        .with_classes(TEST_CLASSES)
        .with_batch_size(4)
        .with_epochs(2)
        .with_learning_rate(0.1)
        .with_num_workers(2)
        .with_seed(7)
        .with_device(DevicePlacement::Cpu)
}

/// Single dense layer over the flattened spectrogram.
#[derive(Module, Debug)]
pub struct TinyTagger<B: Backend> {
    dense: Linear<B>,
}

impl<B: Backend> TinyTagger<B> {
    pub fn new(device: &B::Device) -> Self {
        Self {
            dense: LinearConfig::new(TEST_SHAPE[0] * TEST_SHAPE[1], TEST_CLASSES.len()).init(device),
        }
    }
}

impl<B: Backend> TaggingModel<B> for TinyTagger<B> {
    fn forward(&self, spectrograms: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, frames, bins] = spectrograms.dims();
        sigmoid(self.dense.forward(spectrograms.reshape([batch, frames * bins])))
    }

    fn activation(&self) -> Activation {
        Activation::Sigmoid
    }
}
