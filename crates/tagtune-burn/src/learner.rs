//! Optimizer steps and accuracy counting on Burn tensors.

use crate::error::{Error, Result};
use crate::model::{Activation, TaggingModel};
use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, TensorData};
use std::marker::PhantomData;
use tagtune_data::Batch;

/// Correct element predictions out of `total` (batch x classes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchAccuracy {
    pub correct: u64,
    pub total: u64,
}

impl BatchAccuracy {
    pub fn merge(self, other: BatchAccuracy) -> BatchAccuracy {
        BatchAccuracy {
            correct: self.correct + other.correct,
            total: self.total + other.total,
        }
    }

    /// Fraction correct; 0.0 when nothing was counted.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Convert a flat batch into `([batch, frames, bins], [batch, classes])` tensors.
pub fn batch_tensors<B: Backend>(
    batch: &Batch,
    device: &B::Device,
) -> Result<(Tensor<B, 3>, Tensor<B, 2>)> {
    let input_dims = batch.spectrogram_dims();
    let label_dims = batch.label_dims();

    if batch.spectrograms.len() != input_dims.iter().product::<usize>() {
        return Err(Error::Shape(format!(
            "spectrogram buffer holds {} values, expected {:?}",
            batch.spectrograms.len(),
            input_dims
        )));
    }
    if batch.labels.len() != label_dims.iter().product::<usize>() {
        return Err(Error::Shape(format!(
            "label buffer holds {} values, expected {:?}",
            batch.labels.len(),
            label_dims
        )));
    }

    let spectrograms = Tensor::from_data(
        TensorData::new(batch.spectrograms.clone(), input_dims),
        device,
    );
    let labels = Tensor::from_data(TensorData::new(batch.labels.clone(), label_dims), device);
    Ok((spectrograms, labels))
}

/// Count element-wise correct tag predictions.
///
/// A tag is predicted when its score exceeds the activation's decision
/// threshold and present when its label exceeds 0.5.
pub fn count_correct<B: Backend>(
    scores: Tensor<B, 2>,
    labels: Tensor<B, 2>,
    activation: Activation,
) -> BatchAccuracy {
    let [batch, classes] = scores.dims();
    let predicted = scores.greater_elem(activation.decision_threshold());
    let actual = labels.greater_elem(0.5);
    let correct: i64 = predicted.equal(actual).int().sum().into_scalar().elem();

    BatchAccuracy {
        correct: correct as u64,
        total: (batch * classes) as u64,
    }
}

/// Owns the model and optimizer; runs one step per batch.
pub struct Learner<B, M, O>
where
    B: AutodiffBackend,
    M: TaggingModel<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    model: M,
    optimizer: O,
    learning_rate: f64,
    device: B::Device,
    steps: u64,
    loss: MseLoss,
}

impl<B, M, O> Learner<B, M, O>
where
    B: AutodiffBackend,
    M: TaggingModel<B> + AutodiffModule<B>,
    M::InnerModule: TaggingModel<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    pub fn new(model: M, optimizer: O, learning_rate: f64, device: B::Device) -> Self {
        Self {
            model,
            optimizer,
            learning_rate,
            device,
            steps: 0,
            loss: MseLoss::new(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Optimizer steps taken so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Forward, mean squared error, backward and one optimizer update.
    ///
    /// Returns the batch loss. A non-finite loss aborts before the update.
    pub fn train_step(&mut self, batch: &Batch) -> Result<f32> {
        let (spectrograms, labels) = batch_tensors::<B>(batch, &self.device)?;

        let output = self.model.forward(spectrograms);
        let loss = self.loss.forward(output, labels, Reduction::Mean);
        let value: f32 = loss.clone().into_scalar().elem();

        self.steps += 1;
        if !value.is_finite() {
            return Err(Error::NonFiniteLoss {
                step: self.steps,
                value,
            });
        }

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        self.model = self
            .optimizer
            .step(self.learning_rate, self.model.clone(), grads);

        Ok(value)
    }

    /// Snapshot the current parameters for evaluation without autodiff.
    pub fn evaluator(&self) -> Evaluator<B::InnerBackend, M::InnerModule> {
        Evaluator::new(self.model.valid(), self.device.clone())
    }
}

/// Evaluation-mode model snapshot.
pub struct Evaluator<B: Backend, M: TaggingModel<B>> {
    model: M,
    device: B::Device,
    _backend: PhantomData<B>,
}

impl<B: Backend, M: TaggingModel<B>> Evaluator<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            _backend: PhantomData,
        }
    }

    pub fn evaluate(&self, batch: &Batch) -> Result<BatchAccuracy> {
        let (spectrograms, labels) = batch_tensors::<B>(batch, &self.device)?;
        let scores = self.model.forward(spectrograms);
        Ok(count_correct(scores, labels, self.model.activation()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SpotifyNetConfig;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::SgdConfig;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    fn batch(len: usize, frames: usize, bins: usize, classes: usize) -> Batch {
        let spectrograms = (0..len * frames * bins)
            .map(|i| ((i % 7) as f32 - 3.0) / 3.0)
            .collect();
        let labels = (0..len * classes).map(|i| (i % 2) as f32).collect();
        Batch {
            spectrograms,
            labels,
            len,
            input_shape: [frames, bins],
            num_classes: classes,
        }
    }

    #[test]
    fn test_batch_tensors_shapes() {
        let device = NdArrayDevice::default();
        let (x, y) = batch_tensors::<TestBackend>(&batch(3, 4, 2, 5), &device).unwrap();
        assert_eq!(x.dims(), [3, 4, 2]);
        assert_eq!(y.dims(), [3, 5]);
    }

    #[test]
    fn test_batch_tensors_rejects_bad_buffer() {
        let device = NdArrayDevice::default();
        let mut b = batch(2, 4, 2, 3);
        b.spectrograms.pop();
        assert!(matches!(
            batch_tensors::<TestBackend>(&b, &device),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn test_count_correct_sigmoid() {
        let device = NdArrayDevice::default();
        let scores = Tensor::<TestBackend, 2>::from_floats([[0.9, 0.2], [0.5, 0.7]], &device);
        let labels = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0], [1.0, 1.0]], &device);

        // 0.5 is not above the threshold, so element [1][0] is wrong.
        let acc = count_correct(scores, labels, Activation::Sigmoid);
        assert_eq!(acc, BatchAccuracy { correct: 3, total: 4 });
        assert_eq!(acc.fraction(), 0.75);
    }

    #[test]
    fn test_count_correct_linear() {
        let device = NdArrayDevice::default();
        let scores = Tensor::<TestBackend, 2>::from_floats([[2.0, -1.0, 0.1]], &device);
        let labels = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0, 0.0]], &device);

        let acc = count_correct(scores, labels, Activation::Linear);
        assert_eq!(acc, BatchAccuracy { correct: 2, total: 3 });
    }

    #[test]
    fn test_merge_and_empty_fraction() {
        let a = BatchAccuracy { correct: 3, total: 4 };
        let b = BatchAccuracy { correct: 1, total: 4 };
        assert_eq!(a.merge(b).fraction(), 0.5);
        assert_eq!(BatchAccuracy::default().fraction(), 0.0);
    }

    #[test]
    fn test_train_step_updates_and_counts() {
        let device = NdArrayDevice::default();
        let model = SpotifyNetConfig::new(3)
            .with_input_bins(4)
            .with_conv_channels(4)
            .with_hidden(8)
            .init::<TestAutodiffBackend>(&device);
        let optimizer = SgdConfig::new().init();
        let mut learner: Learner<TestAutodiffBackend, _, _> =
            Learner::new(model, optimizer, 1e-2, device);

        let b = batch(2, 64, 4, 3);
        let first = learner.train_step(&b).unwrap();
        assert!(first.is_finite());
        learner.train_step(&b).unwrap();
        assert_eq!(learner.steps(), 2);
    }

    #[test]
    fn test_evaluator_is_deterministic() {
        let device = NdArrayDevice::default();
        let model = SpotifyNetConfig::new(3)
            .with_input_bins(4)
            .with_conv_channels(4)
            .with_hidden(8)
            .init::<TestAutodiffBackend>(&device);
        let learner: Learner<TestAutodiffBackend, _, _> =
            Learner::new(model, SgdConfig::new().init(), 1e-3, device);

        let b = batch(4, 64, 4, 3);
        let evaluator = learner.evaluator();
        let first = evaluator.evaluate(&b).unwrap();
        let second = learner.evaluator().evaluate(&b).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total, 12);
    }
}
