//! Tagging model contract and the default convolutional tagger.

use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::pool::{MaxPool1d, MaxPool1dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{relu, sigmoid};
use serde::{Deserialize, Serialize};

/// Output activation of a tagging model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Scores are probabilities in `[0, 1]`.
    #[default]
    Sigmoid,
    /// Scores are raw logits.
    Linear,
}

impl Activation {
    /// Score above which a tag counts as predicted.
    pub fn decision_threshold(&self) -> f32 {
        match self {
            Activation::Sigmoid => 0.5,
            Activation::Linear => 0.0,
        }
    }
}

/// Forward-pass provider for multi-label tagging.
///
/// Input is `[batch, frames, bins]`, output is `[batch, num_classes]`.
pub trait TaggingModel<B: Backend>: Module<B> {
    fn forward(&self, spectrograms: Tensor<B, 3>) -> Tensor<B, 2>;

    fn activation(&self) -> Activation;
}

/// Configuration for [`SpotifyNet`].
#[derive(Config, Debug)]
pub struct SpotifyNetConfig {
    pub num_classes: usize,
    #[config(default = "Activation::Sigmoid")]
    pub activation: Activation,
    /// Mel bins per frame; these are the convolution input channels.
    #[config(default = 128)]
    pub input_bins: usize,
    #[config(default = 256)]
    pub conv_channels: usize,
    #[config(default = 512)]
    pub hidden: usize,
}

impl SpotifyNetConfig {
    /// Shortest spectrogram, in frames, that survives the conv/pool stack.
    pub const MIN_FRAMES: usize = 47;

    pub fn init<B: Backend>(&self, device: &B::Device) -> SpotifyNet<B> {
        let c = self.conv_channels;
        SpotifyNet {
            conv1: Conv1dConfig::new(self.input_bins, c, 4).init(device),
            pool1: MaxPool1dConfig::new(4).with_stride(4).init(),
            conv2: Conv1dConfig::new(c, c, 4).init(device),
            pool2: MaxPool1dConfig::new(2).with_stride(2).init(),
            conv3: Conv1dConfig::new(c, 2 * c, 4).init(device),
            // mean, max and L2 pooling of the last conv layer
            dense: LinearConfig::new(3 * 2 * c, self.hidden).init(device),
            output: LinearConfig::new(self.hidden, self.num_classes).init(device),
            sigmoid_output: self.activation == Activation::Sigmoid,
        }
    }
}

/// Temporal convolutions over mel bins followed by global pooling.
///
/// Needs at least [`SpotifyNetConfig::MIN_FRAMES`] frames per spectrogram.
#[derive(Module, Debug)]
pub struct SpotifyNet<B: Backend> {
    conv1: Conv1d<B>,
    pool1: MaxPool1d,
    conv2: Conv1d<B>,
    pool2: MaxPool1d,
    conv3: Conv1d<B>,
    dense: Linear<B>,
    output: Linear<B>,
    sigmoid_output: bool,
}

impl<B: Backend> TaggingModel<B> for SpotifyNet<B> {
    fn forward(&self, spectrograms: Tensor<B, 3>) -> Tensor<B, 2> {
        // [batch, frames, bins] -> [batch, bins, frames]
        let x = spectrograms.swap_dims(1, 2);

        let x = self.pool1.forward(relu(self.conv1.forward(x)));
        let x = self.pool2.forward(relu(self.conv2.forward(x)));
        let x = relu(self.conv3.forward(x));

        let [batch, channels, _] = x.dims();
        let mean = x.clone().mean_dim(2).reshape([batch, channels]);
        let max = x.clone().max_dim(2).reshape([batch, channels]);
        // epsilon keeps the sqrt gradient finite for all-zero channels
        let l2 = x
            .powf_scalar(2.0)
            .mean_dim(2)
            .add_scalar(1e-6)
            .sqrt()
            .reshape([batch, channels]);

        let pooled = Tensor::cat(vec![mean, max, l2], 1);
        let scores = self.output.forward(relu(self.dense.forward(pooled)));

        match self.activation() {
            Activation::Sigmoid => sigmoid(scores),
            Activation::Linear => scores,
        }
    }

    fn activation(&self) -> Activation {
        if self.sigmoid_output {
            Activation::Sigmoid
        } else {
            Activation::Linear
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn small_config(num_classes: usize) -> SpotifyNetConfig {
        SpotifyNetConfig::new(num_classes)
            .with_input_bins(8)
            .with_conv_channels(4)
            .with_hidden(8)
    }

    #[test]
    fn test_output_shape() {
        let device = NdArrayDevice::default();
        let model = small_config(5).init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 3>::ones([3, 64, 8], &device);
        assert_eq!(model.forward(input).dims(), [3, 5]);
    }

    #[test]
    fn test_min_frames_accepted() {
        let device = NdArrayDevice::default();
        let model = small_config(2).init::<TestBackend>(&device);
        let frames = SpotifyNetConfig::MIN_FRAMES;
        let input = Tensor::<TestBackend, 3>::zeros([1, frames, 8], &device);
        assert_eq!(model.forward(input).dims(), [1, 2]);
    }

    #[test]
    fn test_sigmoid_scores_in_unit_range() {
        let device = NdArrayDevice::default();
        let model = small_config(4).init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 3>::random(
            [2, 64, 8],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let scores: Vec<f32> = model.forward(input).into_data().to_vec().unwrap();
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_activation_roundtrip_through_module() {
        let device = NdArrayDevice::default();
        let sigmoid_model = small_config(2).init::<TestBackend>(&device);
        let linear_model = small_config(2)
            .with_activation(Activation::Linear)
            .init::<TestBackend>(&device);

        assert_eq!(sigmoid_model.activation(), Activation::Sigmoid);
        assert_eq!(linear_model.activation(), Activation::Linear);
    }

    #[test]
    fn test_decision_threshold() {
        assert_eq!(Activation::Sigmoid.decision_threshold(), 0.5);
        assert_eq!(Activation::Linear.decision_threshold(), 0.0);
    }
}
