//! Burn training backend for tagtune.
//!
//! Provides the [`TaggingModel`] contract, a default [`SpotifyNet`] tagger,
//! and a [`Learner`] that runs mean-squared-error SGD steps and counts
//! element-wise tag accuracy. Training runs on NdArray (CPU) or wgpu (GPU).
//!
//! ```rust,ignore
//! let device = CpuDevice::default();
//! let model = SpotifyNetConfig::new(39).init::<CpuBackend>(&device);
//! let mut learner = Learner::new(model, SgdConfig::new().init(), 1e-3, device);
//!
//! let loss = learner.train_step(&batch)?;
//! let accuracy = learner.evaluator().evaluate(&batch)?.fraction();
//! ```

mod device;
mod error;
mod learner;
mod model;

pub use device::{CpuBackend, CpuDevice, DevicePlacement, GpuInfo, TrainingDevice};
#[cfg(feature = "wgpu")]
pub use device::{GpuBackend, GpuDevice};
pub use error::{Error, Result};
pub use learner::{batch_tensors, count_correct, BatchAccuracy, Evaluator, Learner};
pub use model::{Activation, SpotifyNet, SpotifyNetConfig, TaggingModel};

/// Re-export of Burn for model authors.
pub use burn;
