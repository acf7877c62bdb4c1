//! # Tagtune - Multi-label Music Tagging Trainer
//!
//! Trains a tag classifier on precomputed mel spectrograms.
//!
//! ## Architecture
//!
//! Tagtune is an umbrella crate that coordinates:
//! - **tagtune-data** - Dataset listing, pickle loading, buffer shuffle, prefetching pipeline
//! - **tagtune-burn** - Burn model, optimizer steps, accuracy counting, device selection
//!
//! ## Quick Start
//!
//! ```ignore
//! use tagtune::prelude::*;
//!
//! let config = TrainConfig::default()
//!     .with_dataset_root("datasets/magnatagatune")
//!     .with_epochs(10);
//!
//! let mut trainer = SpotifyTrainer::<CpuBackend>::spotify(config, CpuDevice::default())?;
//! trainer.fit(|report| println!("Epoch {} / {}", report.epoch, report.epochs))?;
//! ```
//!
//! ## Dataset Layout
//!
//! ```text
//! <dataset_root>/
//!   train/
//!     labels.pickle     # N x num_classes multi-hot rows
//!     0.pickle .. N-1.pickle
//!   val/
//!     labels.pickle
//!     0.pickle .. M-1.pickle
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - `wgpu`
//! - `wgpu` - GPU training through Burn's wgpu backend

/// Re-export of tagtune-data for direct access
pub use tagtune_data as data;

/// Re-export of tagtune-burn for direct access
pub use tagtune_burn as engine;

pub use tagtune_data::{
    Batch, Pipeline, PipelineConfig, PipelineState, Split, SplitListing, DEFAULT_INPUT_SHAPE,
};

pub use tagtune_burn::{
    Activation, BatchAccuracy, CpuBackend, CpuDevice, DevicePlacement, Learner, SpotifyNet,
    SpotifyNetConfig, TaggingModel, TrainingDevice,
};

#[cfg(feature = "wgpu")]
pub use tagtune_burn::{GpuBackend, GpuDevice};

mod config;
mod error;
mod trainer;

pub use config::{TrainConfig, DEFAULT_CLASSES, DEFAULT_DATASET_ROOT};
pub use error::{Error, Result};
pub use trainer::{EpochCallback, EpochReport, PassLoss, SpotifyTrainer, Trainer};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        EpochCallback, EpochReport, SpotifyTrainer, TrainConfig, Trainer, TrainingDevice,
    };

    pub use crate::{Activation, SpotifyNetConfig, TaggingModel};

    pub use crate::{CpuBackend, CpuDevice, DevicePlacement};

    #[cfg(feature = "wgpu")]
    pub use crate::{GpuBackend, GpuDevice};

    pub use crate::{Error, Result};
}
