//! Data subsystem for tagtune: split listing, spectrogram loading and a
//! restartable, shuffled, batched pipeline.
//!
//! This crate has no ML framework dependency. Batches are flat `f32`
//! buffers with their shapes; `tagtune-burn` turns them into tensors.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tagtune_data::{list_split, Pipeline, PipelineConfig, Split};
//!
//! let listing = list_split(root, Split::Train, 39)?;
//! let mut pipeline = Pipeline::new(listing, PipelineConfig::default())?;
//!
//! pipeline.reinitialize()?;
//! loop {
//!     match pipeline.next_batch() {
//!         Ok(batch) => { /* one optimizer step */ }
//!         Err(e) if e.is_exhausted() => break,
//!         Err(e) => return Err(e),
//!     }
//! }
//! ```

mod batch;
mod error;
mod lister;
mod loader;
mod pickle;
mod pipeline;
mod pool;
mod shuffle;

pub use batch::Batch;
pub use error::{Error, Result};
pub use lister::{list_split, Split, SplitListing, LABELS_FILE};
pub use loader::{load_sample, load_spectrogram, Sample, SampleRef, Spectrogram, DEFAULT_INPUT_SHAPE};
pub use pipeline::{Pipeline, PipelineConfig, PipelineState};
pub use pool::LoaderPool;
pub use shuffle::{shuffle_order, DEFAULT_SHUFFLE_BUFFER};
