//! Finite, restartable batch pipeline over one split.
//!
//! ```text
//! Uninitialized --reinitialize--> Initialized --next_batch--> Draining
//!                                      ^                          |
//!                                      |                    end of data
//!                                      +----reinitialize---- Exhausted
//! ```
//!
//! Each pass is produced by a dedicated thread that loads batch-sized chunks
//! on the [`LoaderPool`] and hands finished batches over a bounded channel.
//! [`Pipeline::next_batch`] blocks on that channel, so the caller sees a plain
//! synchronous iterator that ends with [`Error::Exhausted`].

use crate::batch::Batch;
use crate::error::{Error, Result};
use crate::lister::SplitListing;
use crate::loader::DEFAULT_INPUT_SHAPE;
use crate::pool::{batch_channel, LoaderPool, Produced, Producer, SourceData};
use crate::shuffle::{shuffle_order, DEFAULT_SHUFFLE_BUFFER};
use crossbeam_channel::Receiver;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Position of a pipeline within its current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Initialized,
    Draining,
    Exhausted,
}

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_size: usize,
    /// Shuffle buffer in samples. `None` visits samples in id order.
    pub shuffle_buffer: Option<usize>,
    pub num_workers: usize,
    /// Ready batches buffered ahead of the consumer.
    pub prefetch_batches: usize,
    pub input_shape: [usize; 2],
    /// Fixed seed for the shuffle. `None` seeds from system entropy.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            shuffle_buffer: Some(DEFAULT_SHUFFLE_BUFFER),
            num_workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            prefetch_batches: 2,
            input_shape: DEFAULT_INPUT_SHAPE,
            seed: None,
        }
    }
}

/// Restartable batch source over one split.
pub struct Pipeline {
    source: Arc<SourceData>,
    config: PipelineConfig,
    pool: LoaderPool,
    rng: StdRng,
    state: PipelineState,
    order: Vec<usize>,
    passes: u64,
    receiver: Option<Receiver<Produced>>,
    producer: Option<Producer>,
}

impl Pipeline {
    /// Create a pipeline with its own loader pool.
    pub fn new(listing: SplitListing, config: PipelineConfig) -> Result<Self> {
        let pool = LoaderPool::new(config.num_workers)?;
        Self::with_pool(listing, config, pool)
    }

    /// Create a pipeline sharing an existing loader pool.
    pub fn with_pool(listing: SplitListing, config: PipelineConfig, pool: LoaderPool) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::Schema("batch size must be at least 1".into()));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        tracing::debug!(
            "Pipeline '{}': {} samples, spectrogram {:?} f32, label [{}] f32, batch {}, shuffle {:?}, {} workers",
            listing.split(),
            listing.len(),
            config.input_shape,
            listing.num_classes(),
            config.batch_size,
            config.shuffle_buffer,
            pool.num_workers()
        );

        Ok(Self {
            source: Arc::new(SourceData {
                listing,
                input_shape: config.input_shape,
            }),
            config,
            pool,
            rng,
            state: PipelineState::Uninitialized,
            order: Vec::new(),
            passes: 0,
            receiver: None,
            producer: None,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Number of samples per pass.
    pub fn len(&self) -> usize {
        self.source.listing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Batches per pass, counting the final partial batch.
    pub fn num_batches(&self) -> usize {
        self.len().div_ceil(self.config.batch_size)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn listing(&self) -> &SplitListing {
        &self.source.listing
    }

    /// Sample indices of the current pass in visiting order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Start a new pass from the beginning, abandoning any pass in progress.
    ///
    /// Shuffling pipelines draw a fresh order on every call.
    pub fn reinitialize(&mut self) -> Result<()> {
        self.teardown();

        self.order = match self.config.shuffle_buffer {
            Some(buffer) => shuffle_order(self.len(), buffer, &mut self.rng),
            None => (0..self.len()).collect(),
        };
        self.passes += 1;

        let (tx, rx) = batch_channel(self.config.prefetch_batches);
        let producer = Producer::spawn(
            format!("tagtune-{}-pipeline", self.source.listing.split()),
            self.pool.clone(),
            Arc::clone(&self.source),
            self.order.clone(),
            self.config.batch_size,
            tx,
        )?;

        self.receiver = Some(rx);
        self.producer = Some(producer);
        self.state = PipelineState::Initialized;

        tracing::debug!(
            "Pipeline '{}' initialized (pass {})",
            self.source.listing.split(),
            self.passes
        );
        Ok(())
    }

    /// Pull the next batch of the current pass.
    ///
    /// Returns [`Error::Exhausted`] once the pass is complete, and keeps
    /// returning it until [`reinitialize`](Self::reinitialize). A load failure
    /// is returned as-is and ends the pass; a dead producer ends it with
    /// [`Error::Worker`].
    pub fn next_batch(&mut self) -> Result<Batch> {
        match self.state {
            PipelineState::Uninitialized => return Err(Error::NotInitialized),
            PipelineState::Exhausted => return Err(Error::Exhausted),
            PipelineState::Initialized | PipelineState::Draining => {}
        }

        let received = match &self.receiver {
            Some(rx) => rx.recv(),
            None => return Err(Error::NotInitialized),
        };

        match received {
            Ok(Produced::Batch(batch)) => {
                self.state = PipelineState::Draining;
                Ok(batch)
            }
            Ok(Produced::Failed(e)) => {
                self.finish();
                Err(e)
            }
            Ok(Produced::Done) => {
                self.finish();
                Err(Error::Exhausted)
            }
            Err(_) => {
                // Channel closed without an end marker: the producer died.
                let panicked = self.producer.take().and_then(|mut p| p.join().err());
                self.finish();
                Err(panicked.unwrap_or_else(|| {
                    Error::Worker("Pipeline producer stopped before the end of the pass".into())
                }))
            }
        }
    }

    fn finish(&mut self) {
        self.teardown();
        self.state = PipelineState::Exhausted;
    }

    fn teardown(&mut self) {
        // Drop the receiver before joining so a blocked producer can exit.
        self.receiver = None;
        if let Some(mut producer) = self.producer.take() {
            producer.shutdown();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.teardown();
    }
}
