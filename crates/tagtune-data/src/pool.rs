//! Loader worker pool and the per-epoch batch producer thread.

use crate::batch::Batch;
use crate::error::{Error, Result};
use crate::lister::SplitListing;
use crate::loader::{load_sample, Sample};
use crossbeam_channel::{Receiver, Sender};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Read-only data shared between the driver and the producer thread.
pub(crate) struct SourceData {
    pub listing: SplitListing,
    pub input_shape: [usize; 2],
}

/// Bounded pool of threads that deserialize samples in parallel.
#[derive(Clone)]
pub struct LoaderPool {
    pool: Arc<rayon::ThreadPool>,
    num_workers: usize,
}

impl LoaderPool {
    /// Create a pool with `num_workers` threads (at least one).
    pub fn new(num_workers: usize) -> Result<Self> {
        let num_workers = num_workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("tagtune-loader-{}", i))
            .build()
            .map_err(|e| Error::Worker(format!("Failed to build loader pool: {}", e)))?;

        Ok(Self {
            pool: Arc::new(pool),
            num_workers,
        })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Load the samples at `indices` and stack them, preserving index order.
    pub(crate) fn load_batch(&self, source: &SourceData, indices: &[usize]) -> Result<Batch> {
        let samples = source.listing.samples();
        let labels = source.listing.labels();

        let loaded: Vec<Sample> = self.pool.install(|| {
            indices
                .par_iter()
                .map(|&i| load_sample(&samples[i], Arc::clone(&labels[i]), source.input_shape))
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(Batch::from_samples(
            loaded,
            source.input_shape,
            source.listing.num_classes(),
        ))
    }
}

/// Message from a producer to its pipeline.
pub(crate) enum Produced {
    Batch(Batch),
    /// A load failed; nothing follows.
    Failed(Error),
    /// Every chunk of the pass was delivered.
    Done,
}

/// One epoch's producer: loads batches in order and feeds the channel.
pub(crate) struct Producer {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Producer {
    /// Spawn a producer for one pass over `order`.
    ///
    /// A complete pass ends with [`Produced::Done`]. The first load error is
    /// forwarded as [`Produced::Failed`] and ends the pass. A sender dropped
    /// without either means the thread died.
    pub fn spawn(
        name: String,
        pool: LoaderPool,
        source: Arc<SourceData>,
        order: Vec<usize>,
        batch_size: usize,
        tx: Sender<Produced>,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name(name)
            .spawn(move || {
                produce(&pool, &source, &order, batch_size, &tx, &stop_clone);
            })
            .map_err(|e| Error::Worker(format!("Failed to spawn producer thread: {}", e)))?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Wait for the thread to exit, reporting a panic as [`Error::Worker`].
    pub fn join(&mut self) -> Result<()> {
        let Some(handle) = self.thread.take() else {
            return Ok(());
        };
        handle.join().map_err(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Error::Worker(format!("Pipeline producer panicked: {}", reason))
        })
    }

    /// Stop producing and wait for the thread.
    ///
    /// The caller must drop its receiver first so a producer blocked on a
    /// full channel wakes up.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Err(e) = self.join() {
            tracing::error!("{}", e);
        }
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn produce(
    pool: &LoaderPool,
    source: &SourceData,
    order: &[usize],
    batch_size: usize,
    tx: &Sender<Produced>,
    stop: &AtomicBool,
) {
    for chunk in order.chunks(batch_size.max(1)) {
        if stop.load(Ordering::Acquire) {
            return;
        }

        let message = match pool.load_batch(source, chunk) {
            Ok(batch) => Produced::Batch(batch),
            Err(e) => {
                tracing::error!("Failed to load batch for split '{}': {}", source.listing.split(), e);
                // Receiver may already be gone; the pass ends either way.
                let _ = tx.send(Produced::Failed(e));
                return;
            }
        };

        // Receiver gone means the pipeline was reinitialized or dropped.
        if tx.send(message).is_err() {
            return;
        }
    }

    let _ = tx.send(Produced::Done);
}

/// Bounded channel of ready batches.
pub(crate) fn batch_channel(capacity: usize) -> (Sender<Produced>, Receiver<Produced>) {
    crossbeam_channel::bounded(capacity.max(1))
}
