//! Epoch driver: drains the training pipeline once per epoch, then measures
//! accuracy on the training and validation splits.

use crate::{Result, TrainConfig};
use tagtune_burn::burn::module::AutodiffModule;
use tagtune_burn::burn::optim::adaptor::OptimizerAdaptor;
use tagtune_burn::burn::optim::{Optimizer, Sgd, SgdConfig};
use tagtune_burn::burn::tensor::backend::AutodiffBackend;
use tagtune_burn::{BatchAccuracy, Learner, SpotifyNet, SpotifyNetConfig, TaggingModel};
use tagtune_data::{list_split, LoaderPool, Pipeline, Split};

/// Outcome of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    /// 1-based epoch number.
    pub epoch: usize,
    pub epochs: usize,
    /// Optimizer steps taken this epoch.
    pub batches: usize,
    pub mean_loss: f64,
    pub train_accuracy: f64,
    pub val_accuracy: f64,
}

/// Loss summary of one training pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PassLoss {
    pub batches: usize,
    pub mean_loss: f64,
}

/// Hooks called by [`Trainer::fit_with`] around each epoch.
pub trait EpochCallback {
    /// Before the training pass of `epoch` (1-based).
    fn on_epoch_begin(&mut self, _epoch: usize, _epochs: usize) {}

    /// After both accuracy passes.
    fn on_epoch_end(&mut self, _report: &EpochReport) {}
}

struct OnEpochEnd<F>(F);

impl<F: FnMut(&EpochReport)> EpochCallback for OnEpochEnd<F> {
    fn on_epoch_end(&mut self, report: &EpochReport) {
        (self.0)(report)
    }
}

/// Trainer for the default model with plain SGD.
pub type SpotifyTrainer<B> = Trainer<
    B,
    SpotifyNet<B>,
    OptimizerAdaptor<Sgd<<B as AutodiffBackend>::InnerBackend>, SpotifyNet<B>, B>,
>;

/// Drives a [`Learner`] over train and validation pipelines.
///
/// # Example
///
/// ```ignore
/// let config = TrainConfig::default().with_epochs(10);
/// let mut trainer = SpotifyTrainer::<CpuBackend>::spotify(config, CpuDevice::default())?;
///
/// trainer.fit(|report| {
///     println!("epoch {}: val {:.3}", report.epoch, report.val_accuracy);
/// })?;
/// ```
pub struct Trainer<B, M, O>
where
    B: AutodiffBackend,
    M: TaggingModel<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    config: TrainConfig,
    learner: Learner<B, M, O>,
}

impl<B: AutodiffBackend> SpotifyTrainer<B> {
    /// Trainer for a freshly initialized [`SpotifyNet`] sized from `config`.
    pub fn spotify(config: TrainConfig, device: B::Device) -> Result<Self> {
        if config.input_shape[0] < SpotifyNetConfig::MIN_FRAMES {
            return Err(crate::Error::Config(format!(
                "SpotifyNet needs at least {} frames, input_shape has {}",
                SpotifyNetConfig::MIN_FRAMES,
                config.input_shape[0]
            )));
        }

        let model = SpotifyNetConfig::new(config.num_classes())
            .with_input_bins(config.input_shape[1])
            .init::<B>(&device);
        let optimizer = SgdConfig::new().init();
        Self::new(config, model, optimizer, device)
    }
}

impl<B, M, O> Trainer<B, M, O>
where
    B: AutodiffBackend,
    M: TaggingModel<B> + AutodiffModule<B>,
    M::InnerModule: TaggingModel<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    pub fn new(config: TrainConfig, model: M, optimizer: O, device: B::Device) -> Result<Self> {
        config.validate()?;
        let learner = Learner::new(model, optimizer, config.learning_rate, device);
        Ok(Self { config, learner })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn learner(&self) -> &Learner<B, M, O> {
        &self.learner
    }

    pub fn into_model(self) -> M {
        self.learner.into_model()
    }

    /// List both splits and build a shuffled training pipeline and an
    /// independent, unshuffled validation pipeline sharing one loader pool.
    pub fn open_pipelines(&self) -> Result<(Pipeline, Pipeline)> {
        let root = &self.config.dataset_root;
        let num_classes = self.config.num_classes();

        let train_listing = list_split(root, Split::Train, num_classes)?;
        let val_listing = list_split(root, Split::Val, num_classes)?;

        let pool = LoaderPool::new(self.config.num_workers)?;
        let train = Pipeline::with_pool(train_listing, self.config.train_pipeline(), pool.clone())?;
        let val = Pipeline::with_pool(val_listing, self.config.eval_pipeline(), pool)?;

        tracing::info!(
            "Dataset {}: {} train / {} val samples, {} classes",
            root.display(),
            train.len(),
            val.len(),
            num_classes
        );

        Ok((train, val))
    }

    /// Run every configured epoch, calling `on_epoch` after each one.
    ///
    /// Stops at the first error other than end of data.
    pub fn fit(&mut self, on_epoch: impl FnMut(&EpochReport)) -> Result<Vec<EpochReport>> {
        self.fit_with(&mut OnEpochEnd(on_epoch))
    }

    /// [`fit`](Self::fit) with hooks on both sides of every epoch.
    pub fn fit_with<C: EpochCallback + ?Sized>(
        &mut self,
        callback: &mut C,
    ) -> Result<Vec<EpochReport>> {
        let (mut train, mut val) = self.open_pipelines()?;
        let epochs = self.config.epochs;
        let mut reports = Vec::with_capacity(epochs);

        for epoch in 1..=epochs {
            callback.on_epoch_begin(epoch, epochs);
            let pass = self.train_epoch(&mut train)?;
            let train_accuracy = self.check_accuracy(&mut train)?;
            let val_accuracy = self.check_accuracy(&mut val)?;

            let report = EpochReport {
                epoch,
                epochs,
                batches: pass.batches,
                mean_loss: pass.mean_loss,
                train_accuracy,
                val_accuracy,
            };

            tracing::info!(
                "Epoch {}/{}: loss {:.6} over {} batches, train acc {:.4}, val acc {:.4}",
                epoch,
                epochs,
                report.mean_loss,
                report.batches,
                train_accuracy,
                val_accuracy
            );

            callback.on_epoch_end(&report);
            reports.push(report);
        }

        Ok(reports)
    }

    /// One optimizer step per batch until the pipeline is exhausted.
    pub fn train_epoch(&mut self, pipeline: &mut Pipeline) -> Result<PassLoss> {
        pipeline.reinitialize()?;

        let mut batches = 0;
        let mut total_loss = 0.0;
        loop {
            match pipeline.next_batch() {
                Ok(batch) => {
                    total_loss += f64::from(self.learner.train_step(&batch)?);
                    batches += 1;
                }
                Err(e) if e.is_exhausted() => break,
                Err(e) => return Err(e.into()),
            }
        }

        let mean_loss = if batches == 0 {
            0.0
        } else {
            total_loss / batches as f64
        };
        Ok(PassLoss { batches, mean_loss })
    }

    /// Fraction of correct tag predictions over one full pass of `pipeline`.
    ///
    /// Uses a parameter snapshot, so repeated calls without a training step
    /// in between return the same value.
    pub fn check_accuracy(&self, pipeline: &mut Pipeline) -> Result<f64> {
        let evaluator = self.learner.evaluator();
        pipeline.reinitialize()?;

        let mut accuracy = BatchAccuracy::default();
        loop {
            match pipeline.next_batch() {
                Ok(batch) => accuracy = accuracy.merge(evaluator.evaluate(&batch)?),
                Err(e) if e.is_exhausted() => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(accuracy.fraction())
    }
}
